// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Badges: single typed facts presented toward authentication.

use crate::token::TokenClaimSet;

/// Normalized profile returned by an OAuth provider's userinfo endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// Email address reported by the provider (not trusted as a unique
    /// key across providers).
    pub email: Option<String>,
    /// Human-readable display name.
    pub display_name: Option<String>,
}

/// One immutable fact supplied toward authenticating a request.
///
/// A [`Passport`](super::passport::Passport) holds at most one badge per
/// kind; each kind is consumed exactly once by the pipeline's checkers.
#[derive(Debug, Clone)]
pub enum Badge {
    /// The identity the requester claims (login form identifier field).
    UserIdentifier(String),
    /// A presented plaintext password, checked exactly once and never
    /// logged or stored.
    Password(String),
    /// A presented CSRF token for state-changing session requests.
    CsrfToken(String),
    /// A claim set that has already passed token verification.
    VerifiedClaims(TokenClaimSet),
    /// Identity asserted by an OAuth provider. Keyed on
    /// `(provider, provider_id)` — emails are not stable or unique
    /// across providers.
    ProviderIdentity {
        provider: String,
        provider_id: String,
        profile: ProviderProfile,
    },
}

/// Discriminant for badge storage and exactly-once accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeKind {
    UserIdentifier,
    Password,
    CsrfToken,
    VerifiedClaims,
    ProviderIdentity,
}

impl Badge {
    pub fn kind(&self) -> BadgeKind {
        match self {
            Badge::UserIdentifier(_) => BadgeKind::UserIdentifier,
            Badge::Password(_) => BadgeKind::Password,
            Badge::CsrfToken(_) => BadgeKind::CsrfToken,
            Badge::VerifiedClaims(_) => BadgeKind::VerifiedClaims,
            Badge::ProviderIdentity { .. } => BadgeKind::ProviderIdentity,
        }
    }
}

impl std::fmt::Display for BadgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BadgeKind::UserIdentifier => "user_identifier",
            BadgeKind::Password => "password",
            BadgeKind::CsrfToken => "csrf_token",
            BadgeKind::VerifiedClaims => "verified_claims",
            BadgeKind::ProviderIdentity => "provider_identity",
        };
        f.write_str(name)
    }
}
