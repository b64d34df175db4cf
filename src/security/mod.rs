// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Security Pipeline
//!
//! Request-scoped authentication and authorization: firewall dispatch,
//! the passport/badge credential model, per-strategy authenticators and
//! the ordered role-based access evaluator.
//!
//! ## Per-request flow
//!
//! 1. The dispatcher selects the first firewall whose pattern matches
//!    the request path
//! 2. The firewall's authenticators are probed in declared order; the
//!    first to claim the request builds a passport
//! 3. Badge checkers run exactly once per badge kind (CSRF, password)
//! 4. The passport resolves to a principal (user record or
//!    token-derived virtual identity)
//! 5. The access evaluator checks the principal's roles against the
//!    first matching rule — the hard gate before any handler
//!
//! ## Security
//!
//! - Configuration is validated exhaustively at startup; overlapping
//!   authenticators or malformed patterns refuse to boot
//! - Every failure path fails closed, including collaborator timeouts
//! - Clients only ever see coarse, enumerated reason codes

pub mod access;
pub mod authenticator;
pub mod badge;
pub mod checkers;
pub mod error;
pub mod extractor;
pub mod firewall;
pub mod middleware;
pub mod passport;
pub mod pipeline;
pub mod principal;
pub mod request;

/// Well-known session keys used by the browser-facing strategies.
pub mod session_keys {
    /// Key of the authenticated account (present = logged in).
    pub const USER_KEY: &str = "auth.user_key";
    /// Flash-style reason code for the login form re-render.
    pub const FLASH: &str = "auth.flash";
    /// Stashed same-site path to return to after login.
    pub const TARGET: &str = "auth.target";
    /// Expected CSRF token for state-changing session requests.
    pub const CSRF_TOKEN: &str = "csrf.token";
    /// Serialized in-flight OAuth transaction (state + PKCE verifier).
    pub const OAUTH_TX: &str = "oauth.transaction";
}

pub use access::{AccessDecision, AccessPolicy, DefaultPolicy, RequiredRoles};
pub use authenticator::{AuthenticationStrategy, Authenticator, SuccessAction};
pub use badge::{Badge, BadgeKind, ProviderProfile};
pub use error::AuthError;
pub use extractor::{CurrentUser, OptionalUser};
pub use firewall::{AuthenticatorConfig, Firewall, FirewallConfig, SessionSettings};
pub use passport::{Passport, PassportError};
pub use pipeline::{Handled, SecurityConfig, SecurityPipeline};
pub use principal::{Principal, PrincipalView};
