// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authenticated identity.

use serde::Serialize;

use crate::models::{RoleSet, UserKey, UserRecord};
use crate::token::TokenClaimSet;

/// An authenticated identity and its roles.
///
/// Two variants share one accessor surface so authorization code never
/// branches on provenance:
///
/// - `Real` — backed by a user record fetched from a user provider
/// - `Virtual` — reconstructed entirely from a verified token claim
///   set, with no datastore round-trip (the point of the stateless
///   bearer strategy)
#[derive(Debug, Clone)]
pub enum Principal {
    Real(UserRecord),
    Virtual(TokenClaimSet),
}

impl Principal {
    /// Opaque user key.
    pub fn key(&self) -> &UserKey {
        match self {
            Principal::Real(user) => &user.key,
            Principal::Virtual(claims) => &claims.user_key,
        }
    }

    /// Display/lookup identifier (email).
    pub fn identifier(&self) -> &str {
        match self {
            Principal::Real(user) => &user.identifier,
            Principal::Virtual(claims) => &claims.email,
        }
    }

    /// Roles held. Never empty: both backing types enforce a non-empty
    /// [`RoleSet`] at construction.
    pub fn roles(&self) -> &RoleSet {
        match self {
            Principal::Real(user) => &user.roles,
            Principal::Virtual(claims) => &claims.roles,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Principal::Virtual(_))
    }
}

/// Serialized shape exposed to application handlers (`/me`-style
/// endpoints). Kept separate so internal fields like password hashes
/// can never leak through a principal.
#[derive(Debug, Serialize)]
pub struct PrincipalView {
    pub key: UserKey,
    pub identifier: String,
    pub roles: RoleSet,
    pub virtual_principal: bool,
}

impl From<&Principal> for PrincipalView {
    fn from(principal: &Principal) -> Self {
        Self {
            key: principal.key().clone(),
            identifier: principal.identifier().to_string(),
            roles: principal.roles().clone(),
            virtual_principal: principal.is_virtual(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn real() -> Principal {
        Principal::Real(UserRecord {
            key: UserKey::from("u1"),
            identifier: "a@b.com".to_string(),
            password_hash: Some("$argon2id$stub".to_string()),
            roles: RoleSet::new(["ROLE_USER", "ROLE_ADMIN"]).unwrap(),
            display_name: Some("Ada".to_string()),
        })
    }

    fn virtual_principal() -> Principal {
        Principal::Virtual(TokenClaimSet {
            subject: "42".to_string(),
            user_key: UserKey::from("42"),
            email: "api@b.com".to_string(),
            roles: RoleSet::new(["ROLE_USER"]).unwrap(),
            expires_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            extra: HashMap::new(),
        })
    }

    #[test]
    fn accessors_are_uniform_across_variants() {
        assert_eq!(real().key(), &UserKey::from("u1"));
        assert_eq!(virtual_principal().key(), &UserKey::from("42"));
        assert_eq!(real().identifier(), "a@b.com");
        assert_eq!(virtual_principal().identifier(), "api@b.com");
        assert!(real().roles().contains("ROLE_ADMIN"));
        assert!(virtual_principal().roles().contains("ROLE_USER"));
    }

    #[test]
    fn virtual_flag_distinguishes_variants() {
        assert!(!real().is_virtual());
        assert!(virtual_principal().is_virtual());
    }

    #[test]
    fn view_never_carries_password_hash() {
        let view = PrincipalView::from(&real());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["key"], "u1");
    }
}
