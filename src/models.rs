// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Core Identity Models
//!
//! This module defines the user-facing identity types shared across the
//! pipeline: the opaque [`UserKey`], the [`UserRecord`] returned by user
//! providers, and the [`RoleSet`] carried by every authenticated principal.
//!
//! ## User Key Type
//!
//! The [`UserKey`] newtype wraps the datastore's opaque user identifier.
//! It provides type safety and clear semantics: a key is never an email
//! and an email is never a key.
//!
//! ## Role Invariant
//!
//! [`RoleSet`] cannot be constructed empty. An authenticated principal
//! always carries at least one role, so downstream authorization code
//! never has to special-case the empty set.

use serde::{Deserialize, Serialize};

// =============================================================================
// User Key Type
// =============================================================================

/// Opaque user identifier wrapper.
///
/// Wraps whatever the backing datastore uses as its primary key. Numeric
/// keys from token claims are normalized to their decimal string form.
///
/// # Example
///
/// ```rust,ignore
/// let key = UserKey::from("42");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserKey(pub String);

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserKey {
    fn from(value: String) -> Self {
        UserKey(value)
    }
}

impl From<&str> for UserKey {
    fn from(value: &str) -> Self {
        UserKey(value.to_string())
    }
}

impl From<UserKey> for String {
    fn from(value: UserKey) -> Self {
        value.0
    }
}

// =============================================================================
// Role Set
// =============================================================================

/// Ordered, non-empty set of role names.
///
/// Roles are plain strings (`ROLE_USER`, `ROLE_ADMIN`, ...). Order is
/// preserved as declared; duplicates are collapsed on construction.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoleSet(Vec<String>);

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // The non-empty invariant holds across deserialization too.
        let roles = Vec::<String>::deserialize(deserializer)?;
        RoleSet::new(roles)
            .ok_or_else(|| serde::de::Error::custom("role set cannot be empty"))
    }
}

impl RoleSet {
    /// Build a role set from role names.
    ///
    /// Returns `None` when `roles` contains no non-empty name, enforcing
    /// the invariant that an authenticated principal always holds at
    /// least one role.
    pub fn new<I, S>(roles: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = Vec::new();
        for role in roles {
            let role = role.into();
            if role.trim().is_empty() {
                continue;
            }
            if !seen.contains(&role) {
                seen.push(role);
            }
        }
        if seen.is_empty() {
            None
        } else {
            Some(RoleSet(seen))
        }
    }

    /// Check membership of a single role.
    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r == role)
    }

    /// OR semantics over a required set: true when at least one of
    /// `required` is held.
    pub fn contains_any<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        required.into_iter().any(|r| self.contains(r))
    }

    /// Roles in declaration order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

// =============================================================================
// User Record
// =============================================================================

/// A concrete user account as returned by a user provider.
///
/// `password_hash` holds a PHC-formatted hash (argon2) for accounts that
/// can log in with a password; token-provisioned and OAuth-linked
/// accounts may carry `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Opaque datastore key.
    pub key: UserKey,
    /// Lookup/display identifier (usually the email address).
    pub identifier: String,
    /// PHC-formatted password hash, when password login is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Roles held by this account.
    pub roles: RoleSet,
    /// Optional human-readable display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}
