// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified token claim set.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{RoleSet, UserKey};

/// The decoded, verified payload of a bearer token.
///
/// Instances are produced only by
/// [`TokenVerifier`](super::verifier::TokenVerifier) after signature,
/// expiry and required-claim checks have all passed. There is no public
/// constructor from raw input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaimSet {
    /// Subject identifier (`sub`).
    pub subject: String,
    /// Opaque user key (`user_id`).
    pub user_key: UserKey,
    /// Email / lookup identifier (`email`).
    pub email: String,
    /// Roles granted by the issuer (`roles`, never empty).
    pub roles: RoleSet,
    /// Expiry instant (`exp`).
    pub expires_at: DateTime<Utc>,
    /// Issuer-defined extra claims, passed through untouched.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenClaimSet {
    /// Whether the claim set is still valid at `now` (strictly before
    /// expiry; `now == exp` counts as expired).
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
