// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # User Providers
//!
//! The datastore boundary of the pipeline. A user provider turns a
//! passport's identity badge into a concrete account: identifier lookup
//! for form login, key lookup for session restore, and
//! link-or-provision resolution for OAuth identities.
//!
//! Lookups are an I/O boundary; the pipeline wraps every call in a
//! timeout and treats failure or timeout as an authentication failure
//! (fail closed).

pub mod memory;

use async_trait::async_trait;

use crate::models::{UserKey, UserRecord};
use crate::security::badge::ProviderProfile;

pub use memory::InMemoryUserProvider;

/// User provider failure. Indistinguishable from "not found" as far as
/// clients are concerned; the distinction only matters for logs.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("user lookup timed out")]
    Timeout,

    #[error("user provider failed: {0}")]
    Backend(String),
}

/// Account lookup collaborator.
#[async_trait]
pub trait UserProvider: Send + Sync {
    /// Look up an account by its login identifier (email).
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserRecord>, ProviderError>;

    /// Look up an account by its opaque key (session restore).
    async fn find_by_key(&self, key: &UserKey) -> Result<Option<UserRecord>, ProviderError>;

    /// Resolve an OAuth identity to an account: follow an existing
    /// `(provider, provider_id)` link, or provision a new account if
    /// this provider is configured to do so. `None` means the identity
    /// is unknown and may not be provisioned.
    async fn resolve_provider_identity(
        &self,
        provider: &str,
        provider_id: &str,
        profile: &ProviderProfile,
    ) -> Result<Option<UserRecord>, ProviderError>;
}
