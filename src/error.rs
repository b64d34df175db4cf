// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Startup configuration errors.
//!
//! Everything in here is fatal: a process facing any of these must
//! refuse to start rather than run with an ambiguous security policy.
//! Request-scoped authentication/authorization failures live in
//! [`crate::security::error`] instead.

use thiserror::Error;

/// Fatal configuration error detected while building the pipeline.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two authenticators in one firewall could claim the same request,
    /// which would make strategy selection ambiguous at request time.
    #[error("firewall `{firewall}`: authenticators `{first}` and `{second}` can claim the same request")]
    OverlappingAuthenticators {
        firewall: String,
        first: String,
        second: String,
    },

    /// Path patterns must carry an explicit `^` anchor; matching
    /// semantics are never implicit.
    #[error("pattern `{pattern}` must be anchored with `^`")]
    UnanchoredPattern { pattern: String },

    /// Pattern failed to compile.
    #[error("pattern `{pattern}` is not a valid regex: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    /// An access rule listed no roles (and is not the anonymous marker).
    #[error("access rule `{pattern}` has an empty role list")]
    EmptyRuleRoles { pattern: String },

    /// Required secret material is absent or unusable.
    #[error("missing secret material: {0}")]
    MissingSecret(String),

    /// Verification key material does not fit the configured algorithm.
    #[error("invalid verification key: {0}")]
    InvalidKey(String),

    /// A firewall definition is internally inconsistent.
    #[error("firewall `{firewall}`: {message}")]
    InvalidFirewall { firewall: String, message: String },

    /// A configured endpoint or redirect URL does not parse.
    #[error("invalid URL `{url}`: {message}")]
    InvalidUrl { url: String, message: String },

    /// The outbound HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
