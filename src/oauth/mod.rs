// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # OAuth2 Authorization-Code Exchange
//!
//! Client side of the authorization-code + PKCE flow against a
//! third-party provider.
//!
//! ## Flow
//!
//! 1. Redirect the user agent to the provider's authorization endpoint
//!    with a fresh single-use `state` and, when PKCE is enabled, an
//!    S256 code challenge
//! 2. On the callback, validate `state` (constant-time, consumed
//!    atomically, never accepted twice)
//! 3. Exchange the `code` (+ verifier) at the token endpoint
//! 4. Fetch the userinfo endpoint and normalize the profile
//!
//! ## Security
//!
//! - `state` and the PKCE verifier come from the system CSPRNG
//! - State comparison is constant-time
//! - Provider error bodies are logged server-side only; clients see a
//!   coarse reason code

pub mod client;
pub mod state;

pub use client::{OAuthClient, OAuthExchangeError, OAuthProviderSettings};
pub use state::{pkce_challenge, random_urlsafe, state_matches, OAuthTransaction};
