// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-scoped authentication and authorization failures.
//!
//! Only the coarse, enumerated reason codes below ever reach a client.
//! Internal detail (verifier error kinds, provider error bodies, stack
//! traces) stays in server-side tracing.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::passport::PassportError;
use crate::token::TokenError;

/// Why an authentication attempt (or an authorization check) failed.
///
/// Authorization failure is deliberately distinct from authentication
/// failure: a principal that exists but lacks the role gets a 403, never
/// a "please log in".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token was presented where one is required.
    MissingToken,
    /// The presented token failed verification (malformed, bad
    /// signature, wrong algorithm, missing claims).
    InvalidToken,
    /// The presented token is past its expiry.
    ExpiredToken,
    /// Login credentials did not check out (unknown identifier and bad
    /// password intentionally share one code).
    InvalidCredentials,
    /// CSRF token missing or mismatched on a session request.
    InvalidCsrf,
    /// OAuth state mismatch or replay.
    InvalidState,
    /// OAuth code exchange or userinfo fetch failed.
    ExchangeFailed,
    /// A collaborator (user provider) failed or timed out; the pipeline
    /// fails closed.
    ProviderUnavailable,
    /// Anonymous request denied by access control; authentication must
    /// begin.
    AuthenticationRequired,
    /// Authenticated, but no required role is held.
    InsufficientRole,
}

#[derive(Serialize)]
struct FailureBody {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl AuthError {
    /// Closed enum of client-visible reason codes.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidCsrf => "invalid_csrf",
            AuthError::InvalidState => "invalid_state",
            AuthError::ExchangeFailed => "exchange_failed",
            AuthError::ProviderUnavailable => "provider_unavailable",
            AuthError::AuthenticationRequired => "authentication_required",
            AuthError::InsufficientRole => "insufficient_role",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Bearer token is required"),
            AuthError::InvalidToken => write!(f, "Bearer token is invalid"),
            AuthError::ExpiredToken => write!(f, "Bearer token has expired"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::InvalidCsrf => write!(f, "Invalid CSRF token"),
            AuthError::InvalidState => write!(f, "OAuth state is invalid or already used"),
            AuthError::ExchangeFailed => write!(f, "OAuth exchange failed"),
            AuthError::ProviderUnavailable => write!(f, "Account lookup failed"),
            AuthError::AuthenticationRequired => write!(f, "Authentication is required"),
            AuthError::InsufficientRole => {
                write!(f, "Insufficient permissions for this operation")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(FailureBody {
            kind: self.reason_code(),
        });
        (status, body).into_response()
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        // Coarse mapping only: clients never learn whether a rejected
        // token was malformed, mis-signed or mis-algorithmed.
        match e {
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::Malformed
            | TokenError::InvalidSignature
            | TokenError::AlgorithmMismatch
            | TokenError::MissingClaims(_) => AuthError::InvalidToken,
        }
    }
}

impl From<PassportError> for AuthError {
    fn from(_: PassportError) -> Self {
        AuthError::InvalidCredentials
    }
}
