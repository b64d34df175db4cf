// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stateless bearer-token strategy.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::{AuthenticationStrategy, ClaimShape, SuccessAction};
use crate::security::badge::Badge;
use crate::security::error::AuthError;
use crate::security::passport::Passport;
use crate::security::principal::Principal;
use crate::security::request::RequestView;
use crate::session::SessionHandle;
use crate::token::TokenVerifier;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticates `Authorization: Bearer <token>` requests.
///
/// On success the pipeline builds a **virtual principal** straight from
/// the verified claims — no datastore round-trip. Stateless scalability
/// is the point of this strategy: everything needed to authorize the
/// request must be reconstructible from the token alone.
pub struct BearerTokenAuthenticator {
    verifier: Arc<TokenVerifier>,
}

impl BearerTokenAuthenticator {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl AuthenticationStrategy for BearerTokenAuthenticator {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn claim_shape(&self) -> ClaimShape {
        ClaimShape::BearerHeader
    }

    fn supports(&self, request: &RequestView) -> bool {
        // Presence of the scheme prefix only; no decoding here.
        request
            .header(header::AUTHORIZATION)
            .is_some_and(|v| v.starts_with(BEARER_PREFIX))
    }

    async fn authenticate(
        &self,
        request: &RequestView,
        _session: Option<&SessionHandle>,
    ) -> Result<Option<Passport>, AuthError> {
        let Some(raw) = request
            .header(header::AUTHORIZATION)
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        else {
            return Ok(None);
        };

        let claims = self.verifier.verify(raw.trim()).map_err(|e| {
            // Full detail stays server-side; the client gets the coarse
            // code only.
            warn!(error = %e, "bearer token verification failed");
            AuthError::from(e)
        })?;

        Ok(Some(Passport::with_badges([Badge::VerifiedClaims(claims)])?))
    }

    async fn on_success(
        &self,
        _principal: &Principal,
        _request: &RequestView,
        _session: Option<&SessionHandle>,
    ) -> SuccessAction {
        // The authenticated request proceeds to the application handler.
        SuccessAction::Continue
    }

    async fn on_failure(
        &self,
        _request: &RequestView,
        reason: AuthError,
        _session: Option<&SessionHandle>,
    ) -> Response {
        // Structured 401 with the `type` drawn from the closed enum
        // (missing_token / invalid_token / expired_token).
        reason.into_response()
    }

    async fn challenge(
        &self,
        _request: &RequestView,
        _session: Option<&SessionHandle>,
    ) -> Response {
        AuthError::MissingToken.into_response()
    }
}
