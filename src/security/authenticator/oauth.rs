// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 authorization-code (+ PKCE) strategy.
//!
//! Two phases, driven by the presence of the `code` parameter:
//!
//! - **Initiate** (no code): the challenge redirects the user agent to
//!   the provider with a fresh single-use state and, when PKCE is on,
//!   an S256 challenge; state and verifier are persisted in the session
//!   across the round-trip
//! - **Callback** (code present): the stored state is consumed
//!   atomically and compared in constant time — first use wins,
//!   mismatch or replay fails — then the code is exchanged and the
//!   userinfo profile fetched

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::warn;

use super::{AuthenticationStrategy, ClaimShape, SuccessAction};
use crate::error::ConfigError;
use crate::oauth::{state_matches, OAuthClient, OAuthProviderSettings, OAuthTransaction};
use crate::security::badge::Badge;
use crate::security::error::AuthError;
use crate::security::passport::Passport;
use crate::security::principal::Principal;
use crate::security::request::RequestView;
use crate::security::session_keys;
use crate::session::SessionHandle;

/// Settings for one OAuth firewall binding.
#[derive(Debug, Clone)]
pub struct OAuthLoginSettings {
    pub provider: OAuthProviderSettings,
    /// Local path the provider redirects back to (the path component
    /// of the registered redirect URI).
    pub callback_path: String,
    /// Where to land after login when no target was stashed.
    pub default_target: String,
    /// Generic failure page for exchange errors. Provider error bodies
    /// never reach the client.
    pub failure_target: String,
}

/// Authenticates provider callbacks and initiates the redirect flow.
pub struct OAuthAuthenticator {
    client: Arc<OAuthClient>,
    callback_path: String,
    default_target: String,
    failure_target: String,
}

impl OAuthAuthenticator {
    pub fn new(settings: OAuthLoginSettings) -> Result<Self, ConfigError> {
        let client = OAuthClient::new(settings.provider)?;
        Ok(Self {
            client: Arc::new(client),
            callback_path: settings.callback_path,
            default_target: settings.default_target,
            failure_target: settings.failure_target,
        })
    }

    /// Begin a fresh authorization attempt: persist a new transaction
    /// in the session and point the user agent at the provider.
    async fn start_flow(&self, request: &RequestView, session: &SessionHandle) -> Response {
        let target = (request.method() == Method::GET
            && request.path() != self.callback_path
            && request.path().starts_with('/'))
        .then(|| request.path().to_string());

        let tx = OAuthTransaction::begin(self.client.use_pkce(), target);
        match serde_json::to_string(&tx) {
            Ok(raw) => session.set(session_keys::OAUTH_TX, raw).await,
            Err(e) => {
                warn!(error = %e, "failed to serialize oauth transaction");
                return Redirect::to(&self.failure_target).into_response();
            }
        }
        Redirect::to(self.client.authorize_redirect(&tx).as_str()).into_response()
    }
}

#[async_trait]
impl AuthenticationStrategy for OAuthAuthenticator {
    fn name(&self) -> &'static str {
        "oauth"
    }

    fn claim_shape(&self) -> ClaimShape {
        ClaimShape::CallbackCode {
            path: self.callback_path.clone(),
        }
    }

    fn supports(&self, request: &RequestView) -> bool {
        request.method() == Method::GET
            && request.path() == self.callback_path
            && request.query_param("code").is_some()
    }

    async fn authenticate(
        &self,
        request: &RequestView,
        session: Option<&SessionHandle>,
    ) -> Result<Option<Passport>, AuthError> {
        let Some(code) = request.query_param("code") else {
            return Ok(None);
        };
        // No session means no stored state: the callback cannot belong
        // to an attempt we started.
        let session = session.ok_or(AuthError::InvalidState)?;
        let presented = request
            .query_param("state")
            .ok_or(AuthError::InvalidState)?;

        // Atomic take: the stored state is gone from this point on,
        // whatever the outcome. A concurrent duplicate callback loses
        // the race here.
        let raw_tx = session
            .take(session_keys::OAUTH_TX)
            .await
            .ok_or(AuthError::InvalidState)?;
        let tx: OAuthTransaction =
            serde_json::from_str(&raw_tx).map_err(|_| AuthError::InvalidState)?;

        if !state_matches(presented, &tx.state) {
            warn!(provider = %self.client.provider(), "oauth state mismatch");
            return Err(AuthError::InvalidState);
        }

        if let Some(target) = &tx.target {
            session.set(session_keys::TARGET, target.clone()).await;
        }

        let access_token = self
            .client
            .exchange_code(code, tx.code_verifier.as_deref())
            .await
            .map_err(|e| {
                warn!(provider = %self.client.provider(), error = %e, "code exchange failed");
                AuthError::ExchangeFailed
            })?;

        let info = self.client.fetch_userinfo(&access_token).await.map_err(|e| {
            warn!(provider = %self.client.provider(), error = %e, "userinfo fetch failed");
            AuthError::ExchangeFailed
        })?;

        // Identity is keyed on (provider, provider_id): emails are not
        // stable or unique across providers.
        Ok(Some(Passport::with_badges([Badge::ProviderIdentity {
            provider: self.client.provider().to_string(),
            provider_id: info.provider_id,
            profile: info.profile,
        }])?))
    }

    async fn on_success(
        &self,
        principal: &Principal,
        _request: &RequestView,
        session: Option<&SessionHandle>,
    ) -> SuccessAction {
        let mut target = self.default_target.clone();
        if let Some(session) = session {
            session
                .set(session_keys::USER_KEY, principal.key().to_string())
                .await;
            if let Some(stashed) = session.take(session_keys::TARGET).await {
                target = stashed;
            }
        }
        SuccessAction::Respond(Redirect::to(&target).into_response())
    }

    async fn on_failure(
        &self,
        request: &RequestView,
        reason: AuthError,
        session: Option<&SessionHandle>,
    ) -> Response {
        match (reason, session) {
            // A stale or replayed state restarts the flow from scratch.
            (AuthError::InvalidState, Some(session)) => self.start_flow(request, session).await,
            _ => Redirect::to(&self.failure_target).into_response(),
        }
    }

    async fn challenge(
        &self,
        request: &RequestView,
        session: Option<&SessionHandle>,
    ) -> Response {
        match session {
            Some(session) => self.start_flow(request, session).await,
            // Without a session there is nowhere to persist the state.
            None => Redirect::to(&self.failure_target).into_response(),
        }
    }
}
