// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Form-login (session cookie) strategy.

use async_trait::async_trait;
use axum::response::{IntoResponse, Redirect, Response};

use super::{AuthenticationStrategy, ClaimShape, SuccessAction};
use crate::security::badge::Badge;
use crate::security::error::AuthError;
use crate::security::passport::Passport;
use crate::security::principal::Principal;
use crate::security::request::RequestView;
use crate::security::session_keys;
use crate::session::SessionHandle;

/// Form field carrying the claimed identifier.
pub const IDENTIFIER_FIELD: &str = "_identifier";
/// Form field carrying the plaintext password.
pub const PASSWORD_FIELD: &str = "_password";
/// Form field carrying the CSRF token.
pub const CSRF_FIELD: &str = "_csrf_token";

/// Settings for one form-login firewall.
#[derive(Debug, Clone)]
pub struct FormLoginSettings {
    /// Path the login form POSTs to.
    pub login_path: String,
    /// Path that tears the session down.
    pub logout_path: Option<String>,
    /// Where to land after login when no target was stashed.
    pub default_target: String,
    /// Whether a CSRF badge is required on the login POST.
    pub csrf_enabled: bool,
}

impl Default for FormLoginSettings {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            logout_path: Some("/logout".to_string()),
            default_target: "/".to_string(),
            csrf_enabled: true,
        }
    }
}

/// Authenticates credential POSTs to the login path and drives the
/// browser-facing redirect choreography.
pub struct FormLoginAuthenticator {
    settings: FormLoginSettings,
}

impl FormLoginAuthenticator {
    pub fn new(settings: FormLoginSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FormLoginSettings {
        &self.settings
    }
}

#[async_trait]
impl AuthenticationStrategy for FormLoginAuthenticator {
    fn name(&self) -> &'static str {
        "form_login"
    }

    fn claim_shape(&self) -> ClaimShape {
        ClaimShape::FormPost {
            path: self.settings.login_path.clone(),
        }
    }

    fn supports(&self, request: &RequestView) -> bool {
        request.is_form_post(&self.settings.login_path)
    }

    async fn authenticate(
        &self,
        request: &RequestView,
        _session: Option<&SessionHandle>,
    ) -> Result<Option<Passport>, AuthError> {
        let identifier = request
            .form_field(IDENTIFIER_FIELD)
            .filter(|v| !v.trim().is_empty())
            .ok_or(AuthError::InvalidCredentials)?;
        let password = request
            .form_field(PASSWORD_FIELD)
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::InvalidCredentials)?;

        let mut passport = Passport::with_badges([
            Badge::UserIdentifier(identifier.to_string()),
            Badge::Password(password.to_string()),
        ])?;

        if self.settings.csrf_enabled {
            let csrf = request
                .form_field(CSRF_FIELD)
                .ok_or(AuthError::InvalidCsrf)?;
            passport.add_badge(Badge::CsrfToken(csrf.to_string()))?;
        }

        Ok(Some(passport))
    }

    async fn on_success(
        &self,
        principal: &Principal,
        _request: &RequestView,
        session: Option<&SessionHandle>,
    ) -> SuccessAction {
        let mut target = self.settings.default_target.clone();
        if let Some(session) = session {
            // Establish the login and return to the stashed target.
            session
                .set(session_keys::USER_KEY, principal.key().to_string())
                .await;
            session.remove(session_keys::FLASH).await;
            if let Some(stashed) = session.take(session_keys::TARGET).await {
                target = stashed;
            }
        }
        SuccessAction::Respond(Redirect::to(&target).into_response())
    }

    async fn on_failure(
        &self,
        _request: &RequestView,
        reason: AuthError,
        session: Option<&SessionHandle>,
    ) -> Response {
        if let Some(session) = session {
            // Flash-style message for the login form re-render.
            session
                .set(session_keys::FLASH, reason.reason_code().to_string())
                .await;
        }
        Redirect::to(&self.settings.login_path).into_response()
    }

    async fn challenge(
        &self,
        request: &RequestView,
        session: Option<&SessionHandle>,
    ) -> Response {
        if let Some(session) = session {
            // Stash where the user was headed; same-site paths only.
            if request.method() == axum::http::Method::GET
                && request.path() != self.settings.login_path
                && request.path().starts_with('/')
            {
                session
                    .set(session_keys::TARGET, request.path().to_string())
                    .await;
            }
        }
        Redirect::to(&self.settings.login_path).into_response()
    }
}
