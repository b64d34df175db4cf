// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request orchestration.
//!
//! Phases run strictly in order and none is skipped: dispatch →
//! authenticate → badge-verify → resolve-principal → access-control.
//! All state here is per-request; the pipeline itself is immutable after
//! construction and shared by reference across concurrent requests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, request::Parts, HeaderValue, Request};
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{debug, warn};
use uuid::Uuid;

use super::access::{AccessDecision, AccessPolicy, DefaultPolicy, RequiredRoles};
use super::authenticator::SuccessAction;
use super::badge::{Badge, BadgeKind};
use super::checkers::{
    Argon2PasswordChecker, ConstantTimeCsrfChecker, CsrfChecker, PasswordChecker,
};
use super::error::AuthError;
use super::firewall::{Firewall, FirewallConfig, FirewallDispatcher, SessionSettings};
use super::passport::Passport;
use super::principal::Principal;
use super::request::RequestView;
use super::session_keys;
use crate::error::ConfigError;
use crate::models::{UserKey, UserRecord};
use crate::session::{SessionHandle, SessionStore};

/// Upper bound on buffered login form bodies.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// Default deadline for user-provider lookups. Timeout is a
/// verification failure, never success-by-default.
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// The declarative configuration surface, consumed once at startup.
pub struct SecurityConfig {
    pub firewalls: Vec<FirewallConfig>,
    /// Ordered access rules; declaration order is authoritative.
    pub access_rules: Vec<(String, RequiredRoles)>,
    pub default_policy: DefaultPolicy,
}

/// Outcome of [`SecurityPipeline::handle`].
pub enum Handled {
    /// Authentication and access control passed; the request continues
    /// to the application handler with the principal (if any) in its
    /// extensions.
    Proceed(Request<Body>),
    /// The pipeline short-circuited with this response.
    Respond(Response),
}

/// The top-level entry point the HTTP layer invokes before dispatching
/// to any application handler.
pub struct SecurityPipeline {
    dispatcher: FirewallDispatcher,
    access: AccessPolicy,
    sessions: Arc<dyn SessionStore>,
    password_checker: Arc<dyn PasswordChecker>,
    csrf_checker: Arc<dyn CsrfChecker>,
    lookup_timeout: Duration,
}

impl SecurityPipeline {
    /// Compile and validate the whole configuration. Any error here is
    /// fatal: the process must refuse to start rather than run with an
    /// ambiguous policy.
    pub fn new(
        config: SecurityConfig,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            dispatcher: FirewallDispatcher::build(config.firewalls)?,
            access: AccessPolicy::build(config.access_rules, config.default_policy)?,
            sessions,
            password_checker: Arc::new(Argon2PasswordChecker),
            csrf_checker: Arc::new(ConstantTimeCsrfChecker),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        })
    }

    pub fn with_password_checker(mut self, checker: Arc<dyn PasswordChecker>) -> Self {
        self.password_checker = checker;
        self
    }

    pub fn with_csrf_checker(mut self, checker: Arc<dyn CsrfChecker>) -> Self {
        self.csrf_checker = checker;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Run the full pipeline for one request.
    pub async fn handle(&self, request: Request<Body>) -> Handled {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();

        let Some(firewall) = self.dispatcher.select(&path) else {
            // Implicit anonymous catch-all: no authenticators, access
            // control still gates the request.
            return match self.access.evaluate(&path, None) {
                AccessDecision::Allow => Handled::Proceed(Request::from_parts(parts, body)),
                AccessDecision::Deny => {
                    Handled::Respond(AuthError::AuthenticationRequired.into_response())
                }
            };
        };

        // Buffer the body only when the form strategy will read it.
        let (view, body) = if firewall.wants_form_body(&parts) {
            match to_bytes(body, FORM_BODY_LIMIT).await {
                Ok(bytes) => {
                    let view = RequestView::from_parts(&parts, Some(bytes.as_ref()));
                    (view, Body::from(bytes))
                }
                Err(e) => {
                    warn!(error = %e, "failed to buffer login form body");
                    (RequestView::from_parts(&parts, Some(&[])), Body::empty())
                }
            }
        } else {
            (RequestView::from_parts(&parts, None), body)
        };

        let session = firewall
            .session_settings()
            .map(|settings| self.session_handle(&view, settings));

        // Logout tears the session down before anything else runs.
        if let (Some(form), Some(session)) = (firewall.form_settings(), session.as_ref()) {
            if form.logout_path.as_deref() == Some(path.as_str()) {
                session.invalidate().await;
                let mut response = Redirect::to(&form.login_path).into_response();
                append_cookie(&mut response, &session.clear_cookie_value());
                return Handled::Respond(response);
            }
        }

        if let Some(active) = firewall.active_authenticator(&view) {
            let strategy = active.strategy();
            debug!(
                firewall = firewall.name(),
                strategy = strategy.name(),
                "authenticator claimed request"
            );

            let passport = match strategy.authenticate(&view, session.as_ref()).await {
                Ok(Some(passport)) if passport.is_empty() => {
                    // Rejected before any checker runs.
                    warn!(
                        firewall = firewall.name(),
                        strategy = strategy.name(),
                        "authenticator produced an empty passport"
                    );
                    return self
                        .fail(strategy, &view, AuthError::InvalidCredentials, session.as_ref())
                        .await;
                }
                Ok(Some(passport)) => passport,
                Ok(None) => {
                    // Claimed but not applicable after all; fall back to
                    // the anonymous path.
                    return self.anonymous(firewall, &view, &path, parts, body, session.as_ref()).await;
                }
                Err(reason) => {
                    return self.fail(strategy, &view, reason, session.as_ref()).await;
                }
            };

            let mut passport = passport;
            let principal = match self
                .verify_and_resolve(firewall, &mut passport, session.as_ref())
                .await
            {
                Ok(principal) => principal,
                Err(reason) => {
                    return self.fail(strategy, &view, reason, session.as_ref()).await;
                }
            };

            debug!(
                firewall = firewall.name(),
                strategy = strategy.name(),
                user = %principal.key(),
                "authentication succeeded"
            );

            match strategy.on_success(&principal, &view, session.as_ref()).await {
                SuccessAction::Respond(response) => {
                    Handled::Respond(finalize(response, session.as_ref()))
                }
                SuccessAction::Continue => self.authorize(&path, principal, parts, body),
            }
        } else if let Some(principal) = self.restore_from_session(firewall, session.as_ref()).await
        {
            self.authorize(&path, principal, parts, body)
        } else {
            self.anonymous(firewall, &view, &path, parts, body, session.as_ref()).await
        }
    }

    /// Anonymous continuation: access control decides, and a denial
    /// hands the request to the firewall's entry point to begin
    /// authentication.
    async fn anonymous(
        &self,
        firewall: &Firewall,
        view: &RequestView,
        path: &str,
        parts: Parts,
        body: Body,
        session: Option<&SessionHandle>,
    ) -> Handled {
        match self.access.evaluate(path, None) {
            AccessDecision::Allow => Handled::Proceed(Request::from_parts(parts, body)),
            AccessDecision::Deny => match firewall.entry_point() {
                Some(entry) => {
                    let response = entry.strategy().challenge(view, session).await;
                    Handled::Respond(finalize(response, session))
                }
                None => Handled::Respond(AuthError::AuthenticationRequired.into_response()),
            },
        }
    }

    /// Access control for a resolved principal; the hard gate before
    /// any application handler runs.
    fn authorize(&self, path: &str, principal: Principal, mut parts: Parts, body: Body) -> Handled {
        match self.access.evaluate(path, Some(&principal)) {
            AccessDecision::Allow => {
                parts.extensions.insert(principal);
                Handled::Proceed(Request::from_parts(parts, body))
            }
            AccessDecision::Deny => {
                // Forbidden, not "please log in": the principal exists.
                Handled::Respond(AuthError::InsufficientRole.into_response())
            }
        }
    }

    async fn fail(
        &self,
        strategy: &dyn super::authenticator::AuthenticationStrategy,
        view: &RequestView,
        reason: AuthError,
        session: Option<&SessionHandle>,
    ) -> Handled {
        warn!(
            strategy = strategy.name(),
            reason = reason.reason_code(),
            "authentication failed"
        );
        let response = strategy.on_failure(view, reason, session).await;
        Handled::Respond(finalize(response, session))
    }

    /// Run the checkers required by the badges present (each exactly
    /// once) and resolve the passport to a principal.
    async fn verify_and_resolve(
        &self,
        firewall: &Firewall,
        passport: &mut Passport,
        session: Option<&SessionHandle>,
    ) -> Result<Principal, AuthError> {
        // CSRF first: cheapest check, and nothing else may run if the
        // request cannot prove same-origin intent.
        if passport.has(BadgeKind::CsrfToken) {
            let Badge::CsrfToken(presented) = passport.consume(BadgeKind::CsrfToken)? else {
                return Err(AuthError::InvalidCsrf);
            };
            let presented = presented.clone();
            let expected = match session {
                Some(session) => session.get(session_keys::CSRF_TOKEN).await,
                None => None,
            }
            .ok_or(AuthError::InvalidCsrf)?;
            if !self.csrf_checker.verify(&presented, &expected) {
                return Err(AuthError::InvalidCsrf);
            }
        }

        let principal = if passport.has(BadgeKind::VerifiedClaims) {
            let Badge::VerifiedClaims(claims) = passport.consume(BadgeKind::VerifiedClaims)? else {
                return Err(AuthError::InvalidToken);
            };
            // Stateless by design: the principal is rebuilt from claims
            // alone, no datastore round-trip.
            Principal::Virtual(claims.clone())
        } else if passport.has(BadgeKind::ProviderIdentity) {
            let Badge::ProviderIdentity {
                provider,
                provider_id,
                profile,
            } = passport.consume(BadgeKind::ProviderIdentity)?
            else {
                return Err(AuthError::InvalidCredentials);
            };
            let (provider, provider_id, profile) =
                (provider.clone(), provider_id.clone(), profile.clone());

            let user = self
                .lookup(firewall, |p| async move {
                    p.resolve_provider_identity(&provider, &provider_id, &profile)
                        .await
                })
                .await?
                .ok_or(AuthError::InvalidCredentials)?;
            Principal::Real(user)
        } else if passport.has(BadgeKind::UserIdentifier) {
            let Badge::UserIdentifier(identifier) = passport.consume(BadgeKind::UserIdentifier)?
            else {
                return Err(AuthError::InvalidCredentials);
            };
            let identifier = identifier.clone();

            let user = self
                .lookup(firewall, |p| async move {
                    p.find_by_identifier(&identifier).await
                })
                .await?
                .ok_or(AuthError::InvalidCredentials)?;

            // Password checked exactly once, constant-time.
            let Badge::Password(password) = passport.consume(BadgeKind::Password)? else {
                return Err(AuthError::InvalidCredentials);
            };
            let password = password.clone();
            let hash = user
                .password_hash
                .as_deref()
                .ok_or(AuthError::InvalidCredentials)?;
            if !self.password_checker.verify(&password, hash) {
                return Err(AuthError::InvalidCredentials);
            }
            Principal::Real(user)
        } else {
            return Err(AuthError::InvalidCredentials);
        };

        passport.resolve(principal.clone())?;
        Ok(principal)
    }

    /// Re-authenticate a session-backed request from its stored user
    /// key. Provider failure fails closed: the request continues as
    /// anonymous and access control decides.
    async fn restore_from_session(
        &self,
        firewall: &Firewall,
        session: Option<&SessionHandle>,
    ) -> Option<Principal> {
        let session = session?;
        let key = session.get(session_keys::USER_KEY).await?;

        match self
            .lookup(firewall, |p| async move { p.find_by_key(&UserKey(key)).await })
            .await
        {
            Ok(Some(user)) => Some(Principal::Real(user)),
            Ok(None) => {
                // Stale session pointing at a removed account.
                session.remove(session_keys::USER_KEY).await;
                None
            }
            Err(_) => None,
        }
    }

    /// User-provider call with the pipeline's timeout; timeout and
    /// backend failure collapse to one fail-closed error.
    async fn lookup<F, Fut>(
        &self,
        firewall: &Firewall,
        call: F,
    ) -> Result<Option<UserRecord>, AuthError>
    where
        F: FnOnce(Arc<dyn crate::providers::UserProvider>) -> Fut,
        Fut: std::future::Future<
            Output = Result<Option<UserRecord>, crate::providers::ProviderError>,
        >,
    {
        let provider = firewall.user_provider().clone();
        match tokio::time::timeout(self.lookup_timeout, call(provider)).await {
            Ok(Ok(user)) => Ok(user),
            Ok(Err(e)) => {
                warn!(error = %e, "user provider failed");
                Err(AuthError::ProviderUnavailable)
            }
            Err(_) => {
                warn!("user provider lookup timed out");
                Err(AuthError::ProviderUnavailable)
            }
        }
    }

    fn session_handle(&self, view: &RequestView, settings: &SessionSettings) -> SessionHandle {
        match view.cookie(&settings.cookie_name) {
            Some(id) => SessionHandle::new(
                self.sessions.clone(),
                settings.cookie_name.clone(),
                settings.ttl_seconds,
                id.to_string(),
                false,
            ),
            None => SessionHandle::new(
                self.sessions.clone(),
                settings.cookie_name.clone(),
                settings.ttl_seconds,
                Uuid::new_v4().to_string(),
                true,
            ),
        }
    }
}

/// Establish a freshly created session on the client before the
/// short-circuit response goes out.
fn finalize(mut response: Response, session: Option<&SessionHandle>) -> Response {
    if let Some(session) = session {
        if session.is_fresh() {
            append_cookie(&mut response, &session.set_cookie_value());
        }
    }
    response
}

fn append_cookie(response: &mut Response, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoleSet, UserRecord};
    use crate::providers::InMemoryUserProvider;
    use crate::security::authenticator::form::{FormLoginSettings, IDENTIFIER_FIELD, PASSWORD_FIELD};
    use crate::security::checkers::hash_password;
    use crate::security::firewall::AuthenticatorConfig;
    use crate::session::{InMemorySessionStore, SessionStore};
    use crate::token::TokenVerifierSettings;
    use axum::body::to_bytes as body_to_bytes;
    use chrono::Utc;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use std::sync::atomic::{AtomicBool, Ordering};

    const SECRET: &[u8] = b"pipeline-test-secret";

    fn token(roles: &[&str], exp_offset: i64) -> String {
        let claims = serde_json::json!({
            "sub": "42",
            "user_id": 42,
            "email": "a@b.com",
            "roles": roles,
            "exp": Utc::now().timestamp() + exp_offset,
        });
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    async fn seeded_provider() -> Arc<InMemoryUserProvider> {
        let provider = Arc::new(InMemoryUserProvider::new());
        provider
            .insert_user(UserRecord {
                key: UserKey::from("u1"),
                identifier: "ada@acme.test".to_string(),
                password_hash: Some(hash_password("hunter2").unwrap()),
                roles: RoleSet::new(["ROLE_USER"]).unwrap(),
                display_name: Some("Ada".to_string()),
            })
            .await;
        provider
    }

    fn rules() -> Vec<(String, RequiredRoles)> {
        vec![
            ("^/login".to_string(), RequiredRoles::Anonymous),
            (
                "^/api/admin".to_string(),
                RequiredRoles::AnyOf(vec!["ROLE_ADMIN".to_string()]),
            ),
            (
                "^/api".to_string(),
                RequiredRoles::AnyOf(vec!["ROLE_USER".to_string()]),
            ),
            (
                "^/".to_string(),
                RequiredRoles::AnyOf(vec!["ROLE_USER".to_string()]),
            ),
        ]
    }

    async fn pipeline(
        csrf_enabled: bool,
    ) -> (SecurityPipeline, Arc<InMemorySessionStore>) {
        let provider = seeded_provider().await;
        let sessions = Arc::new(InMemorySessionStore::new());
        let config = SecurityConfig {
            firewalls: vec![
                FirewallConfig {
                    name: "api".to_string(),
                    pattern: "^/api".to_string(),
                    authenticators: vec![AuthenticatorConfig::Bearer(
                        TokenVerifierSettings::hmac(Algorithm::HS256, SECRET),
                    )],
                    session: None,
                    user_provider: provider.clone(),
                },
                FirewallConfig {
                    name: "main".to_string(),
                    pattern: "^/".to_string(),
                    authenticators: vec![AuthenticatorConfig::FormLogin(FormLoginSettings {
                        csrf_enabled,
                        ..FormLoginSettings::default()
                    })],
                    session: Some(SessionSettings::default()),
                    user_provider: provider,
                },
            ],
            access_rules: rules(),
            default_policy: DefaultPolicy::Deny,
        };
        let pipeline = SecurityPipeline::new(config, sessions.clone()).unwrap();
        (pipeline, sessions)
    }

    fn bearer_request(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn login_request(body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/login")
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = body_to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn valid_bearer_request_proceeds_with_virtual_principal() {
        let (pipeline, _) = pipeline(false).await;
        let handled = pipeline
            .handle(bearer_request("/api/things", Some(&token(&["ROLE_USER"], 3600))))
            .await;

        let Handled::Proceed(request) = handled else {
            panic!("valid token must proceed");
        };
        let principal = request.extensions().get::<Principal>().unwrap();
        assert_eq!(principal.key(), &UserKey::from("42"));
        assert!(principal.roles().contains("ROLE_USER"));
        assert!(principal.is_virtual());
    }

    #[tokio::test]
    async fn expired_bearer_token_is_401_expired_token() {
        let (pipeline, _) = pipeline(false).await;
        let handled = pipeline
            .handle(bearer_request("/api/things", Some(&token(&["ROLE_USER"], -10))))
            .await;

        let Handled::Respond(response) = handled else {
            panic!("expired token must be rejected");
        };
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"type": "expired_token"})
        );
    }

    #[tokio::test]
    async fn missing_token_on_api_is_401_missing_token() {
        let (pipeline, _) = pipeline(false).await;
        let handled = pipeline.handle(bearer_request("/api/things", None)).await;

        let Handled::Respond(response) = handled else {
            panic!("anonymous api request must be challenged");
        };
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"type": "missing_token"})
        );
    }

    #[tokio::test]
    async fn authenticated_but_underprivileged_is_403() {
        let (pipeline, _) = pipeline(false).await;
        let handled = pipeline
            .handle(bearer_request("/api/admin/ops", Some(&token(&["ROLE_USER"], 3600))))
            .await;

        let Handled::Respond(response) = handled else {
            panic!("underprivileged request must be rejected");
        };
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"type": "insufficient_role"})
        );
    }

    #[tokio::test]
    async fn admin_role_passes_the_admin_rule() {
        let (pipeline, _) = pipeline(false).await;
        let handled = pipeline
            .handle(bearer_request(
                "/api/admin/ops",
                Some(&token(&["ROLE_ADMIN", "ROLE_USER"], 3600)),
            ))
            .await;
        assert!(matches!(handled, Handled::Proceed(_)));
    }

    #[tokio::test]
    async fn form_login_establishes_session_then_restores_it() {
        let (pipeline, sessions) = pipeline(false).await;

        let handled = pipeline
            .handle(login_request(
                &format!("{IDENTIFIER_FIELD}=ada%40acme.test&{PASSWORD_FIELD}=hunter2"),
                None,
            ))
            .await;
        let Handled::Respond(response) = handled else {
            panic!("login must redirect");
        };
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("fresh session must set the cookie")
            .to_str()
            .unwrap()
            .to_string();
        let sid = cookie
            .strip_prefix("gk_session=")
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        assert_eq!(
            sessions.get(&sid, session_keys::USER_KEY).await.as_deref(),
            Some("u1")
        );

        // Session restore on the next request.
        let handled = pipeline
            .handle(
                Request::get("/dashboard")
                    .header("cookie", format!("gk_session={sid}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        let Handled::Proceed(request) = handled else {
            panic!("session-backed request must proceed");
        };
        let principal = request.extensions().get::<Principal>().unwrap();
        assert_eq!(principal.key(), &UserKey::from("u1"));
        assert!(!principal.is_virtual());
    }

    #[tokio::test]
    async fn wrong_password_redirects_back_with_flash() {
        let (pipeline, sessions) = pipeline(false).await;

        let handled = pipeline
            .handle(login_request(
                &format!("{IDENTIFIER_FIELD}=ada%40acme.test&{PASSWORD_FIELD}=wrong"),
                None,
            ))
            .await;
        let Handled::Respond(response) = handled else {
            panic!("failed login must redirect");
        };
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        let sid = cookie
            .strip_prefix("gk_session=")
            .unwrap()
            .split(';')
            .next()
            .unwrap();
        assert_eq!(
            sessions.get(sid, session_keys::FLASH).await.as_deref(),
            Some("invalid_credentials")
        );
    }

    #[tokio::test]
    async fn unknown_identifier_and_wrong_password_share_one_reason() {
        let (pipeline, sessions) = pipeline(false).await;

        let handled = pipeline
            .handle(login_request(
                &format!("{IDENTIFIER_FIELD}=nobody%40acme.test&{PASSWORD_FIELD}=hunter2"),
                None,
            ))
            .await;
        let Handled::Respond(response) = handled else {
            panic!("unknown user must fail");
        };
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        let sid = cookie
            .strip_prefix("gk_session=")
            .unwrap()
            .split(';')
            .next()
            .unwrap();
        assert_eq!(
            sessions.get(sid, session_keys::FLASH).await.as_deref(),
            Some("invalid_credentials")
        );
    }

    struct RecordingPasswordChecker {
        called: AtomicBool,
    }

    impl crate::security::checkers::PasswordChecker for RecordingPasswordChecker {
        fn verify(&self, _plaintext: &str, _stored_hash: &str) -> bool {
            self.called.store(true, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn csrf_mismatch_fails_before_the_password_check() {
        let (pipeline, sessions) = pipeline(true).await;
        let checker = Arc::new(RecordingPasswordChecker {
            called: AtomicBool::new(false),
        });
        let pipeline = pipeline.with_password_checker(checker.clone());

        // Session exists but holds a different expected CSRF token.
        let sid = sessions.create().await;
        sessions
            .set(&sid, session_keys::CSRF_TOKEN, "expected-token".to_string())
            .await;

        let handled = pipeline
            .handle(login_request(
                &format!(
                    "{IDENTIFIER_FIELD}=ada%40acme.test&{PASSWORD_FIELD}=hunter2&_csrf_token=forged"
                ),
                Some(&format!("gk_session={sid}")),
            ))
            .await;

        let Handled::Respond(response) = handled else {
            panic!("csrf mismatch must fail");
        };
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
        assert!(
            !checker.called.load(Ordering::SeqCst),
            "password checker must not run after a csrf failure"
        );
        assert_eq!(
            sessions.get(&sid, session_keys::FLASH).await.as_deref(),
            Some("invalid_csrf")
        );
    }

    #[tokio::test]
    async fn matching_csrf_token_lets_the_login_through() {
        let (pipeline, sessions) = pipeline(true).await;

        let sid = sessions.create().await;
        sessions
            .set(&sid, session_keys::CSRF_TOKEN, "expected-token".to_string())
            .await;

        let handled = pipeline
            .handle(login_request(
                &format!(
                    "{IDENTIFIER_FIELD}=ada%40acme.test&{PASSWORD_FIELD}=hunter2&_csrf_token=expected-token"
                ),
                Some(&format!("gk_session={sid}")),
            ))
            .await;

        let Handled::Respond(response) = handled else {
            panic!("login must redirect");
        };
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
        assert_eq!(
            sessions.get(&sid, session_keys::USER_KEY).await.as_deref(),
            Some("u1")
        );
    }

    #[tokio::test]
    async fn anonymous_rule_allows_the_login_page() {
        let (pipeline, _) = pipeline(false).await;
        let handled = pipeline
            .handle(Request::get("/login").body(Body::empty()).unwrap())
            .await;
        assert!(matches!(handled, Handled::Proceed(_)));
    }

    #[tokio::test]
    async fn anonymous_denial_on_browser_firewall_redirects_to_login() {
        let (pipeline, _) = pipeline(false).await;
        let handled = pipeline
            .handle(Request::get("/dashboard").body(Body::empty()).unwrap())
            .await;

        let Handled::Respond(response) = handled else {
            panic!("anonymous page request must be challenged");
        };
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() {
        let (pipeline, sessions) = pipeline(false).await;
        let sid = sessions.create().await;
        sessions
            .set(&sid, session_keys::USER_KEY, "u1".to_string())
            .await;

        let handled = pipeline
            .handle(
                Request::get("/logout")
                    .header("cookie", format!("gk_session={sid}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        let Handled::Respond(response) = handled else {
            panic!("logout must redirect");
        };
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
        assert_eq!(sessions.get(&sid, session_keys::USER_KEY).await, None);
        let cleared = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cleared.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn stale_session_falls_back_to_challenge() {
        let (pipeline, sessions) = pipeline(false).await;
        let sid = sessions.create().await;
        sessions
            .set(&sid, session_keys::USER_KEY, "gone".to_string())
            .await;

        let handled = pipeline
            .handle(
                Request::get("/dashboard")
                    .header("cookie", format!("gk_session={sid}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        let Handled::Respond(response) = handled else {
            panic!("stale session must not authenticate");
        };
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
        // The stale key is gone so the next request skips the lookup.
        assert_eq!(sessions.get(&sid, session_keys::USER_KEY).await, None);
    }

    #[tokio::test]
    async fn path_outside_every_firewall_uses_default_policy() {
        let provider = seeded_provider().await;
        let sessions = Arc::new(InMemorySessionStore::new());
        let config = SecurityConfig {
            firewalls: vec![FirewallConfig {
                name: "api".to_string(),
                pattern: "^/api".to_string(),
                authenticators: vec![AuthenticatorConfig::Bearer(
                    TokenVerifierSettings::hmac(Algorithm::HS256, SECRET),
                )],
                session: None,
                user_provider: provider,
            }],
            access_rules: vec![("^/public".to_string(), RequiredRoles::Anonymous)],
            default_policy: DefaultPolicy::Deny,
        };
        let pipeline = SecurityPipeline::new(config, sessions).unwrap();

        let allowed = pipeline
            .handle(Request::get("/public/docs").body(Body::empty()).unwrap())
            .await;
        assert!(matches!(allowed, Handled::Proceed(_)));

        let denied = pipeline
            .handle(Request::get("/elsewhere").body(Body::empty()).unwrap())
            .await;
        let Handled::Respond(response) = denied else {
            panic!("default deny must reject");
        };
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
