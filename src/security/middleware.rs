// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum integration: the pipeline as a middleware layer.
//!
//! The web server invokes the pipeline exactly once per request, before
//! any application handler runs.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};

use super::pipeline::{Handled, SecurityPipeline};

/// Wrap `router` so every request passes through the security pipeline.
///
/// Example:
/// ```ignore
/// let app = Router::new().route("/api/me", get(me));
/// let app = middleware::apply(app, pipeline.clone());
/// ```
pub fn apply<S>(router: Router<S>, pipeline: Arc<SecurityPipeline>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(pipeline, security_middleware))
}

async fn security_middleware(
    State(pipeline): State<Arc<SecurityPipeline>>,
    request: Request,
    next: Next,
) -> Response {
    match pipeline.handle(request).await {
        Handled::Proceed(request) => next.run(request).await,
        Handled::Respond(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoleSet, UserKey, UserRecord};
    use crate::providers::InMemoryUserProvider;
    use crate::security::access::{DefaultPolicy, RequiredRoles};
    use crate::security::extractor::CurrentUser;
    use crate::security::firewall::{AuthenticatorConfig, FirewallConfig};
    use crate::security::pipeline::SecurityConfig;
    use crate::security::principal::PrincipalView;
    use crate::session::InMemorySessionStore;
    use crate::token::TokenVerifierSettings;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::Json;
    use chrono::Utc;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use tower::ServiceExt;

    const SECRET: &[u8] = b"middleware-test-secret";

    async fn me(CurrentUser(principal): CurrentUser) -> Json<PrincipalView> {
        Json(PrincipalView::from(&principal))
    }

    async fn app() -> Router {
        let provider = std::sync::Arc::new(InMemoryUserProvider::new());
        provider
            .insert_user(UserRecord {
                key: UserKey::from("u1"),
                identifier: "ada@acme.test".to_string(),
                password_hash: None,
                roles: RoleSet::new(["ROLE_USER"]).unwrap(),
                display_name: None,
            })
            .await;

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
            access_rules: vec![(
                "^/api".to_string(),
                RequiredRoles::AnyOf(vec!["ROLE_USER".to_string()]),
            )],
            default_policy: DefaultPolicy::Deny,
        };
        let pipeline = std::sync::Arc::new(
            SecurityPipeline::new(config, std::sync::Arc::new(InMemorySessionStore::new()))
                .unwrap(),
        );

        apply(Router::new().route("/api/me", get(me)), pipeline)
    }

    fn token(exp_offset: i64) -> String {
        let claims = serde_json::json!({
            "sub": "42",
            "user_id": 42,
            "email": "a@b.com",
            "roles": ["ROLE_USER"],
            "exp": Utc::now().timestamp() + exp_offset,
        });
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn end_to_end_bearer_request_reaches_the_handler() {
        let app = app().await;
        let response = app
            .oneshot(
                HttpRequest::get("/api/me")
                    .header("authorization", format!("Bearer {}", token(3600)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["key"], "42");
        assert_eq!(json["roles"], serde_json::json!(["ROLE_USER"]));
        assert_eq!(json["virtual_principal"], true);
    }

    #[tokio::test]
    async fn end_to_end_expired_token_is_401_with_reason() {
        let app = app().await;
        let response = app
            .oneshot(
                HttpRequest::get("/api/me")
                    .header("authorization", format!("Bearer {}", token(-10)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"type": "expired_token"}));
    }

    #[tokio::test]
    async fn handler_never_runs_without_authentication() {
        let app = app().await;
        let response = app
            .oneshot(HttpRequest::get("/api/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
