// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Demo service wiring the security pipeline in front of a small
//! application router. Production services embed the pipeline the same
//! way and supply their own user provider and session backend.

use std::{env, net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::Html,
    routing::get,
    Json, Router,
};
use jsonwebtoken::Algorithm;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relational_gatekeeper::config::{
    env_or_default, HOST_ENV, LOG_FORMAT_ENV, PORT_ENV, SESSION_COOKIE_ENV, SESSION_TTL_ENV,
    TOKEN_ALGORITHM_ENV, TOKEN_HMAC_SECRET_ENV, TOKEN_PUBLIC_KEY_PEM_ENV,
};
use relational_gatekeeper::config::env_required;
use relational_gatekeeper::error::ConfigError;
use relational_gatekeeper::models::{RoleSet, UserKey, UserRecord};
use relational_gatekeeper::oauth::OAuthProviderSettings;
use relational_gatekeeper::providers::InMemoryUserProvider;
use relational_gatekeeper::security::authenticator::{FormLoginSettings, OAuthLoginSettings};
use relational_gatekeeper::security::checkers::hash_password;
use relational_gatekeeper::security::{
    middleware, AuthenticatorConfig, CurrentUser, DefaultPolicy, FirewallConfig, PrincipalView,
    RequiredRoles, SecurityConfig, SecurityPipeline, SessionSettings,
};
use relational_gatekeeper::security::session_keys;
use relational_gatekeeper::session::{InMemorySessionStore, SessionStore};
use relational_gatekeeper::state::AppState;
use relational_gatekeeper::token::TokenVerifierSettings;

#[tokio::main]
async fn main() {
    init_tracing();

    let app = match build_app().await {
        Ok(app) => app,
        Err(e) => {
            // Ambiguous security policy must never serve traffic.
            error!(error = %e, "refusing to start: invalid security configuration");
            std::process::exit(1);
        }
    };

    let host = env_or_default(HOST_ENV, "0.0.0.0");
    let port: u16 = env_or_default(PORT_ENV, "8080").parse().unwrap_or(8080);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    info!(%addr, "Relational Gatekeeper demo listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("Server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    if env_or_default(LOG_FORMAT_ENV, "pretty") == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_app() -> Result<Router, ConfigError> {
    let provider = Arc::new(InMemoryUserProvider::new());
    seed_demo_user(&provider).await?;

    let session_cookie = env_or_default(SESSION_COOKIE_ENV, "gk_session");
    let session = SessionSettings {
        cookie_name: session_cookie.clone(),
        ttl_seconds: env_or_default(SESSION_TTL_ENV, "86400").parse().unwrap_or(86_400),
    };

    let mut browser_authenticators = vec![AuthenticatorConfig::FormLogin(FormLoginSettings {
        csrf_enabled: false,
        ..FormLoginSettings::default()
    })];
    if oauth_configured() {
        let provider_settings = OAuthProviderSettings::from_env()?;
        let callback_path = url::Url::parse(&provider_settings.redirect_uri)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/oauth/callback".to_string());
        browser_authenticators.push(AuthenticatorConfig::OAuth(OAuthLoginSettings {
            provider: provider_settings,
            callback_path,
            default_target: "/".to_string(),
            failure_target: "/login".to_string(),
        }));
    }

    let config = SecurityConfig {
        firewalls: vec![
            FirewallConfig {
                name: "api".to_string(),
                pattern: "^/api".to_string(),
                authenticators: vec![AuthenticatorConfig::Bearer(token_settings()?)],
                session: None,
                user_provider: provider.clone(),
            },
            FirewallConfig {
                name: "main".to_string(),
                pattern: "^/".to_string(),
                authenticators: browser_authenticators,
                session: Some(session),
                user_provider: provider,
            },
        ],
        access_rules: vec![
            ("^/healthz$".to_string(), RequiredRoles::Anonymous),
            ("^/login".to_string(), RequiredRoles::Anonymous),
            (
                "^/api".to_string(),
                RequiredRoles::AnyOf(vec!["ROLE_USER".to_string()]),
            ),
            (
                "^/".to_string(),
                RequiredRoles::AnyOf(vec!["ROLE_USER".to_string()]),
            ),
        ],
        default_policy: DefaultPolicy::Deny,
    };

    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let state = AppState::new(sessions.clone(), session_cookie);
    let pipeline = Arc::new(SecurityPipeline::new(config, sessions)?);

    let router = Router::new()
        .route("/", get(home))
        .route("/login", get(login_page))
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/me", get(me))
        .with_state(state);

    Ok(middleware::apply(router, pipeline)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive()))
}

/// Pinned verifier settings from the environment.
fn token_settings() -> Result<TokenVerifierSettings, ConfigError> {
    let raw = env_or_default(TOKEN_ALGORITHM_ENV, "HS256");
    let algorithm: Algorithm = raw
        .parse()
        .map_err(|_| ConfigError::InvalidKey(format!("unsupported token algorithm `{raw}`")))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(TokenVerifierSettings::hmac(
            algorithm,
            env_required(TOKEN_HMAC_SECRET_ENV)?.into_bytes(),
        )),
        _ => Ok(TokenVerifierSettings::public_key_pem(
            algorithm,
            env_required(TOKEN_PUBLIC_KEY_PEM_ENV)?,
        )),
    }
}

fn oauth_configured() -> bool {
    env::var("OAUTH_CLIENT_ID").is_ok_and(|v| !v.trim().is_empty())
}

/// Seed a login-capable account when `SEED_USER_IDENTIFIER` and
/// `SEED_USER_PASSWORD` are set.
async fn seed_demo_user(provider: &InMemoryUserProvider) -> Result<(), ConfigError> {
    let (Ok(identifier), Ok(password)) = (
        env::var("SEED_USER_IDENTIFIER"),
        env::var("SEED_USER_PASSWORD"),
    ) else {
        return Ok(());
    };

    let password_hash = hash_password(&password)
        .map_err(|e| ConfigError::MissingSecret(format!("failed to hash seed password: {e}")))?;
    provider
        .insert_user(UserRecord {
            key: UserKey::from("seed-1"),
            identifier,
            password_hash: Some(password_hash),
            roles: RoleSet::new(["ROLE_USER"]).expect("static role list"),
            display_name: Some("Seed User".to_string()),
        })
        .await;
    Ok(())
}

async fn home(CurrentUser(principal): CurrentUser) -> Html<String> {
    Html(format!(
        "<h1>Signed in as {}</h1><p><a href=\"/logout\">Log out</a></p>",
        principal.identifier()
    ))
}

async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    // One-shot flash message left by a failed attempt.
    let flash = match cookie_value(&headers, &state.session_cookie) {
        Some(sid) => state.sessions.take(&sid, session_keys::FLASH).await,
        None => None,
    };
    let notice = flash
        .map(|reason| format!("<p>Sign-in failed: {reason}</p>\n"))
        .unwrap_or_default();

    Html(format!(
        r#"{notice}<form method="post" action="/login">
  <input name="_identifier" type="email" placeholder="email" autofocus>
  <input name="_password" type="password" placeholder="password">
  <button type="submit">Sign in</button>
</form>"#,
    ))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

async fn me(CurrentUser(principal): CurrentUser) -> Json<PrincipalView> {
    Json(PrincipalView::from(&principal))
}
