// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization-code exchange client against a third-party provider.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use super::state::{pkce_challenge, OAuthTransaction};
use crate::config::{env_or_default, env_required};
use crate::error::ConfigError;
use crate::security::badge::ProviderProfile;

/// Outbound call timeout for the token and userinfo endpoints. Both are
/// hard deadlines: a hung provider must fail the attempt, not stall the
/// request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure talking to the provider. Details are for server-side logs;
/// clients only ever see a coarse reason code.
#[derive(Debug, thiserror::Error)]
pub enum OAuthExchangeError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider rejected the exchange: HTTP {0}")]
    Rejected(u16),

    #[error("provider response was invalid: {0}")]
    InvalidResponse(String),
}

/// Static provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthProviderSettings {
    /// Registry name for this provider (`acme`, `github`, ...); part of
    /// the stable identity key together with the provider-scoped id.
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Absolute callback URL registered with the provider.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub use_pkce: bool,
}

impl OAuthProviderSettings {
    /// Load provider settings from `OAUTH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            provider: env_or_default("OAUTH_PROVIDER_NAME", "default"),
            client_id: env_required("OAUTH_CLIENT_ID")?,
            client_secret: env_required("OAUTH_CLIENT_SECRET")?,
            authorize_url: env_required("OAUTH_AUTHORIZE_URL")?,
            token_url: env_required("OAUTH_TOKEN_URL")?,
            userinfo_url: env_required("OAUTH_USERINFO_URL")?,
            redirect_uri: env_required("OAUTH_REDIRECT_URI")?,
            scopes: env_or_default("OAUTH_SCOPES", "openid email profile")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            use_pkce: env_or_default("OAUTH_USE_PKCE", "true") == "true",
        })
    }
}

/// Token endpoint response; only the access token is consumed.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
}

/// Identity as reported by the provider's userinfo endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderUserInfo {
    /// Provider-scoped stable subject id.
    pub provider_id: String,
    pub profile: ProviderProfile,
}

/// HTTP client for one configured provider.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    settings: OAuthProviderSettings,
    authorize_url: Url,
    http: Client,
}

impl OAuthClient {
    /// Build the client, validating every configured endpoint URL up
    /// front. Invalid provider configuration must stop the process at
    /// startup, not surface mid-flow.
    pub fn new(settings: OAuthProviderSettings) -> Result<Self, ConfigError> {
        let authorize_url = parse_url(&settings.authorize_url)?;
        parse_url(&settings.token_url)?;
        parse_url(&settings.userinfo_url)?;
        parse_url(&settings.redirect_uri)?;

        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            settings,
            authorize_url,
            http,
        })
    }

    pub fn provider(&self) -> &str {
        &self.settings.provider
    }

    pub fn use_pkce(&self) -> bool {
        self.settings.use_pkce
    }

    /// Authorization endpoint URL for the browser redirect, carrying
    /// the transaction's state and, when PKCE is on, the S256 challenge
    /// derived from its verifier.
    pub fn authorize_redirect(&self, tx: &OAuthTransaction) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.settings.client_id)
                .append_pair("redirect_uri", &self.settings.redirect_uri)
                .append_pair("scope", &self.settings.scopes.join(" "))
                .append_pair("state", &tx.state);
            if let Some(verifier) = &tx.code_verifier {
                query
                    .append_pair("code_challenge", &pkce_challenge(verifier))
                    .append_pair("code_challenge_method", "S256");
            }
        }
        url
    }

    /// Exchange an authorization code (+ PKCE verifier) for an access
    /// token.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: Option<&str>,
    ) -> Result<String, OAuthExchangeError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ];
        if let Some(verifier) = verifier {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(self.settings.token_url.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthExchangeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Provider error bodies go to server logs only.
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %self.settings.provider, status = %status, body = %body,
                "token endpoint rejected the exchange");
            return Err(OAuthExchangeError::Rejected(status.as_u16()));
        }

        let token: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| OAuthExchangeError::InvalidResponse(e.to_string()))?;
        Ok(token.access_token)
    }

    /// Fetch and normalize the userinfo profile for an access token.
    pub async fn fetch_userinfo(
        &self,
        access_token: &str,
    ) -> Result<ProviderUserInfo, OAuthExchangeError> {
        let response = self
            .http
            .get(self.settings.userinfo_url.as_str())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthExchangeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(provider = %self.settings.provider, status = %status,
                "userinfo endpoint rejected the access token");
            return Err(OAuthExchangeError::Rejected(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OAuthExchangeError::InvalidResponse(e.to_string()))?;

        let provider_id = subject_id(&body).ok_or_else(|| {
            OAuthExchangeError::InvalidResponse("userinfo carries no subject id".to_string())
        })?;

        Ok(ProviderUserInfo {
            provider_id,
            profile: ProviderProfile {
                email: body
                    .get("email")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                display_name: body
                    .get("name")
                    .or_else(|| body.get("login"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
        })
    }
}

/// Providers report the stable subject as OIDC `sub` or a plain `id`
/// (sometimes numeric); numbers normalize to their decimal form.
fn subject_id(body: &serde_json::Value) -> Option<String> {
    for field in ["sub", "id"] {
        match body.get(field) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })
}
