// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values
//! used throughout the application. Configuration is loaded from the
//! environment at startup and immutable afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `TOKEN_ALGORITHM` | Pinned bearer-token algorithm (`HS256`, ...) | `HS256` |
//! | `TOKEN_HMAC_SECRET` | Shared secret for HS* verification | Required for bearer firewalls |
//! | `TOKEN_PUBLIC_KEY_PEM` | Public key PEM for RS*/ES*/EdDSA | Required for asymmetric algorithms |
//! | `OAUTH_PROVIDER_NAME` | Registry name of the OAuth provider | `default` |
//! | `OAUTH_CLIENT_ID` | OAuth client id | Required for OAuth firewalls |
//! | `OAUTH_CLIENT_SECRET` | OAuth client secret | Required for OAuth firewalls |
//! | `OAUTH_AUTHORIZE_URL` | Provider authorization endpoint | Required for OAuth firewalls |
//! | `OAUTH_TOKEN_URL` | Provider token endpoint | Required for OAuth firewalls |
//! | `OAUTH_USERINFO_URL` | Provider userinfo endpoint | Required for OAuth firewalls |
//! | `OAUTH_REDIRECT_URI` | Registered callback URL | Required for OAuth firewalls |
//! | `OAUTH_SCOPES` | Space-separated scope list | `openid email profile` |
//! | `OAUTH_USE_PKCE` | Enable PKCE (`true`/`false`) | `true` |
//! | `SESSION_COOKIE` | Session cookie name | `gk_session` |
//! | `SESSION_TTL_SECONDS` | Session cookie lifetime | `86400` |

use std::env;

use crate::error::ConfigError;

/// Environment variable name for the server bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name selecting `json` or `pretty` log output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Environment variable name for the pinned bearer-token algorithm.
pub const TOKEN_ALGORITHM_ENV: &str = "TOKEN_ALGORITHM";

/// Environment variable name for the HS* shared secret.
pub const TOKEN_HMAC_SECRET_ENV: &str = "TOKEN_HMAC_SECRET";

/// Environment variable name for the asymmetric public key PEM.
pub const TOKEN_PUBLIC_KEY_PEM_ENV: &str = "TOKEN_PUBLIC_KEY_PEM";

/// Environment variable name for the session cookie name.
pub const SESSION_COOKIE_ENV: &str = "SESSION_COOKIE";

/// Environment variable name for the session lifetime in seconds.
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECONDS";

/// Read an environment variable, falling back to a default.
pub fn env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read a required environment variable; absence is a fatal
/// configuration error.
pub fn env_required(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingSecret(name.to_string()))
}
