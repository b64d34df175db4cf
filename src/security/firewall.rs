// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firewall definitions and first-match dispatch.
//!
//! A firewall binds a path pattern to an ordered authenticator chain, a
//! user provider, and session settings. Definitions are compiled and
//! validated once at startup and immutable afterwards; requests only
//! ever read them through a shared reference.

use std::sync::Arc;

use axum::http::{header, request::Parts, Method};
use regex::Regex;

use super::access::compile_anchored;
use super::authenticator::{
    Authenticator, BearerTokenAuthenticator, FormLoginAuthenticator, OAuthAuthenticator,
};
use super::authenticator::form::FormLoginSettings;
use super::authenticator::oauth::OAuthLoginSettings;
use super::request::RequestView;
use crate::error::ConfigError;
use crate::providers::UserProvider;
use crate::token::{TokenVerifier, TokenVerifierSettings};

/// Session cookie settings for session-backed firewalls.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub ttl_seconds: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "gk_session".to_string(),
            ttl_seconds: 60 * 60 * 24,
        }
    }
}

/// Declarative authenticator binding inside a firewall.
pub enum AuthenticatorConfig {
    Bearer(TokenVerifierSettings),
    FormLogin(FormLoginSettings),
    OAuth(OAuthLoginSettings),
}

/// Declarative firewall definition, consumed once at startup.
pub struct FirewallConfig {
    pub name: String,
    /// Anchored regex over the request path.
    pub pattern: String,
    /// Ordered; the first authenticator whose `supports()` claims a
    /// request is the active one, and the first in the list doubles as
    /// the entry point for anonymous requests that get denied.
    pub authenticators: Vec<AuthenticatorConfig>,
    pub session: Option<SessionSettings>,
    pub user_provider: Arc<dyn UserProvider>,
}

/// A compiled, validated firewall.
pub struct Firewall {
    name: String,
    pattern: Regex,
    authenticators: Vec<Authenticator>,
    session: Option<SessionSettings>,
    user_provider: Arc<dyn UserProvider>,
}

impl Firewall {
    pub fn build(config: FirewallConfig) -> Result<Self, ConfigError> {
        let pattern = compile_anchored(&config.pattern)?;

        let mut authenticators = Vec::with_capacity(config.authenticators.len());
        for authenticator in config.authenticators {
            let authenticator = match authenticator {
                AuthenticatorConfig::Bearer(settings) => Authenticator::Bearer(
                    BearerTokenAuthenticator::new(Arc::new(TokenVerifier::new(settings)?)),
                ),
                AuthenticatorConfig::FormLogin(settings) => {
                    Authenticator::FormLogin(FormLoginAuthenticator::new(settings))
                }
                AuthenticatorConfig::OAuth(settings) => {
                    Authenticator::OAuth(OAuthAuthenticator::new(settings)?)
                }
            };
            authenticators.push(authenticator);
        }

        // Exhaustive pairwise overlap check: at most one authenticator
        // may ever claim a given request within this firewall.
        for (i, a) in authenticators.iter().enumerate() {
            for b in &authenticators[i + 1..] {
                let (a, b) = (a.strategy(), b.strategy());
                if a.claim_shape().overlaps(&b.claim_shape()) {
                    return Err(ConfigError::OverlappingAuthenticators {
                        firewall: config.name,
                        first: a.name().to_string(),
                        second: b.name().to_string(),
                    });
                }
            }
        }

        // Browser strategies persist login and flow state in the
        // session; a firewall binding them without session settings
        // cannot work.
        let needs_session = authenticators
            .iter()
            .any(|a| matches!(a, Authenticator::FormLogin(_) | Authenticator::OAuth(_)));
        if needs_session && config.session.is_none() {
            return Err(ConfigError::InvalidFirewall {
                firewall: config.name,
                message: "form_login/oauth authenticators require session settings".to_string(),
            });
        }

        Ok(Self {
            name: config.name,
            pattern,
            authenticators,
            session: config.session,
            user_provider: config.user_provider,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// First authenticator claiming the request, in declared order.
    pub fn active_authenticator(&self, request: &RequestView) -> Option<&Authenticator> {
        self.authenticators
            .iter()
            .find(|a| a.strategy().supports(request))
    }

    /// The authenticator that begins authentication for anonymous
    /// requests denied by access control: the first in the chain.
    pub fn entry_point(&self) -> Option<&Authenticator> {
        self.authenticators.first()
    }

    pub fn session_settings(&self) -> Option<&SessionSettings> {
        self.session.as_ref()
    }

    pub fn user_provider(&self) -> &Arc<dyn UserProvider> {
        &self.user_provider
    }

    /// Settings of the bound form-login authenticator, if any (logout
    /// handling and body buffering need them).
    pub fn form_settings(&self) -> Option<&FormLoginSettings> {
        self.authenticators.iter().find_map(|a| match a {
            Authenticator::FormLogin(form) => Some(form.settings()),
            _ => None,
        })
    }

    /// Whether the dispatcher must buffer this request's body so the
    /// form authenticator can read credential fields.
    pub fn wants_form_body(&self, parts: &Parts) -> bool {
        let Some(form) = self.form_settings() else {
            return false;
        };
        parts.method == Method::POST
            && parts.uri.path() == form.login_path
            && parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
    }
}

/// Ordered firewall list; the first definition whose pattern matches a
/// request path is selected. A request matching no definition falls
/// through to the implicit anonymous catch-all in the pipeline.
pub struct FirewallDispatcher {
    firewalls: Vec<Firewall>,
}

impl FirewallDispatcher {
    pub fn build(configs: Vec<FirewallConfig>) -> Result<Self, ConfigError> {
        let firewalls = configs
            .into_iter()
            .map(Firewall::build)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { firewalls })
    }

    pub fn select(&self, path: &str) -> Option<&Firewall> {
        self.firewalls.iter().find(|f| f.matches(path))
    }
}
