// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Strategies
//!
//! One authenticator per strategy behind a single contract:
//!
//! - [`AuthenticationStrategy::supports`] — fast, side-effect-free
//!   claim check used by the firewall to pick the active strategy
//! - [`AuthenticationStrategy::authenticate`] — turn the request into a
//!   [`Passport`], or `None` for "not applicable" (distinct from
//!   "applicable but invalid", which is a typed failure)
//! - [`AuthenticationStrategy::on_success`] / `on_failure` — the
//!   strategy's transport-level verdict (continue, redirect, JSON error)
//! - [`AuthenticationStrategy::challenge`] — begin authentication for
//!   an anonymous request that access control turned away
//!
//! The set of strategies is a closed union ([`Authenticator`]) built at
//! startup; no runtime reflection, no open registration.

pub mod bearer;
pub mod form;
pub mod oauth;

use async_trait::async_trait;
use axum::response::Response;

use super::error::AuthError;
use super::passport::Passport;
use super::principal::Principal;
use super::request::RequestView;
use crate::session::SessionHandle;

pub use bearer::BearerTokenAuthenticator;
pub use form::{FormLoginAuthenticator, FormLoginSettings};
pub use oauth::{OAuthAuthenticator, OAuthLoginSettings};

/// What a successful authentication means for the transport.
pub enum SuccessAction {
    /// Let the request continue to the application handler (stateless
    /// strategies).
    Continue,
    /// Short-circuit with this response (login redirects).
    Respond(Response),
}

/// Static description of the requests a strategy claims. The config
/// validator runs an exhaustive pairwise overlap check over these at
/// startup; two strategies that could claim the same request in one
/// firewall are a fatal misconfiguration, not a request-time tiebreak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimShape {
    /// Any request carrying an `Authorization: Bearer` header,
    /// regardless of path — which is why a bearer authenticator can
    /// never share a firewall with another strategy.
    BearerHeader,
    /// A form POST to this path.
    FormPost { path: String },
    /// A GET to this path carrying a `code` query parameter.
    CallbackCode { path: String },
}

impl ClaimShape {
    /// Could both shapes claim one request?
    pub fn overlaps(&self, other: &ClaimShape) -> bool {
        use ClaimShape::*;
        match (self, other) {
            (BearerHeader, _) | (_, BearerHeader) => true,
            (FormPost { path: a }, FormPost { path: b }) => a == b,
            (CallbackCode { path: a }, CallbackCode { path: b }) => a == b,
            // Form posts and code callbacks differ in method, so they
            // are disjoint even on a shared path.
            (FormPost { .. }, CallbackCode { .. }) | (CallbackCode { .. }, FormPost { .. }) => {
                false
            }
        }
    }
}

/// The uniform per-strategy contract.
#[async_trait]
pub trait AuthenticationStrategy: Send + Sync {
    /// Strategy name for logs and config errors.
    fn name(&self) -> &'static str;

    /// Shape used by the startup overlap check.
    fn claim_shape(&self) -> ClaimShape;

    /// Fast, side-effect-free check whether this strategy claims the
    /// request.
    fn supports(&self, request: &RequestView) -> bool;

    /// Build a passport from request data. `Ok(None)` means "not
    /// applicable after all"; failures are typed. The only permitted
    /// side effects touch single-use flow state (the OAuth state is
    /// invalidated on first use here, success or not, and its stashed
    /// redirect target carried forward) — no session principal writes,
    /// no token issuance.
    async fn authenticate(
        &self,
        request: &RequestView,
        session: Option<&SessionHandle>,
    ) -> Result<Option<Passport>, AuthError>;

    /// Transport action after the passport resolved.
    async fn on_success(
        &self,
        principal: &Principal,
        request: &RequestView,
        session: Option<&SessionHandle>,
    ) -> SuccessAction;

    /// Transport action for a failed attempt. Only the coarse reason
    /// code may be derived from `reason`.
    async fn on_failure(
        &self,
        request: &RequestView,
        reason: AuthError,
        session: Option<&SessionHandle>,
    ) -> Response;

    /// Begin authentication for an anonymous request that access
    /// control denied (redirect to login, redirect to provider, 401).
    async fn challenge(
        &self,
        request: &RequestView,
        session: Option<&SessionHandle>,
    ) -> Response;
}

/// Closed union of the configured strategies.
pub enum Authenticator {
    Bearer(BearerTokenAuthenticator),
    FormLogin(FormLoginAuthenticator),
    OAuth(OAuthAuthenticator),
}

impl Authenticator {
    /// The shared contract seam.
    pub fn strategy(&self) -> &dyn AuthenticationStrategy {
        match self {
            Authenticator::Bearer(a) => a,
            Authenticator::FormLogin(a) => a,
            Authenticator::OAuth(a) => a,
        }
    }
}
