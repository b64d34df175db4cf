// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the resolved principal.
//!
//! Use `CurrentUser` in handlers behind an authenticated firewall:
//!
//! ```rust,ignore
//! async fn my_handler(CurrentUser(principal): CurrentUser) -> impl IntoResponse {
//!     // principal is the pipeline's resolved Principal
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::error::AuthError;
use super::principal::Principal;

/// Extractor for the principal the pipeline attached to the request.
///
/// Rejects with 401 when no principal is present — which means the
/// route was reachable anonymously; check the access rules.
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::AuthenticationRequired)
    }
}

/// Optional variant for routes that serve both anonymous and
/// authenticated requests.
pub struct OptionalUser(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(parts.extensions.get::<Principal>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoleSet, UserKey, UserRecord};
    use axum::body::Body;
    use axum::http::Request;

    fn principal() -> Principal {
        Principal::Real(UserRecord {
            key: UserKey::from("u1"),
            identifier: "a@b.com".to_string(),
            password_hash: None,
            roles: RoleSet::new(["ROLE_USER"]).unwrap(),
            display_name: None,
        })
    }

    #[tokio::test]
    async fn current_user_reads_the_pipeline_extension() {
        let mut parts = Request::get("/")
            .body(Body::empty())
            .unwrap()
            .into_parts()
            .0;
        parts.extensions.insert(principal());

        let CurrentUser(user) = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(user.key(), &UserKey::from("u1"));
    }

    #[tokio::test]
    async fn current_user_rejects_anonymous_requests() {
        let mut parts = Request::get("/")
            .body(Body::empty())
            .unwrap()
            .into_parts()
            .0;
        let result = CurrentUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::AuthenticationRequired)));
    }

    #[tokio::test]
    async fn optional_user_is_none_for_anonymous_requests() {
        let mut parts = Request::get("/")
            .body(Body::empty())
            .unwrap()
            .into_parts()
            .0;
        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
