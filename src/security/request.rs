// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only view of an incoming request.
//!
//! Authenticators work against this view instead of the raw request, so
//! `supports()` stays fast and side-effect-free by construction: there
//! is nothing here to mutate.

use std::collections::HashMap;

use axum::http::{header, request::Parts, HeaderMap, Method};

/// Immutable snapshot of the request facts the pipeline cares about:
/// method, path, query, headers and — when the dispatcher buffered one —
/// the url-encoded form body.
#[derive(Debug)]
pub struct RequestView {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
    form: Option<HashMap<String, String>>,
}

impl RequestView {
    /// Build from request parts plus an optional pre-buffered form body.
    pub fn from_parts(parts: &Parts, form_body: Option<&[u8]>) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        let form = form_body.map(|body| {
            url::form_urlencoded::parse(body)
                .into_owned()
                .collect()
        });

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query,
            headers: parts.headers.clone(),
            form,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form.as_ref().and_then(|f| f.get(name)).map(String::as_str)
    }

    /// Whether this request is a form POST to `path`.
    pub fn is_form_post(&self, path: &str) -> bool {
        self.method == Method::POST
            && self.path == path
            && self
                .header(header::CONTENT_TYPE)
                .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
    }

    /// First value of the named cookie, across all `Cookie` headers.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }
}
