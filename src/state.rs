// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::session::SessionStore;

/// Shared application state for handlers that sit next to the security
/// pipeline (login page flash messages, CSRF token issuance).
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    /// Cookie name the session firewall uses.
    pub session_cookie: String,
}

impl AppState {
    pub fn new(sessions: Arc<dyn SessionStore>, session_cookie: impl Into<String>) -> Self {
        Self {
            sessions,
            session_cookie: session_cookie.into(),
        }
    }
}
