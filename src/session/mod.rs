// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Store
//!
//! Key-value session state behind an explicit trait, rather than ambient
//! global session access, so single-use invariants (OAuth state, CSRF
//! token) stay testable in isolation.
//!
//! The one operation with teeth is [`SessionStore::take`]: an atomic
//! get-and-invalidate. Two concurrent takes of the same key must resolve
//! with exactly one winner — the in-memory implementation serializes
//! them behind a single write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Per-session key-value storage used by the form-login and OAuth
/// strategies.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate a fresh session and return its id.
    async fn create(&self) -> String;

    async fn get(&self, session_id: &str, key: &str) -> Option<String>;

    async fn set(&self, session_id: &str, key: &str, value: String);

    /// Atomic get-and-invalidate of one key. The returned value is gone
    /// from the store before this resolves; a concurrent take of the
    /// same key observes `None`.
    async fn take(&self, session_id: &str, key: &str) -> Option<String>;

    /// Remove one key without reading it.
    async fn remove(&self, session_id: &str, key: &str);

    /// Destroy the whole session (logout).
    async fn invalidate(&self, session_id: &str);
}

/// One request's handle onto its session: the store, the session id
/// from (or destined for) the cookie, and whether the id is fresh and
/// still needs a `Set-Cookie` on the way out.
#[derive(Clone)]
pub struct SessionHandle {
    store: std::sync::Arc<dyn SessionStore>,
    id: String,
    fresh: bool,
    cookie_name: String,
    ttl_seconds: i64,
}

impl SessionHandle {
    pub fn new(
        store: std::sync::Arc<dyn SessionStore>,
        cookie_name: String,
        ttl_seconds: i64,
        id: String,
        fresh: bool,
    ) -> Self {
        Self {
            store,
            id,
            fresh,
            cookie_name,
            ttl_seconds,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.store.get(&self.id, key).await
    }

    pub async fn set(&self, key: &str, value: String) {
        self.store.set(&self.id, key, value).await;
    }

    pub async fn take(&self, key: &str) -> Option<String> {
        self.store.take(&self.id, key).await
    }

    pub async fn remove(&self, key: &str) {
        self.store.remove(&self.id, key).await;
    }

    pub async fn invalidate(&self) {
        self.store.invalidate(&self.id).await;
    }

    /// `Set-Cookie` value establishing this session on the client.
    pub fn set_cookie_value(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name, self.id, self.ttl_seconds
        )
    }

    /// `Set-Cookie` value clearing the session cookie (logout).
    pub fn clear_cookie_value(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie_name
        )
    }
}

/// In-memory session store.
///
/// Suitable for single-process deployments and tests; multi-instance
/// deployments swap in a shared backend behind the same trait.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), HashMap::new());
        id
    }

    async fn get(&self, session_id: &str, key: &str) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .and_then(|data| data.get(key).cloned())
    }

    async fn set(&self, session_id: &str, key: &str, value: String) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    async fn take(&self, session_id: &str, key: &str) -> Option<String> {
        // Single write guard covers lookup and removal, which is what
        // makes the consume atomic under concurrent duplicate callbacks.
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(session_id)?.remove(key)
    }

    async fn remove(&self, session_id: &str, key: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(data) = sessions.get_mut(session_id) {
            data.remove(key);
        }
    }

    async fn invalidate(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}
