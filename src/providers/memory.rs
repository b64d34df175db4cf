// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory user provider.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ProviderError, UserProvider};
use crate::models::{RoleSet, UserKey, UserRecord};
use crate::security::badge::ProviderProfile;

#[derive(Default)]
struct Inner {
    users: HashMap<UserKey, UserRecord>,
    /// `(provider, provider_id)` → account key links.
    links: HashMap<(String, String), UserKey>,
}

/// Reference [`UserProvider`] backed by process memory.
///
/// Used by the demo binary and tests; production deployments implement
/// the trait over their own datastore.
pub struct InMemoryUserProvider {
    inner: RwLock<Inner>,
    /// Roles granted to accounts provisioned from an OAuth identity;
    /// `None` disables auto-provisioning.
    provision_roles: Option<RoleSet>,
}

impl InMemoryUserProvider {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            provision_roles: None,
        }
    }

    /// Enable auto-provisioning of unknown OAuth identities with the
    /// given roles.
    pub fn with_provisioning(mut self, roles: RoleSet) -> Self {
        self.provision_roles = Some(roles);
        self
    }

    /// Seed an account.
    pub async fn insert_user(&self, user: UserRecord) {
        self.inner.write().await.users.insert(user.key.clone(), user);
    }

    /// Seed a provider-identity link to an existing account.
    pub async fn insert_link(&self, provider: &str, provider_id: &str, key: UserKey) {
        self.inner
            .write()
            .await
            .links
            .insert((provider.to_string(), provider_id.to_string()), key);
    }
}

impl Default for InMemoryUserProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserProvider for InMemoryUserProvider {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserRecord>, ProviderError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.identifier == identifier)
            .cloned())
    }

    async fn find_by_key(&self, key: &UserKey) -> Result<Option<UserRecord>, ProviderError> {
        Ok(self.inner.read().await.users.get(key).cloned())
    }

    async fn resolve_provider_identity(
        &self,
        provider: &str,
        provider_id: &str,
        profile: &ProviderProfile,
    ) -> Result<Option<UserRecord>, ProviderError> {
        let link_key = (provider.to_string(), provider_id.to_string());

        {
            let inner = self.inner.read().await;
            if let Some(key) = inner.links.get(&link_key) {
                return Ok(inner.users.get(key).cloned());
            }
        }

        let Some(roles) = &self.provision_roles else {
            return Ok(None);
        };

        // Provision a fresh account for this identity and link it.
        let mut inner = self.inner.write().await;
        // A concurrent callback may have provisioned between the locks.
        if let Some(key) = inner.links.get(&link_key) {
            return Ok(inner.users.get(key).cloned());
        }

        let key = UserKey(Uuid::new_v4().to_string());
        let user = UserRecord {
            key: key.clone(),
            identifier: profile
                .email
                .clone()
                .unwrap_or_else(|| format!("{provider}:{provider_id}")),
            password_hash: None,
            roles: roles.clone(),
            display_name: profile.display_name.clone(),
        };
        inner.users.insert(key.clone(), user.clone());
        inner.links.insert(link_key, key);
        Ok(Some(user))
    }
}
