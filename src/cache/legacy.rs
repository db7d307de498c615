//! Legacy Adapter Module
//!
//! The pre-index API surface, kept for callers written against whole-key TTLs.
//! Operates on the same hash as the repository and defers to it for reads and
//! writes, so both views agree on which fields are expired.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::{CacheRepository, ExpiryModel, FieldCache};
use crate::error::Result;
use crate::namespace::Namespace;
use crate::store::Store;

/// Deprecated view of a namespace. No new functionality belongs here.
pub struct LegacyAdapter<S: ?Sized> {
    repository: CacheRepository<S>,
}

impl<S: ?Sized> Clone for LegacyAdapter<S> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<S: Store + ?Sized> LegacyAdapter<S> {
    pub fn new(repository: CacheRepository<S>) -> Self {
        Self { repository }
    }

    /// Convenience constructor for the emulated model.
    pub fn for_namespace(store: Arc<S>, namespace: Namespace) -> Self {
        Self::new(CacheRepository::new(store, namespace))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.repository.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str, ttl: i64) -> Result<()> {
        self.repository.set(key, value, ttl).await
    }

    /// Removes the field from storage at once, rather than marking it expired.
    pub async fn delete(&self, key: &str) -> Result<()> {
        match self.repository.model() {
            ExpiryModel::Emulated => {
                let removed = self
                    .repository
                    .store()
                    .remove_tracked(self.repository.namespace(), &[key.to_string()])
                    .await?;
                debug!(namespace = %self.repository.namespace(), key, removed, "legacy delete");
                Ok(())
            }
            // Native deletes are already physical
            ExpiryModel::Native => self.repository.delete(key).await,
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remaining TTL of the whole namespace, as the older API reported it.
    /// The key is accepted for signature compatibility only.
    pub async fn ttl(&self, _key: &str) -> Result<Option<Duration>> {
        Ok(self.repository.namespace_ttl().await?.remaining())
    }
}

#[async_trait]
impl<S: Store + ?Sized> FieldCache for LegacyAdapter<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        LegacyAdapter::get(self, key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: i64) -> Result<()> {
        LegacyAdapter::set(self, key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        LegacyAdapter::delete(self, key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        LegacyAdapter::ttl(self, key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        LegacyAdapter::exists(self, key).await
    }
}
