//! Cache Repository Module
//!
//! Per-field TTL engine for one namespace. Every operation is a single atomic round
//! trip against the store; the repository itself only validates input, picks the
//! operation that matches its expiry model, and logs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::cache::{ExpiryModel, FieldCache};
use crate::error::{CacheError, Result};
use crate::namespace::Namespace;
use crate::store::{FieldWrite, Store, TtlStatus};

// == Cache Repository ==
/// Atomic per-field TTL operations over one namespace.
pub struct CacheRepository<S: ?Sized> {
    /// Shared store handle
    store: Arc<S>,
    /// Hash and expiry index this repository works on
    namespace: Namespace,
    /// How field expiration is provided
    model: ExpiryModel,
}

impl<S: ?Sized> Clone for CacheRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace.clone(),
            model: self.model,
        }
    }
}

impl<S: Store + ?Sized> CacheRepository<S> {
    // == Constructor ==
    /// Creates a repository using the emulated (expiry index) model.
    pub fn new(store: Arc<S>, namespace: Namespace) -> Self {
        Self {
            store,
            namespace,
            model: ExpiryModel::Emulated,
        }
    }

    /// Selects the expiry model. `Native` requires a store with native field TTLs.
    pub fn with_model(mut self, model: ExpiryModel) -> Self {
        self.model = model;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn model(&self) -> ExpiryModel {
        self.model
    }

    pub(crate) fn store(&self) -> &Arc<S> {
        &self.store
    }

    // == Set ==
    /// Stores a field that expires `ttl` seconds from now, by the store's clock.
    ///
    /// A non-positive `ttl` stores the field as already expired.
    pub async fn set(&self, key: &str, value: &str, ttl: i64) -> Result<()> {
        validate_key(key)?;
        self.write(&[FieldWrite::new(key, value, ttl)]).await
    }

    // == Set Many ==
    /// Stores several `(key, value, ttl)` fields in one atomic round trip.
    ///
    /// The backstop TTL is recomputed once, after all fields are written.
    pub async fn set_many<K, V>(&self, entries: &[(K, V, i64)]) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if entries.is_empty() {
            return Err(CacheError::InvalidRequest(
                "set_many requires at least one entry".to_string(),
            ));
        }

        let writes = entries
            .iter()
            .map(|(key, value, ttl)| {
                validate_key(key.as_ref())?;
                Ok(FieldWrite::new(key.as_ref(), value.as_ref(), *ttl))
            })
            .collect::<Result<Vec<_>>>()?;

        self.write(&writes).await
    }

    // == Get ==
    /// Returns the live value of a field.
    ///
    /// Untracked fields are permanent; tracked fields past their deadline read as absent
    /// even while still physically stored.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut values = self.read(&[key.to_string()]).await?;
        Ok(values.pop().flatten())
    }

    // == Get Many ==
    /// Returns one entry per requested key, in request order, `None` where absent.
    pub async fn get_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Err(CacheError::InvalidRequest(
                "get_many requires at least one key".to_string(),
            ));
        }

        let keys: Vec<String> = keys.iter().map(|key| key.as_ref().to_string()).collect();
        let values = self.read(&keys).await?;
        if values.len() != keys.len() {
            return Err(CacheError::Script(format!(
                "store returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    // == Get All ==
    /// Returns every live field.
    pub async fn get_all(&self) -> Result<HashMap<String, String>> {
        let fields = match self.model {
            ExpiryModel::Emulated => self.store.read_all_tracked(&self.namespace).await?,
            ExpiryModel::Native => self.store.read_all_native(&self.namespace).await?,
        };
        Ok(fields.into_iter().collect())
    }

    // == Delete ==
    /// Marks a field as expired. Storage is reclaimed by a later vacuum.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.set(key, "", 0).await
    }

    // == Vacuum ==
    /// Physically removes up to `delete_count` expired fields.
    ///
    /// Returns the number removed. Cheap when nothing is due.
    pub async fn vacuum(&self, delete_count: usize) -> Result<usize> {
        if self.model == ExpiryModel::Native {
            debug!(namespace = %self.namespace, "native expiry model, nothing to vacuum");
            return Ok(0);
        }
        if delete_count == 0 {
            return Ok(0);
        }

        let removed = self.store.vacuum(&self.namespace, delete_count).await?;
        if removed > 0 {
            info!(namespace = %self.namespace, removed, "vacuumed expired fields");
        } else {
            debug!(namespace = %self.namespace, "vacuum found no expired fields");
        }
        Ok(removed)
    }

    // == Time To Live ==
    /// Remaining lifetime of a field, or `None` if it has no deadline or has expired.
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        match self.model {
            ExpiryModel::Emulated => self.store.tracked_ttl(&self.namespace, key).await,
            ExpiryModel::Native => Ok(self
                .store
                .native_ttl(&self.namespace, key)
                .await?
                .remaining()),
        }
    }

    /// The namespace hash's own whole-key TTL.
    pub async fn namespace_ttl(&self) -> Result<TtlStatus> {
        self.store.namespace_ttl(&self.namespace).await
    }

    async fn write(&self, writes: &[FieldWrite]) -> Result<()> {
        match self.model {
            ExpiryModel::Emulated => self.store.write_tracked(&self.namespace, writes).await,
            ExpiryModel::Native => self.store.write_native(&self.namespace, writes).await,
        }
    }

    async fn read(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        match self.model {
            ExpiryModel::Emulated => self.store.read_tracked(&self.namespace, keys).await,
            ExpiryModel::Native => self.store.read_native(&self.namespace, keys).await,
        }
    }
}

#[async_trait]
impl<S: Store + ?Sized> FieldCache for CacheRepository<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        CacheRepository::get(self, key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: i64) -> Result<()> {
        CacheRepository::set(self, key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        CacheRepository::delete(self, key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        CacheRepository::ttl(self, key).await
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Key cannot be empty".to_string(),
        ));
    }
    Ok(())
}
