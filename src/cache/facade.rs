//! Facade Module
//!
//! The surface handed to application code. Current operations go to the repository,
//! the older names go to the legacy adapter and log a warning on every call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cache::{CacheRepository, ExpiryModel, LegacyAdapter, Migrator};
use crate::config::CacheSettings;
use crate::error::Result;
use crate::namespace::Namespace;
use crate::store::{native_unsupported, Store};

/// Cache handle for one namespace.
pub struct Cache<S: ?Sized> {
    repository: CacheRepository<S>,
    legacy: LegacyAdapter<S>,
    settings: CacheSettings,
}

impl<S: ?Sized> Clone for Cache<S> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            legacy: self.legacy.clone(),
            settings: self.settings,
        }
    }
}

impl<S: Store + ?Sized> Cache<S> {
    // == Constructor ==
    /// Opens a namespace on the given store.
    ///
    /// Fails with `Unsupported` when the settings ask for native field expiration and
    /// the store cannot provide it.
    pub fn open(store: Arc<S>, namespace: Namespace, settings: CacheSettings) -> Result<Self> {
        if settings.expiry_model == ExpiryModel::Native && !store.supports_native_field_ttl() {
            return Err(native_unsupported());
        }

        let repository =
            CacheRepository::new(store, namespace).with_model(settings.expiry_model);
        let legacy = LegacyAdapter::new(repository.clone());

        Ok(Self {
            repository,
            legacy,
            settings,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        self.repository.namespace()
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn repository(&self) -> &CacheRepository<S> {
        &self.repository
    }

    /// Builds a migrator for this namespace using the configured batch size.
    pub fn migrator(&self) -> Migrator<S> {
        Migrator::new(Arc::clone(self.repository.store()), self.namespace().clone())
            .with_batch_size(self.settings.migration_batch_size)
    }

    // == Current API ==
    pub async fn set(&self, key: &str, value: &str, ttl: i64) -> Result<()> {
        self.repository.set(key, value, ttl).await
    }

    pub async fn set_many<K, V>(&self, entries: &[(K, V, i64)]) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.repository.set_many(entries).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.repository.get(key).await
    }

    pub async fn get_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<Option<String>>> {
        self.repository.get_many(keys).await
    }

    pub async fn get_all(&self) -> Result<HashMap<String, String>> {
        self.repository.get_all().await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.repository.delete(key).await
    }

    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.repository.ttl(key).await
    }

    pub async fn vacuum(&self, delete_count: usize) -> Result<usize> {
        self.repository.vacuum(delete_count).await
    }

    // == Deprecated API ==
    #[deprecated(note = "use `set`")]
    pub async fn put(&self, key: &str, value: &str, ttl: i64) -> Result<()> {
        deprecated_call("put", "set");
        self.legacy.set(key, value, ttl).await
    }

    #[deprecated(note = "use `get`")]
    pub async fn fetch(&self, key: &str) -> Result<Option<String>> {
        deprecated_call("fetch", "get");
        self.legacy.get(key).await
    }

    #[deprecated(note = "use `delete`")]
    pub async fn remove(&self, key: &str) -> Result<()> {
        deprecated_call("remove", "delete");
        self.legacy.delete(key).await
    }

    #[deprecated(note = "use `get`")]
    pub async fn contains(&self, key: &str) -> Result<bool> {
        deprecated_call("contains", "get");
        self.legacy.exists(key).await
    }

    #[deprecated(note = "use `ttl`, which reports per-field lifetimes")]
    pub async fn expires_in(&self, key: &str) -> Result<Option<Duration>> {
        deprecated_call("expires_in", "ttl");
        self.legacy.ttl(key).await
    }
}

fn deprecated_call(old: &str, new: &str) {
    warn!(
        method = old,
        replacement = new,
        "deprecated cache method called, switch to `{}`",
        new
    );
}

// == Unit Tests ==
#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::store::{ManualClock, MemoryStore, TtlStatus};

    fn open(clock: Arc<ManualClock>) -> (Arc<MemoryStore>, Cache<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_clock(clock));
        let cache = Cache::open(
            store.clone(),
            Namespace::new("facade").unwrap(),
            CacheSettings::default(),
        )
        .unwrap();
        (store, cache)
    }

    #[tokio::test]
    async fn test_current_api_delegates() {
        let clock = Arc::new(ManualClock::default());
        let (_store, cache) = open(clock.clone());

        cache.set("k", "v", 60).await.unwrap();
        cache.set_many(&[("a", "1", 10), ("b", "2", 1)]).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.ttl("a").await.unwrap(), Some(Duration::from_secs(10)));

        clock.advance(Duration::from_secs(1));
        assert_eq!(
            cache.get_many(&["b", "a"]).await.unwrap(),
            vec![None, Some("1".to_string())]
        );
        assert_eq!(cache.get_all().await.unwrap().len(), 2);

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.vacuum(10).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_deprecated_api_uses_legacy_semantics() {
        let clock = Arc::new(ManualClock::default());
        let (store, cache) = open(clock);

        cache.put("a", "1", 10).await.unwrap();
        cache.set("b", "2", 40).await.unwrap();
        assert_eq!(cache.fetch("a").await.unwrap(), Some("1".to_string()));
        assert!(cache.contains("a").await.unwrap());

        // Whole-namespace TTL, not the field's own
        assert_eq!(
            cache.expires_in("a").await.unwrap(),
            Some(Duration::from_secs(40))
        );

        cache.remove("a").await.unwrap();
        assert!(!cache.contains("a").await.unwrap());
        assert_eq!(store.stored_field_count(cache.namespace()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_native_requires_capability() {
        let store = Arc::new(MemoryStore::new());
        let settings = CacheSettings {
            expiry_model: ExpiryModel::Native,
            ..CacheSettings::default()
        };

        let result = Cache::open(store, Namespace::new("native").unwrap(), settings);
        assert!(matches!(result, Err(CacheError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_migrator_uses_configured_batch_size() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock).with_native_field_ttl(true));
        let settings = CacheSettings {
            migration_batch_size: 7,
            ..CacheSettings::default()
        };
        let cache = Cache::open(store.clone(), Namespace::new("m").unwrap(), settings).unwrap();

        cache.set("k", "v", 60).await.unwrap();
        let migrator = cache.migrator();
        assert_eq!(migrator.batch_size(), 7);
        assert!(migrator.run().await.unwrap());
        assert_eq!(
            cache.repository().namespace_ttl().await.unwrap(),
            TtlStatus::Persistent
        );
    }
}
