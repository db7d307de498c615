//! Migrator Module
//!
//! One-way conversion of a namespace from the expiry-index model to the store's
//! native per-field expiration. Each batch is one atomic step that consumes index
//! entries, so a failed run leaves only unconverted entries behind and can be retried.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::cache::DEFAULT_MIGRATION_BATCH_SIZE;
use crate::error::{CacheError, Result};
use crate::namespace::Namespace;
use crate::store::{native_unsupported, Store};

/// Converts one namespace's expiry index into native field TTLs.
pub struct Migrator<S: ?Sized> {
    store: Arc<S>,
    namespace: Namespace,
    batch_size: usize,
}

impl<S: Store + ?Sized> Migrator<S> {
    pub fn new(store: Arc<S>, namespace: Namespace) -> Self {
        Self {
            store,
            namespace,
            batch_size: DEFAULT_MIGRATION_BATCH_SIZE,
        }
    }

    /// Sets how many index entries each round trip converts.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    // == Run ==
    /// Migrates the namespace if it still has an expiry index.
    ///
    /// Fields whose deadline already passed are deleted; every other field gets a
    /// native expiration at the same absolute deadline. Once the index is exhausted it
    /// is deleted and the hash's backstop TTL is removed.
    ///
    /// Returns `false` without touching anything when there is no index to convert,
    /// whatever the store supports. Only an existing index needs native support and a
    /// positive batch size.
    pub async fn run(&self) -> Result<bool> {
        if !self.store.has_expiry_index(&self.namespace).await? {
            debug!(namespace = %self.namespace, "no expiry index, nothing to migrate");
            return Ok(false);
        }

        if !self.store.supports_native_field_ttl() {
            return Err(native_unsupported());
        }
        if self.batch_size == 0 {
            return Err(CacheError::InvalidRequest(
                "Migration batch size must be positive".to_string(),
            ));
        }

        let (mut converted, mut purged, mut batches) = (0usize, 0usize, 0usize);
        loop {
            let batch = match self.store.migrate_batch(&self.namespace, self.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(
                        namespace = %self.namespace,
                        converted,
                        purged,
                        "migration batch failed: {}",
                        e
                    );
                    return Err(e);
                }
            };

            batches += 1;
            converted += batch.converted;
            purged += batch.purged;
            debug!(
                namespace = %self.namespace,
                batch = batches,
                converted = batch.converted,
                purged = batch.purged,
                remaining = batch.remaining,
                "migrated expiry index batch"
            );

            if batch.remaining == 0 {
                break;
            }
        }

        info!(
            namespace = %self.namespace,
            converted,
            purged,
            batches,
            "migrated namespace to native field expiration"
        );
        Ok(true)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRepository;
    use crate::store::{ManualClock, MemoryStore, TtlStatus};
    use std::time::Duration;

    fn native_store() -> (Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()).with_native_field_ttl(true));
        (clock, store)
    }

    #[tokio::test]
    async fn test_run_without_index_returns_false() {
        let (_clock, store) = native_store();
        let ns = Namespace::new("fresh").unwrap();
        store.write_untracked(&ns, "plain", "p").await.unwrap();

        let migrator = Migrator::new(store.clone(), ns.clone());
        assert!(!migrator.run().await.unwrap());
        assert_eq!(store.stored_field_count(&ns).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let (_clock, store) = native_store();
        let ns = Namespace::new("twice").unwrap();
        let repo = CacheRepository::new(store.clone(), ns.clone());
        repo.set("k", "v", 60).await.unwrap();

        let migrator = Migrator::new(store.clone(), ns.clone());
        assert!(migrator.run().await.unwrap());
        assert!(!migrator.run().await.unwrap());
        assert_eq!(
            store.native_ttl(&ns, "k").await.unwrap(),
            TtlStatus::ExpiresIn(Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_run_deletes_already_expired_fields() {
        let (clock, store) = native_store();
        let ns = Namespace::new("mixed").unwrap();
        let repo = CacheRepository::new(store.clone(), ns.clone());
        repo.set_many(&[("stale", "s", 1), ("fresh", "f", 60)])
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));

        assert!(Migrator::new(store.clone(), ns.clone()).run().await.unwrap());

        assert_eq!(store.native_ttl(&ns, "stale").await.unwrap(), TtlStatus::Missing);
        assert_eq!(
            store.native_ttl(&ns, "fresh").await.unwrap(),
            TtlStatus::ExpiresIn(Duration::from_secs(58))
        );
    }

    #[tokio::test]
    async fn test_unwritten_namespace_needs_no_native_store() {
        let store = Arc::new(MemoryStore::new());
        let migrator = Migrator::new(store, Namespace::new("unwritten").unwrap());

        assert!(!migrator.run().await.unwrap());
    }

    #[tokio::test]
    async fn test_run_requires_native_store() {
        let store = Arc::new(MemoryStore::new());
        let ns = Namespace::new("plain").unwrap();
        CacheRepository::new(store.clone(), ns.clone())
            .set("k", "v", 60)
            .await
            .unwrap();

        assert!(matches!(
            Migrator::new(store.clone(), ns.clone()).run().await,
            Err(CacheError::Unsupported(_))
        ));
        assert!(store.has_expiry_index(&ns).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let (_clock, store) = native_store();
        let ns = Namespace::new("zero").unwrap();
        CacheRepository::new(store.clone(), ns.clone())
            .set("k", "v", 60)
            .await
            .unwrap();
        let migrator = Migrator::new(store.clone(), ns.clone()).with_batch_size(0);

        assert!(matches!(
            migrator.run().await,
            Err(CacheError::InvalidRequest(_))
        ));

        // A namespace with nothing to convert never looks at the batch size
        let empty = Migrator::new(store, Namespace::new("empty").unwrap()).with_batch_size(0);
        assert!(!empty.run().await.unwrap());
    }

    #[tokio::test]
    async fn test_run_in_small_batches() {
        let (_clock, store) = native_store();
        let ns = Namespace::new("batched").unwrap();
        let repo = CacheRepository::new(store.clone(), ns.clone());
        let entries: Vec<(String, String, i64)> = (0..10)
            .map(|i| (format!("k{}", i), format!("v{}", i), 30 + i))
            .collect();
        repo.set_many(&entries).await.unwrap();

        let migrator = Migrator::new(store.clone(), ns.clone()).with_batch_size(3);
        assert_eq!(migrator.batch_size(), 3);
        assert!(migrator.run().await.unwrap());

        assert!(!store.has_expiry_index(&ns).await.unwrap());
        assert_eq!(store.stored_field_count(&ns).await.unwrap(), 10);
        assert_eq!(
            store.native_ttl(&ns, "k9").await.unwrap(),
            TtlStatus::ExpiresIn(Duration::from_secs(39))
        );
    }
}
