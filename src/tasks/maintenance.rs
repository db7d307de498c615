//! Invocation Maintenance
//!
//! The step run once before a cache handle is given to application code: migrate the
//! namespace when native expiration is configured, then reclaim a bounded number of
//! expired fields.

use tracing::debug;

use crate::cache::{Cache, ExpiryModel};
use crate::config::CacheSettings;
use crate::error::Result;
use crate::store::Store;

/// What the maintenance step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Whether an expiry index was converted to native field TTLs
    pub migrated: bool,
    /// Expired fields physically removed
    pub vacuumed: usize,
}

/// Runs the migrator (native model only) and then one vacuum pass.
///
/// Errors propagate; whether a failed step should block the invocation is up to the
/// caller.
pub async fn prepare_invocation<S>(
    cache: &Cache<S>,
    settings: &CacheSettings,
) -> Result<MaintenanceReport>
where
    S: Store + ?Sized,
{
    let migrated = match settings.expiry_model {
        ExpiryModel::Native => {
            cache
                .migrator()
                .with_batch_size(settings.migration_batch_size)
                .run()
                .await?
        }
        ExpiryModel::Emulated => false,
    };

    let vacuumed = cache.vacuum(settings.vacuum_delete_count).await?;

    let report = MaintenanceReport { migrated, vacuumed };
    debug!(namespace = %cache.namespace(), ?report, "invocation maintenance complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::error::CacheError;
    use crate::namespace::Namespace;
    use crate::store::{ManualClock, MemoryStore, TtlStatus};

    #[tokio::test]
    async fn test_emulated_model_only_vacuums() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let settings = CacheSettings {
            vacuum_delete_count: 2,
            ..CacheSettings::default()
        };
        let cache =
            Cache::open(store.clone(), Namespace::new("emulated").unwrap(), settings).unwrap();

        cache
            .set_many(&[("a", "1", 1), ("b", "2", 1), ("c", "3", 1), ("d", "4", 60)])
            .await
            .unwrap();
        clock.advance(Duration::from_secs(1));

        let report = prepare_invocation(&cache, &settings).await.unwrap();
        assert_eq!(
            report,
            MaintenanceReport {
                migrated: false,
                vacuumed: 2
            }
        );
        assert!(store.has_expiry_index(cache.namespace()).await.unwrap());
    }

    #[tokio::test]
    async fn test_native_model_migrates_first() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock).with_native_field_ttl(true));
        let ns = Namespace::new("upgrade").unwrap();

        // Written by an older deployment still on the emulated model
        let old = Cache::open(store.clone(), ns.clone(), CacheSettings::default()).unwrap();
        old.set("k", "v", 30).await.unwrap();

        let settings = CacheSettings {
            expiry_model: ExpiryModel::Native,
            ..CacheSettings::default()
        };
        let cache = Cache::open(store.clone(), ns.clone(), settings).unwrap();

        let report = prepare_invocation(&cache, &settings).await.unwrap();
        assert_eq!(
            report,
            MaintenanceReport {
                migrated: true,
                vacuumed: 0
            }
        );
        assert_eq!(cache.ttl("k").await.unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(store.namespace_ttl(&ns).await.unwrap(), TtlStatus::Persistent);

        // Nothing left to convert the second time
        assert!(!prepare_invocation(&cache, &settings).await.unwrap().migrated);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let store = Arc::new(MemoryStore::new());
        let broken_ns = Namespace::new("broken").unwrap();
        store
            .write_untracked(&Namespace::new(broken_ns.index_key()).unwrap(), "k", "v")
            .await
            .unwrap();
        let settings = CacheSettings::default();
        let cache = Cache::open(store, broken_ns, settings).unwrap();

        assert!(matches!(
            prepare_invocation(&cache, &settings).await,
            Err(CacheError::Script(_))
        ));
    }
}
