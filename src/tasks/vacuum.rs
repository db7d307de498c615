//! Vacuum Task
//!
//! Background task that periodically reclaims expired fields of one namespace.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::store::Store;

/// Spawns a background task that vacuums a namespace on an interval.
///
/// Each pass removes at most `delete_count` expired fields. A failed pass is logged
/// and the task keeps running; the next pass retries with fresh store state.
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Cache::open(store, Namespace::new("app")?, CacheSettings::default())?;
/// let vacuum_handle = spawn_vacuum_task(cache, Duration::from_secs(1), 100);
/// // Later, during shutdown:
/// vacuum_handle.abort();
/// ```
pub fn spawn_vacuum_task<S>(
    cache: Cache<S>,
    interval: Duration,
    delete_count: usize,
) -> JoinHandle<()>
where
    S: Store + ?Sized + 'static,
{
    tokio::spawn(async move {
        info!(
            namespace = %cache.namespace(),
            "Starting vacuum task with interval of {:?}",
            interval
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.vacuum(delete_count).await {
                Ok(removed) if removed > 0 => {
                    debug!(namespace = %cache.namespace(), removed, "vacuum pass complete");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(namespace = %cache.namespace(), "vacuum pass failed: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::CacheSettings;
    use crate::namespace::Namespace;
    use crate::store::{ManualClock, MemoryStore};

    fn open() -> (Arc<ManualClock>, Arc<MemoryStore>, Cache<MemoryStore>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let cache = Cache::open(
            store.clone(),
            Namespace::new("vacuum-task").unwrap(),
            CacheSettings::default(),
        )
        .unwrap();
        (clock, store, cache)
    }

    #[tokio::test]
    async fn test_vacuum_task_removes_expired_fields() {
        let (clock, store, cache) = open();
        cache
            .set_many(&[("expire_soon", "v", 1), ("long_lived", "v", 3600)])
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));

        let handle = spawn_vacuum_task(cache.clone(), Duration::from_millis(20), 10);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.stored_field_count(cache.namespace()).await.unwrap(), 1);
        assert_eq!(cache.get("long_lived").await.unwrap(), Some("v".to_string()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_vacuum_task_survives_store_errors() {
        let (_clock, store, _cache) = open();
        let broken_ns = Namespace::new("broken").unwrap();
        // A hash sitting where the expiry index belongs makes every pass fail
        store
            .write_untracked(&Namespace::new(broken_ns.index_key()).unwrap(), "k", "v")
            .await
            .unwrap();
        let broken = Cache::open(store.clone(), broken_ns, CacheSettings::default()).unwrap();
        assert!(broken.vacuum(10).await.is_err());

        let handle = spawn_vacuum_task(broken, Duration::from_millis(10), 10);
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!handle.is_finished(), "Task should keep running after failures");
        handle.abort();
    }

    #[tokio::test]
    async fn test_vacuum_task_can_be_aborted() {
        let (_clock, _store, cache) = open();

        let handle = spawn_vacuum_task(cache, Duration::from_secs(1), 10);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
