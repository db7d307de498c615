//! Integration Tests for the Redis Store
//!
//! Run with `--features redis` against a live server named by `REDIS_URL`. Each test
//! returns early when the variable is unset.

#![cfg(feature = "redis")]

use std::time::Duration;

use fieldcache::{
    store::{RedisStore, TtlStatus},
    CacheRepository, LegacyAdapter, Namespace, Store,
};
use std::sync::Arc;

async fn connect() -> Option<Arc<RedisStore>> {
    let url = std::env::var("REDIS_URL").ok()?;
    Some(Arc::new(RedisStore::connect(&url).await.unwrap()))
}

fn unique_namespace(test: &str) -> Namespace {
    let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    Namespace::new(format!("fieldcache-test:{}:{}", test, suffix)).unwrap()
}

#[tokio::test]
async fn test_redis_set_get_and_backstop() {
    let Some(store) = connect().await else {
        return;
    };
    let repo = CacheRepository::new(store.clone(), unique_namespace("backstop"));

    repo.set_many(&[("k1", "v1", 60), ("k2", "v2", -1)]).await.unwrap();
    assert_eq!(repo.get("k1").await.unwrap(), Some("v1".to_string()));
    assert_eq!(repo.get("k2").await.unwrap(), None);
    assert_eq!(repo.get_all().await.unwrap().len(), 1);

    match repo.namespace_ttl().await.unwrap() {
        TtlStatus::ExpiresIn(ttl) => assert!(ttl <= Duration::from_secs(60)),
        other => panic!("expected a backstop ttl, got {:?}", other),
    }

    assert_eq!(repo.vacuum(10).await.unwrap(), 1);
    LegacyAdapter::new(repo.clone()).delete("k1").await.unwrap();
    assert!(!store.has_expiry_index(repo.namespace()).await.unwrap());
    assert_eq!(repo.namespace_ttl().await.unwrap(), TtlStatus::Missing);
}

#[tokio::test]
async fn test_redis_get_many_order() {
    let Some(store) = connect().await else {
        return;
    };
    let repo = CacheRepository::new(store, unique_namespace("order"));

    repo.set_many(&[("a", "1", 30), ("c", "3", 30)]).await.unwrap();
    assert_eq!(
        repo.get_many(&["c", "b", "a"]).await.unwrap(),
        vec![Some("3".to_string()), None, Some("1".to_string())]
    );

    repo.delete("a").await.unwrap();
    assert_eq!(repo.vacuum(10).await.unwrap(), 1);

    // Deleting the last tracked field expires the whole namespace at once
    repo.delete("c").await.unwrap();
    assert_eq!(repo.namespace_ttl().await.unwrap(), TtlStatus::Missing);
}

#[tokio::test]
async fn test_redis_vacuum_large_batch() {
    let Some(store) = connect().await else {
        return;
    };
    let repo = CacheRepository::new(store.clone(), unique_namespace("large"));

    let entries: Vec<(String, String, i64)> = (0..9000)
        .map(|i| (format!("k{}", i), "x".to_string(), -1))
        .chain(std::iter::once(("live".to_string(), "y".to_string(), 60)))
        .collect();
    repo.set_many(&entries).await.unwrap();

    assert_eq!(repo.vacuum(usize::MAX).await.unwrap(), 9000);
    assert_eq!(repo.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_redis_native_reads_honor_unmigrated_index() {
    let Ok(url) = std::env::var("REDIS_URL") else {
        return;
    };
    let store = Arc::new(
        RedisStore::connect(&url)
            .await
            .unwrap()
            .with_native_field_ttl(true),
    );
    let ns = unique_namespace("native-index");
    let repo = CacheRepository::new(store.clone(), ns.clone());

    repo.set_many(&[("gone", "g", -1), ("live", "l", 60)]).await.unwrap();

    assert!(store.has_expiry_index(&ns).await.unwrap());
    assert_eq!(
        store
            .read_native(&ns, &["gone".to_string(), "live".to_string()])
            .await
            .unwrap(),
        vec![None, Some("l".to_string())]
    );
    assert_eq!(store.read_all_native(&ns).await.unwrap().len(), 1);
}
