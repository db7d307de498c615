//! Store Module
//!
//! Capability interface over the key-value store that physically holds namespaces.
//!
//! Every method is one atomic round trip. Methods that touch both the hash and its
//! expiry index read, check, and write inside that single step, and all deadlines are
//! computed from the store's own clock.

mod clock;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;
mod sorted_set;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, Result};
use crate::namespace::Namespace;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

// == Field Write ==
/// One field assignment inside a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    /// Field key inside the namespace hash
    pub key: String,
    /// Value to store
    pub value: String,
    /// Lifetime in milliseconds, relative to the store clock; `<= 0` is already expired
    pub ttl_ms: i64,
}

impl FieldWrite {
    /// Creates a write with a TTL given in seconds.
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl_ms: ttl_secs.saturating_mul(1000),
        }
    }
}

// == TTL Status ==
/// Remaining lifetime of a key or a hash field, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// The key or field does not exist.
    Missing,
    /// The key or field exists and carries no expiration.
    Persistent,
    /// The key or field expires after the given duration.
    ExpiresIn(Duration),
}

impl TtlStatus {
    /// The remaining duration, if an expiration is set.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            TtlStatus::ExpiresIn(remaining) => Some(*remaining),
            _ => None,
        }
    }
}

// == Migration Batch ==
/// Outcome of converting one batch of expiry-index entries to native field TTLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationBatch {
    /// Fields that received a native expiration
    pub converted: usize,
    /// Index entries whose deadline had already passed; their fields were deleted
    pub purged: usize,
    /// Index entries left after this batch
    pub remaining: usize,
}

impl MigrationBatch {
    /// Number of index entries this batch consumed.
    pub fn processed(&self) -> usize {
        self.converted + self.purged
    }
}

// == Store Trait ==
/// Atomic operations the cache engine needs from its backing store.
///
/// The "tracked" methods implement the emulated model: a hash plus an ordered expiry
/// index, with a whole-hash backstop TTL equal to the index's largest deadline. The
/// "native" methods assume per-field expiration is provided by the store itself.
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether the store can expire individual hash fields on its own.
    fn supports_native_field_ttl(&self) -> bool {
        false
    }

    /// Writes fields, upserts their deadlines, and reapplies the backstop TTL.
    async fn write_tracked(&self, ns: &Namespace, writes: &[FieldWrite]) -> Result<()>;

    /// Reads fields in the given order, treating past-deadline fields as absent.
    async fn read_tracked(&self, ns: &Namespace, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Reads every field that is live under the expiry index.
    async fn read_all_tracked(&self, ns: &Namespace) -> Result<Vec<(String, String)>>;

    /// Remaining lifetime of a tracked, unexpired field.
    async fn tracked_ttl(&self, ns: &Namespace, key: &str) -> Result<Option<Duration>>;

    /// Removes up to `delete_count` due fields from hash and index. Returns how many.
    async fn vacuum(&self, ns: &Namespace, delete_count: usize) -> Result<usize>;

    /// Physically removes fields from hash and index and reapplies the backstop.
    /// Returns how many fields the hash held.
    async fn remove_tracked(&self, ns: &Namespace, keys: &[String]) -> Result<usize>;

    /// The namespace hash's own whole-key TTL.
    async fn namespace_ttl(&self, ns: &Namespace) -> Result<TtlStatus>;

    /// Whether the namespace still has an expiry index.
    async fn has_expiry_index(&self, ns: &Namespace) -> Result<bool>;

    /// Converts up to `batch_size` index entries to native field expirations. Deletes
    /// the index and persists the hash once the index is empty.
    async fn migrate_batch(&self, _ns: &Namespace, _batch_size: usize) -> Result<MigrationBatch> {
        Err(native_unsupported())
    }

    /// Writes fields with native per-field expiration. `ttl_ms <= 0` removes the field.
    async fn write_native(&self, _ns: &Namespace, _writes: &[FieldWrite]) -> Result<()> {
        Err(native_unsupported())
    }

    /// Reads fields in the given order under native expiration.
    async fn read_native(&self, _ns: &Namespace, _keys: &[String]) -> Result<Vec<Option<String>>> {
        Err(native_unsupported())
    }

    /// Reads every field under native expiration.
    async fn read_all_native(&self, _ns: &Namespace) -> Result<Vec<(String, String)>> {
        Err(native_unsupported())
    }

    /// The native TTL of one field.
    async fn native_ttl(&self, _ns: &Namespace, _key: &str) -> Result<TtlStatus> {
        Err(native_unsupported())
    }
}

pub(crate) fn native_unsupported() -> CacheError {
    CacheError::Unsupported("store has no native per-field expiration".to_string())
}
