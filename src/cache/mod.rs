//! Cache Module
//!
//! Per-field TTL caching over a hash-shaped store: the repository engine, the legacy
//! adapter kept for older callers, the migrator to native field expiration, and the
//! facade handed to application code.

mod facade;
mod legacy;
mod migrator;
mod repository;


use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

// Re-export public types
pub use facade::Cache;
pub use legacy::LegacyAdapter;
pub use migrator::Migrator;
pub use repository::CacheRepository;

// == Public Constants ==
/// Fields converted per migration round trip
pub const DEFAULT_MIGRATION_BATCH_SIZE: usize = 256;

/// Expired fields removed per routine vacuum pass
pub const DEFAULT_VACUUM_DELETE_COUNT: usize = 100;

// == Expiry Model ==
/// How per-field expiration is provided for a namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpiryModel {
    /// Emulated with an expiry index and a whole-hash backstop TTL
    #[default]
    Emulated,
    /// Provided by the store's own per-field expiration
    Native,
}

impl FromStr for ExpiryModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emulated" => Ok(ExpiryModel::Emulated),
            "native" => Ok(ExpiryModel::Native),
            other => Err(format!("unknown expiry model '{}'", other)),
        }
    }
}

impl fmt::Display for ExpiryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryModel::Emulated => f.write_str("emulated"),
            ExpiryModel::Native => f.write_str("native"),
        }
    }
}

// == Field Cache ==
/// Single-field operations shared by the repository and the legacy adapter.
///
/// Both views operate on the same physical hash and agree on what "expired" means.
#[async_trait]
pub trait FieldCache: Send + Sync {
    /// Returns the live value of a field.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a field that expires `ttl` seconds from now.
    async fn set(&self, key: &str, value: &str, ttl: i64) -> Result<()>;

    /// Deletes a field. Deleting a missing field is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remaining lifetime, in the sense each view defines it.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Whether the field is live.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
