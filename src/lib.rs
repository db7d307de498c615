//! fieldcache - Per-field TTL caching over a shared hash store
//!
//! Each namespace is one hash. Field deadlines live in a sorted expiry index next to
//! it, and the hash carries a backstop TTL equal to the largest tracked deadline.
//! Stores with native per-field expiration can be migrated off the index.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod namespace;
pub mod store;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{Cache, CacheRepository, ExpiryModel, FieldCache, LegacyAdapter, Migrator};
pub use config::{CacheSettings, Config};
pub use error::{CacheError, Result};
pub use namespace::Namespace;
pub use store::{MemoryStore, Store};
pub use tasks::{prepare_invocation, spawn_vacuum_task, MaintenanceReport};
