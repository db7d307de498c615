//! Configuration Module
//!
//! Handles loading engine and server configuration from environment variables.

use std::env;

use crate::cache::{ExpiryModel, DEFAULT_MIGRATION_BATCH_SIZE, DEFAULT_VACUUM_DELETE_COUNT};

/// Settings that shape how a namespace is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Which expiration model namespaces are served with
    pub expiry_model: ExpiryModel,
    /// Upper bound on fields removed by one vacuum pass
    pub vacuum_delete_count: usize,
    /// Fields converted per migration round trip
    pub migration_batch_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            expiry_model: ExpiryModel::Emulated,
            vacuum_delete_count: DEFAULT_VACUUM_DELETE_COUNT,
            migration_batch_size: DEFAULT_MIGRATION_BATCH_SIZE,
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background vacuum interval in seconds
    pub vacuum_interval: u64,
    /// Redis connection URL; the in-memory store is used when unset
    pub redis_url: Option<String>,
    /// Engine settings
    pub cache: CacheSettings,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `VACUUM_INTERVAL` - Vacuum frequency in seconds (default: 1)
    /// - `VACUUM_DELETE_COUNT` - Max fields removed per vacuum (default: 100)
    /// - `MIGRATION_BATCH_SIZE` - Fields converted per migration step (default: 256)
    /// - `FIELD_EXPIRY` - `emulated` or `native` (default: emulated)
    /// - `REDIS_URL` - Redis connection URL (default: unset)
    pub fn from_env() -> Self {
        let defaults = CacheSettings::default();

        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(3000),
            vacuum_interval: parse_var("VACUUM_INTERVAL").unwrap_or(1),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            cache: CacheSettings {
                expiry_model: parse_var("FIELD_EXPIRY").unwrap_or(defaults.expiry_model),
                vacuum_delete_count: parse_var("VACUUM_DELETE_COUNT")
                    .unwrap_or(defaults.vacuum_delete_count),
                migration_batch_size: parse_var("MIGRATION_BATCH_SIZE")
                    .filter(|size| *size > 0)
                    .unwrap_or(defaults.migration_batch_size),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            vacuum_interval: 1,
            redis_url: None,
            cache: CacheSettings::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
