//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

/// Response body for a single field read (GET /ns/:ns/fields/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for a batch read; `null` marks missing or expired fields
#[derive(Debug, Clone, Serialize)]
pub struct GetManyResponse {
    pub values: Vec<Option<String>>,
}

/// Response body listing every live field of a namespace
#[derive(Debug, Clone, Serialize)]
pub struct FieldsResponse {
    pub namespace: String,
    pub fields: HashMap<String, String>,
}

/// Response body for field writes
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// Number of fields written
    pub written: usize,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(written: usize) -> Self {
        Self {
            message: format!("{} field(s) set successfully", written),
            written,
        }
    }
}

/// Response body for the DELETE operation (DELETE /ns/:ns/fields/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Remaining lifetime of a field in milliseconds, `null` when it has none
#[derive(Debug, Clone, Serialize)]
pub struct TtlResponse {
    pub key: String,
    pub ttl_ms: Option<u64>,
}

impl TtlResponse {
    pub fn new(key: impl Into<String>, remaining: Option<Duration>) -> Self {
        Self {
            key: key.into(),
            ttl_ms: remaining.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VacuumResponse {
    /// Expired fields physically removed
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrateResponse {
    /// Whether an expiry index was converted
    pub migrated: bool,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Active expiry model
    pub expiry_model: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(expiry_model: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            expiry_model: expiry_model.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
