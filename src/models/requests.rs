//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for a single field write (PUT /ns/:ns/fields)
///
/// # Fields
/// - `key`: Field key inside the namespace
/// - `value`: The value to store
/// - `ttl`: Lifetime in seconds; zero or negative stores the field already expired
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The field key
    pub key: String,
    /// The value to store
    pub value: String,
    /// TTL in seconds
    pub ttl: i64,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        None
    }
}

/// Request body for a batch write (PUT /ns/:ns/batch)
#[derive(Debug, Clone, Deserialize)]
pub struct SetManyRequest {
    pub entries: Vec<SetRequest>,
}

impl SetManyRequest {
    pub fn validate(&self) -> Option<String> {
        if self.entries.is_empty() {
            return Some("Entries cannot be empty".to_string());
        }
        self.entries.iter().find_map(SetRequest::validate)
    }

    /// Entries as `(key, value, ttl)` tuples, in request order.
    pub fn into_tuples(self) -> Vec<(String, String, i64)> {
        self.entries
            .into_iter()
            .map(|entry| (entry.key, entry.value, entry.ttl))
            .collect()
    }
}

/// Request body for a batch read (POST /ns/:ns/query)
#[derive(Debug, Clone, Deserialize)]
pub struct GetManyRequest {
    pub keys: Vec<String>,
}

impl GetManyRequest {
    pub fn validate(&self) -> Option<String> {
        if self.keys.is_empty() {
            return Some("Keys cannot be empty".to_string());
        }
        None
    }
}

/// Request body for a vacuum pass (POST /ns/:ns/vacuum)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VacuumRequest {
    /// Upper bound on removed fields; the configured count when omitted
    #[serde(default)]
    pub delete_count: Option<usize>,
}
