//! Namespace Module
//!
//! Names the hash that holds a namespace's fields and the expiry index beside it.

use std::fmt;

use crate::error::{CacheError, Result};

/// A cache namespace: one hash plus its companion expiry index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    hash_key: String,
    index_key: String,
}

impl Namespace {
    /// Creates a namespace from the caller-supplied hash name.
    pub fn new(hash_name: impl Into<String>) -> Result<Self> {
        let hash_key = hash_name.into();
        if hash_key.is_empty() {
            return Err(CacheError::InvalidRequest(
                "Namespace name cannot be empty".to_string(),
            ));
        }

        // The hash tag keeps the index in the same cluster slot as the hash
        let index_key = format!("{{{}}}:expiry", hash_key);
        Ok(Self {
            hash_key,
            index_key,
        })
    }

    /// Creates the namespace for one provider/asset/stream/app combination.
    pub fn from_parts(provider: &str, asset: &str, stream: &str, app: &str) -> Result<Self> {
        if [provider, asset, stream, app].iter().any(|part| part.is_empty()) {
            return Err(CacheError::InvalidRequest(
                "Namespace parts cannot be empty".to_string(),
            ));
        }
        Self::new(format!("{}:{}:{}:{}", provider, asset, stream, app))
    }

    /// Name of the hash holding field values.
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// Name of the ordered expiry index.
    pub fn index_key(&self) -> &str {
        &self.index_key
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_keys() {
        let ns = Namespace::new("orders").unwrap();
        assert_eq!(ns.hash_key(), "orders");
        assert_eq!(ns.index_key(), "{orders}:expiry");
        assert_eq!(ns.to_string(), "orders");
    }

    #[test]
    fn test_namespace_empty_name() {
        assert!(matches!(
            Namespace::new(""),
            Err(CacheError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_namespace_from_parts() {
        let ns = Namespace::from_parts("aws", "wallet", "transfers", "alerts").unwrap();
        assert_eq!(ns.hash_key(), "aws:wallet:transfers:alerts");

        assert!(Namespace::from_parts("aws", "", "transfers", "alerts").is_err());
    }
}
