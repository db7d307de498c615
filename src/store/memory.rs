//! Memory Store Module
//!
//! Embedded store with Redis-like keyspace semantics: hashes and sorted sets under
//! string keys, whole-key expiration, and optional per-field hash expiration.
//! Each trait method runs inside one critical section of the keyspace lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::sorted_set::SortedSet;
use super::{native_unsupported, FieldWrite, MigrationBatch, Store, TtlStatus};
use crate::error::{CacheError, Result};
use crate::namespace::Namespace;

// == Keyspace Values ==
#[derive(Debug, Clone)]
struct HashField {
    value: String,
    /// Native per-field expiration (Unix milliseconds)
    expires_at: Option<i64>,
}

impl HashField {
    fn new(value: String) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

type Hash = HashMap<String, HashField>;

#[derive(Debug)]
enum Value {
    Hash(Hash),
    SortedSet(SortedSet),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    /// Whole-key expiration (Unix milliseconds)
    expires_at: Option<i64>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

// == Keyspace ==
/// Named values with lazy expiration. Expired keys and fields are dropped on access.
#[derive(Debug, Default)]
struct Keyspace {
    keys: HashMap<String, Entry>,
}

impl Keyspace {
    fn evict_if_expired(&mut self, name: &str, now: i64) {
        if self.keys.get(name).is_some_and(|entry| entry.is_expired(now)) {
            self.keys.remove(name);
        }
    }

    /// Live hash under `name`, with natively expired fields dropped.
    fn hash(&mut self, name: &str, now: i64) -> Result<Option<&mut Hash>> {
        self.evict_if_expired(name, now);

        let emptied = match self.keys.get_mut(name) {
            None => return Ok(None),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => {
                fields.retain(|_, field| !field.is_expired(now));
                fields.is_empty()
            }
            Some(_) => return Err(wrong_type(name)),
        };

        // An empty hash does not exist
        if emptied {
            self.keys.remove(name);
            return Ok(None);
        }

        match self.keys.get_mut(name) {
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(Some(fields)),
            _ => Ok(None),
        }
    }

    fn hash_or_create(&mut self, name: &str, now: i64) -> Result<&mut Hash> {
        self.hash(name, now)?;

        let entry = self
            .keys
            .entry(name.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(Hash::new())));
        match &mut entry.value {
            Value::Hash(fields) => Ok(fields),
            Value::SortedSet(_) => Err(wrong_type(name)),
        }
    }

    fn index(&mut self, name: &str, now: i64) -> Result<Option<&mut SortedSet>> {
        self.evict_if_expired(name, now);

        match self.keys.get_mut(name) {
            None => Ok(None),
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => Ok(Some(set)),
            Some(_) => Err(wrong_type(name)),
        }
    }

    fn index_or_create(&mut self, name: &str, now: i64) -> Result<&mut SortedSet> {
        self.evict_if_expired(name, now);

        let entry = self
            .keys
            .entry(name.to_string())
            .or_insert_with(|| Entry::new(Value::SortedSet(SortedSet::new())));
        match &mut entry.value {
            Value::SortedSet(set) => Ok(set),
            Value::Hash(_) => Err(wrong_type(name)),
        }
    }

    fn drop_if_empty(&mut self, name: &str) {
        let empty = match self.keys.get(name) {
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => fields.is_empty(),
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => set.is_empty(),
            None => false,
        };
        if empty {
            self.keys.remove(name);
        }
    }

    /// Sets an absolute whole-key expiration. A deadline already reached deletes the key.
    fn expire_at(&mut self, name: &str, at: i64, now: i64) {
        if at <= now {
            self.keys.remove(name);
        } else if let Some(entry) = self.keys.get_mut(name) {
            entry.expires_at = Some(at);
        }
    }

    fn persist(&mut self, name: &str) {
        if let Some(entry) = self.keys.get_mut(name) {
            entry.expires_at = None;
        }
    }

    fn key_ttl(&mut self, name: &str, now: i64) -> TtlStatus {
        self.evict_if_expired(name, now);

        match self.keys.get(name) {
            None => TtlStatus::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => TtlStatus::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => TtlStatus::ExpiresIn(remaining(*at, now)),
        }
    }

    // == Shared Reads ==
    /// Values of `keys` in order. A field whose index deadline has passed reads as
    /// absent even when it also carries no native expiration.
    fn read_fields(
        &mut self,
        ns: &Namespace,
        keys: &[String],
        now: i64,
    ) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let deadline = self
                .index(ns.index_key(), now)?
                .and_then(|index| index.score(key));
            let value = match deadline {
                Some(deadline) if deadline <= now => None,
                _ => self
                    .hash(ns.hash_key(), now)?
                    .and_then(|fields| fields.get(key).map(|field| field.value.clone())),
            };
            values.push(value);
        }
        Ok(values)
    }

    fn read_all_fields(&mut self, ns: &Namespace, now: i64) -> Result<Vec<(String, String)>> {
        let fields: Vec<(String, String)> = match self.hash(ns.hash_key(), now)? {
            Some(fields) => fields
                .iter()
                .map(|(key, field)| (key.clone(), field.value.clone()))
                .collect(),
            None => return Ok(Vec::new()),
        };

        let index = self.index(ns.index_key(), now)?;
        Ok(fields
            .into_iter()
            .filter(|(key, _)| {
                match index.as_ref().and_then(|index| index.score(key)) {
                    Some(deadline) => deadline > now,
                    None => true,
                }
            })
            .collect())
    }

    // == Backstop ==
    /// Expires hash and index at the index's largest deadline, or clears both
    /// expirations' reason to exist when nothing is tracked.
    fn apply_backstop(&mut self, ns: &Namespace, now: i64) -> Result<()> {
        let deadline = self
            .index(ns.index_key(), now)?
            .and_then(|index| index.max_score());

        match deadline {
            Some(deadline) => {
                self.expire_at(ns.hash_key(), deadline, now);
                self.expire_at(ns.index_key(), deadline, now);
            }
            None => {
                self.keys.remove(ns.index_key());
                self.persist(ns.hash_key());
            }
        }
        Ok(())
    }
}

fn wrong_type(name: &str) -> CacheError {
    CacheError::Script(format!(
        "WRONGTYPE key '{}' holds the wrong kind of value",
        name
    ))
}

fn remaining(deadline: i64, now: i64) -> Duration {
    Duration::from_millis(deadline.saturating_sub(now).max(0) as u64)
}

// == Memory Store ==
/// In-process store shared by every cache handle that holds the same `Arc`.
#[derive(Debug)]
pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
    clock: Arc<dyn Clock>,
    native_field_ttl: bool,
}

impl MemoryStore {
    /// Creates an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            clock,
            native_field_ttl: false,
        }
    }

    /// Enables native per-field expiration, as on Redis 7.4 and later.
    pub fn with_native_field_ttl(mut self, enabled: bool) -> Self {
        self.native_field_ttl = enabled;
        self
    }

    /// Writes a field with no expiry-index entry, as data written before the
    /// index existed would look.
    pub async fn write_untracked(&self, ns: &Namespace, key: &str, value: &str) -> Result<()> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        keyspace
            .hash_or_create(ns.hash_key(), now)?
            .insert(key.to_string(), HashField::new(value.to_string()));
        Ok(())
    }

    /// Number of fields physically held by the namespace hash, expired or not.
    pub async fn stored_field_count(&self, ns: &Namespace) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        Ok(keyspace
            .hash(ns.hash_key(), now)?
            .map_or(0, |fields| fields.len()))
    }

    /// Number of entries in the namespace's expiry index.
    pub async fn tracked_field_count(&self, ns: &Namespace) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        Ok(keyspace
            .index(ns.index_key(), now)?
            .map_or(0, |index| index.len()))
    }

    fn require_native(&self) -> Result<()> {
        if self.native_field_ttl {
            Ok(())
        } else {
            Err(native_unsupported())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn supports_native_field_ttl(&self) -> bool {
        self.native_field_ttl
    }

    async fn write_tracked(&self, ns: &Namespace, writes: &[FieldWrite]) -> Result<()> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;

        for write in writes {
            keyspace
                .hash_or_create(ns.hash_key(), now)?
                .insert(write.key.clone(), HashField::new(write.value.clone()));
            keyspace
                .index_or_create(ns.index_key(), now)?
                .insert(&write.key, now.saturating_add(write.ttl_ms));
        }

        keyspace.apply_backstop(ns, now)
    }

    async fn read_tracked(&self, ns: &Namespace, keys: &[String]) -> Result<Vec<Option<String>>> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        keyspace.read_fields(ns, keys, now)
    }

    async fn read_all_tracked(&self, ns: &Namespace) -> Result<Vec<(String, String)>> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        keyspace.read_all_fields(ns, now)
    }

    async fn tracked_ttl(&self, ns: &Namespace, key: &str) -> Result<Option<Duration>> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;

        let deadline = keyspace
            .index(ns.index_key(), now)?
            .and_then(|index| index.score(key));
        Ok(deadline
            .filter(|deadline| *deadline > now)
            .map(|deadline| remaining(deadline, now)))
    }

    async fn vacuum(&self, ns: &Namespace, delete_count: usize) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;

        let due = match keyspace.index(ns.index_key(), now)? {
            Some(index) => index.range_up_to(now, delete_count),
            None => return Ok(0),
        };
        if due.is_empty() {
            return Ok(0);
        }

        if let Some(fields) = keyspace.hash(ns.hash_key(), now)? {
            for key in &due {
                fields.remove(key);
            }
        }
        keyspace.drop_if_empty(ns.hash_key());

        if let Some(index) = keyspace.index(ns.index_key(), now)? {
            for key in &due {
                index.remove(key);
            }
        }
        keyspace.drop_if_empty(ns.index_key());

        keyspace.apply_backstop(ns, now)?;
        debug!(namespace = %ns, removed = due.len(), "memory store vacuumed fields");
        Ok(due.len())
    }

    async fn remove_tracked(&self, ns: &Namespace, keys: &[String]) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;

        let mut removed = 0;
        if let Some(fields) = keyspace.hash(ns.hash_key(), now)? {
            for key in keys {
                if fields.remove(key).is_some() {
                    removed += 1;
                }
            }
        }
        keyspace.drop_if_empty(ns.hash_key());

        if let Some(index) = keyspace.index(ns.index_key(), now)? {
            for key in keys {
                index.remove(key);
            }
        }
        keyspace.drop_if_empty(ns.index_key());

        keyspace.apply_backstop(ns, now)?;
        Ok(removed)
    }

    async fn namespace_ttl(&self, ns: &Namespace) -> Result<TtlStatus> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;

        // Drops the hash when only natively expired fields are left
        keyspace.hash(ns.hash_key(), now)?;
        Ok(keyspace.key_ttl(ns.hash_key(), now))
    }

    async fn has_expiry_index(&self, ns: &Namespace) -> Result<bool> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        Ok(keyspace.index(ns.index_key(), now)?.is_some())
    }

    async fn migrate_batch(&self, ns: &Namespace, batch_size: usize) -> Result<MigrationBatch> {
        self.require_native()?;
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;

        let batch = match keyspace.index(ns.index_key(), now)? {
            Some(index) => index.first(batch_size),
            None => return Ok(MigrationBatch::default()),
        };

        let mut outcome = MigrationBatch::default();
        if let Some(fields) = keyspace.hash(ns.hash_key(), now)? {
            for (key, deadline) in &batch {
                if *deadline <= now {
                    fields.remove(key);
                } else if let Some(field) = fields.get_mut(key) {
                    field.expires_at = Some(*deadline);
                    outcome.converted += 1;
                }
            }
        }
        outcome.purged = batch.iter().filter(|(_, deadline)| *deadline <= now).count();
        keyspace.drop_if_empty(ns.hash_key());

        if let Some(index) = keyspace.index(ns.index_key(), now)? {
            for (key, _) in &batch {
                index.remove(key);
            }
            outcome.remaining = index.len();
        }

        if outcome.remaining == 0 {
            keyspace.keys.remove(ns.index_key());
            keyspace.persist(ns.hash_key());
        }
        Ok(outcome)
    }

    async fn write_native(&self, ns: &Namespace, writes: &[FieldWrite]) -> Result<()> {
        self.require_native()?;
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;

        for write in writes {
            if write.ttl_ms <= 0 {
                if let Some(fields) = keyspace.hash(ns.hash_key(), now)? {
                    fields.remove(&write.key);
                }
                keyspace.drop_if_empty(ns.hash_key());
            } else {
                keyspace.hash_or_create(ns.hash_key(), now)?.insert(
                    write.key.clone(),
                    HashField {
                        value: write.value.clone(),
                        expires_at: Some(now.saturating_add(write.ttl_ms)),
                    },
                );
            }
        }

        // Natively written fields leave an unmigrated index; the rest of it stays
        // authoritative for reads, so neither key may expire as a whole
        if let Some(index) = keyspace.index(ns.index_key(), now)? {
            for write in writes {
                index.remove(&write.key);
            }
            keyspace.drop_if_empty(ns.index_key());
            keyspace.persist(ns.index_key());
            keyspace.persist(ns.hash_key());
        }
        Ok(())
    }

    async fn read_native(&self, ns: &Namespace, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.require_native()?;
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        keyspace.read_fields(ns, keys, now)
    }

    async fn read_all_native(&self, ns: &Namespace) -> Result<Vec<(String, String)>> {
        self.require_native()?;
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        keyspace.read_all_fields(ns, now)
    }

    async fn native_ttl(&self, ns: &Namespace, key: &str) -> Result<TtlStatus> {
        self.require_native()?;
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;

        // Until migration finishes, an index deadline outranks the field's own state
        let deadline = keyspace
            .index(ns.index_key(), now)?
            .and_then(|index| index.score(key));
        if matches!(deadline, Some(deadline) if deadline <= now) {
            return Ok(TtlStatus::Missing);
        }

        let status = match keyspace
            .hash(ns.hash_key(), now)?
            .and_then(|fields| fields.get(key))
        {
            None => TtlStatus::Missing,
            Some(HashField {
                expires_at: None, ..
            }) => deadline.map_or(TtlStatus::Persistent, |deadline| {
                TtlStatus::ExpiresIn(remaining(deadline, now))
            }),
            Some(HashField {
                expires_at: Some(at),
                ..
            }) => TtlStatus::ExpiresIn(remaining(*at, now)),
        };
        Ok(status)
    }
}
