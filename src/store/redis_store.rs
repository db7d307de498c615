//! Redis Store Module
//!
//! Redis-backed store. Every multi-step operation is a Lua script, so the read-check-write
//! across the hash and its expiry index runs atomically on the server, and the server's
//! `TIME` is the clock. Native per-field expiration needs Redis 7.4 or later.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use tracing::debug;

use super::{native_unsupported, FieldWrite, MigrationBatch, Store, TtlStatus};
use crate::error::{CacheError, Result};
use crate::namespace::Namespace;

// == Lua Preludes ==
/// Defines `now` as the server time in milliseconds.
const CLOCK: &str = r#"
local time = redis.call('TIME')
local now = tonumber(time[1]) * 1000 + math.floor(tonumber(time[2]) / 1000)
"#;

/// Expires KEYS[1] (hash) and KEYS[2] (index) at the index's largest deadline, or
/// drops the index and persists the hash when nothing is tracked.
const BACKSTOP: &str = r#"
local function backstop()
  local top = redis.call('ZRANGE', KEYS[2], -1, -1, 'WITHSCORES')
  if #top == 0 then
    redis.call('DEL', KEYS[2])
    redis.call('PERSIST', KEYS[1])
  else
    redis.call('PEXPIREAT', KEYS[1], top[2])
    redis.call('PEXPIREAT', KEYS[2], top[2])
  end
end
"#;

/// Applies a variadic command to `members` in slices, keeping each call well under
/// Lua's `unpack` limit. Returns the summed replies.
const CHUNKED: &str = r#"
local function chunked(command, key, members)
  local total = 0
  for i = 1, #members, 1000 do
    total = total + redis.call(command, key, unpack(members, i, math.min(i + 999, #members)))
  end
  return total
end
"#;

// == Script Bodies ==
/// ARGV: repeated (field, value, ttl_ms)
const WRITE_TRACKED: &str = r#"
for i = 1, #ARGV, 3 do
  redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
  redis.call('ZADD', KEYS[2], now + tonumber(ARGV[i + 2]), ARGV[i])
end
backstop()
return #ARGV / 3
"#;

/// ARGV: fields. Returns values in order, nil for absent or expired.
const READ_TRACKED: &str = r#"
local values = {}
for i, field in ipairs(ARGV) do
  local deadline = redis.call('ZSCORE', KEYS[2], field)
  if deadline and tonumber(deadline) <= now then
    values[i] = false
  else
    values[i] = redis.call('HGET', KEYS[1], field)
  end
end
return values
"#;

/// Returns a flat field/value list of live fields.
const READ_ALL_TRACKED: &str = r#"
local flat = redis.call('HGETALL', KEYS[1])
local live = {}
for i = 1, #flat, 2 do
  local deadline = redis.call('ZSCORE', KEYS[2], flat[i])
  if not deadline or tonumber(deadline) > now then
    live[#live + 1] = flat[i]
    live[#live + 1] = flat[i + 1]
  end
end
return live
"#;

/// ARGV[1]: field. Returns remaining milliseconds, or -1.
const TRACKED_TTL: &str = r#"
local deadline = redis.call('ZSCORE', KEYS[2], ARGV[1])
if deadline and tonumber(deadline) > now then
  return tonumber(deadline) - now
end
return -1
"#;

/// ARGV[1]: delete count. Returns the number of fields removed.
const VACUUM: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', now, 'LIMIT', 0, tonumber(ARGV[1]))
if #due == 0 then
  return 0
end
chunked('HDEL', KEYS[1], due)
chunked('ZREM', KEYS[2], due)
backstop()
return #due
"#;

/// ARGV: fields. Returns how many the hash held.
const REMOVE_TRACKED: &str = r#"
local removed = chunked('HDEL', KEYS[1], ARGV)
chunked('ZREM', KEYS[2], ARGV)
backstop()
return removed
"#;

/// ARGV[1]: batch size. Returns {converted, purged, remaining}.
const MIGRATE_BATCH: &str = r#"
local batch = redis.call('ZRANGE', KEYS[2], 0, tonumber(ARGV[1]) - 1, 'WITHSCORES')
local converted, purged = 0, 0
for i = 1, #batch, 2 do
  local field, deadline = batch[i], batch[i + 1]
  if tonumber(deadline) <= now then
    redis.call('HDEL', KEYS[1], field)
    purged = purged + 1
  else
    local set = redis.call('HPEXPIREAT', KEYS[1], deadline, 'FIELDS', 1, field)
    if set[1] == 1 then
      converted = converted + 1
    end
  end
  redis.call('ZREM', KEYS[2], field)
end
local remaining = redis.call('ZCARD', KEYS[2])
if remaining == 0 then
  redis.call('DEL', KEYS[2])
  redis.call('PERSIST', KEYS[1])
end
return {converted, purged, remaining}
"#;

/// ARGV: repeated (field, value, ttl_ms). Non-positive TTL deletes the field.
/// Written fields leave an unmigrated index, and neither key keeps a whole-key TTL.
const WRITE_NATIVE: &str = r#"
local indexed = redis.call('EXISTS', KEYS[2]) == 1
for i = 1, #ARGV, 3 do
  local ttl = tonumber(ARGV[i + 2])
  if ttl <= 0 then
    redis.call('HDEL', KEYS[1], ARGV[i])
  else
    redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
    redis.call('HPEXPIRE', KEYS[1], ttl, 'FIELDS', 1, ARGV[i])
  end
  if indexed then
    redis.call('ZREM', KEYS[2], ARGV[i])
  end
end
if indexed then
  redis.call('PERSIST', KEYS[1])
  redis.call('PERSIST', KEYS[2])
end
return #ARGV / 3
"#;

/// ARGV[1]: field. A passed index deadline reads as missing (-2); otherwise the
/// field's own expiration, falling back to a pending index deadline.
const NATIVE_TTL: &str = r#"
local deadline = redis.call('ZSCORE', KEYS[2], ARGV[1])
if deadline and tonumber(deadline) <= now then
  return -2
end
local ttl = redis.call('HPTTL', KEYS[1], 'FIELDS', 1, ARGV[1])[1]
if ttl == -1 and deadline then
  return tonumber(deadline) - now
end
return ttl
"#;

struct Scripts {
    write_tracked: Script,
    read_tracked: Script,
    read_all_tracked: Script,
    tracked_ttl: Script,
    vacuum: Script,
    remove_tracked: Script,
    migrate_batch: Script,
    write_native: Script,
    native_ttl: Script,
}

impl Scripts {
    fn load() -> Self {
        let tracked =
            |body: &str| Script::new(&format!("{}{}{}{}", CLOCK, BACKSTOP, CHUNKED, body));
        Self {
            write_tracked: tracked(WRITE_TRACKED),
            read_tracked: tracked(READ_TRACKED),
            read_all_tracked: tracked(READ_ALL_TRACKED),
            tracked_ttl: tracked(TRACKED_TTL),
            vacuum: tracked(VACUUM),
            remove_tracked: tracked(REMOVE_TRACKED),
            migrate_batch: tracked(MIGRATE_BATCH),
            write_native: Script::new(WRITE_NATIVE),
            native_ttl: tracked(NATIVE_TTL),
        }
    }
}

// == Redis Store ==
/// Store backed by a caller-supplied multiplexed Redis connection.
pub struct RedisStore {
    conn: MultiplexedConnection,
    scripts: Scripts,
    native_field_ttl: bool,
}

impl RedisStore {
    /// Wraps an existing connection. The caller owns the connection's lifetime.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            scripts: Scripts::load(),
            native_field_ttl: false,
        }
    }

    /// Opens a connection to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("Redis client error: {}", e)))?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(conn))
    }

    /// Declares that the server supports hash field expiration (Redis 7.4+).
    pub fn with_native_field_ttl(mut self, enabled: bool) -> Self {
        self.native_field_ttl = enabled;
        self
    }

    fn require_native(&self) -> Result<()> {
        if self.native_field_ttl {
            Ok(())
        } else {
            Err(native_unsupported())
        }
    }
}

fn pairs(flat: Vec<String>) -> Vec<(String, String)> {
    let mut flat = flat.into_iter();
    let mut fields = Vec::with_capacity(flat.len() / 2);
    while let (Some(key), Some(value)) = (flat.next(), flat.next()) {
        fields.push((key, value));
    }
    fields
}

/// Counts passed to `LIMIT` and `ZRANGE` go through Lua numbers; keep them integral.
fn script_limit(count: usize) -> usize {
    count.min(i32::MAX as usize)
}

fn ttl_status(reply: i64) -> TtlStatus {
    match reply {
        -2 => TtlStatus::Missing,
        -1 => TtlStatus::Persistent,
        ms => TtlStatus::ExpiresIn(Duration::from_millis(ms.max(0) as u64)),
    }
}

#[async_trait]
impl Store for RedisStore {
    fn supports_native_field_ttl(&self) -> bool {
        self.native_field_ttl
    }

    async fn write_tracked(&self, ns: &Namespace, writes: &[FieldWrite]) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.write_tracked.prepare_invoke();
        invocation.key(ns.hash_key()).key(ns.index_key());
        for write in writes {
            invocation.arg(&write.key).arg(&write.value).arg(write.ttl_ms);
        }
        let _: () = invocation.invoke_async(&mut conn).await?;
        Ok(())
    }

    async fn read_tracked(&self, ns: &Namespace, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.read_tracked.prepare_invoke();
        invocation.key(ns.hash_key()).key(ns.index_key()).arg(keys);
        Ok(invocation.invoke_async(&mut conn).await?)
    }

    async fn read_all_tracked(&self, ns: &Namespace) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn.clone();
        let flat: Vec<String> = self
            .scripts
            .read_all_tracked
            .key(ns.hash_key())
            .key(ns.index_key())
            .invoke_async(&mut conn)
            .await?;
        Ok(pairs(flat))
    }

    async fn tracked_ttl(&self, ns: &Namespace, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn.clone();
        let remaining: i64 = self
            .scripts
            .tracked_ttl
            .key(ns.hash_key())
            .key(ns.index_key())
            .arg(key)
            .invoke_async(&mut conn)
            .await?;
        Ok((remaining >= 0).then(|| Duration::from_millis(remaining as u64)))
    }

    async fn vacuum(&self, ns: &Namespace, delete_count: usize) -> Result<usize> {
        let mut conn = self.conn.clone();
        let removed: usize = self
            .scripts
            .vacuum
            .key(ns.hash_key())
            .key(ns.index_key())
            .arg(script_limit(delete_count))
            .invoke_async(&mut conn)
            .await?;
        debug!(namespace = %ns, removed, "redis store vacuumed fields");
        Ok(removed)
    }

    async fn remove_tracked(&self, ns: &Namespace, keys: &[String]) -> Result<usize> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.remove_tracked.prepare_invoke();
        invocation.key(ns.hash_key()).key(ns.index_key()).arg(keys);
        Ok(invocation.invoke_async(&mut conn).await?)
    }

    async fn namespace_ttl(&self, ns: &Namespace) -> Result<TtlStatus> {
        let mut conn = self.conn.clone();
        let reply: i64 = conn.pttl(ns.hash_key()).await?;
        Ok(ttl_status(reply))
    }

    async fn has_expiry_index(&self, ns: &Namespace) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(ns.index_key()).await?)
    }

    async fn migrate_batch(&self, ns: &Namespace, batch_size: usize) -> Result<MigrationBatch> {
        self.require_native()?;
        let mut conn = self.conn.clone();
        let (converted, purged, remaining): (usize, usize, usize) = self
            .scripts
            .migrate_batch
            .key(ns.hash_key())
            .key(ns.index_key())
            .arg(script_limit(batch_size))
            .invoke_async(&mut conn)
            .await?;
        Ok(MigrationBatch {
            converted,
            purged,
            remaining,
        })
    }

    async fn write_native(&self, ns: &Namespace, writes: &[FieldWrite]) -> Result<()> {
        self.require_native()?;
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.write_native.prepare_invoke();
        invocation.key(ns.hash_key()).key(ns.index_key());
        for write in writes {
            invocation.arg(&write.key).arg(&write.value).arg(write.ttl_ms);
        }
        let _: () = invocation.invoke_async(&mut conn).await?;
        Ok(())
    }

    async fn read_native(&self, ns: &Namespace, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.require_native()?;
        // HGET already hides natively expired fields; the index covers unmigrated ones
        self.read_tracked(ns, keys).await
    }

    async fn read_all_native(&self, ns: &Namespace) -> Result<Vec<(String, String)>> {
        self.require_native()?;
        self.read_all_tracked(ns).await
    }

    async fn native_ttl(&self, ns: &Namespace, key: &str) -> Result<TtlStatus> {
        self.require_native()?;
        let mut conn = self.conn.clone();
        let reply: i64 = self
            .scripts
            .native_ttl
            .key(ns.hash_key())
            .key(ns.index_key())
            .arg(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(ttl_status(reply))
    }
}
