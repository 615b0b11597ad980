//! Typed Key Space
//!
//! The [`Keyspace`] is the single owner of every key in the store. Each key
//! holds exactly one [`TypedValue`] and an optional absolute deadline.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Keyspace                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! │                  WaiterRegistry (blocking pops)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A key's shard is picked by hashing its name. Single-key operations take
//! one shard lock, which makes them linearizable per key. Operations that
//! touch several keys lock all involved shards in ascending index order, so
//! two such operations can never deadlock against each other.
//!
//! ## Expiry
//!
//! Expiry is lazy only. Any access that observes a key past its deadline
//! treats it as absent and removes it. There is no background sweeper.
//!
//! ## Empty collections
//!
//! A collection that becomes empty is removed together with its key, for
//! every engine and every operation.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::storage::blocking::WaiterRegistry;
use crate::storage::glob::GlobPattern;
use crate::types::value::{KeyType, TypedValue, Variant};
use bytes::Bytes;
use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Absolute deadline `ttl` from now, saturating at `u64::MAX`.
pub(crate) fn deadline_after(ttl: Duration) -> u64 {
    now_ms().saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
}

/// A stored value plus its optional deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: TypedValue,
    /// Absolute deadline in epoch milliseconds (None = never expires)
    pub expires_at: Option<u64>,
}

impl Entry {
    pub fn new(value: TypedValue) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    /// Remaining lifetime in milliseconds, or None if no deadline.
    pub fn remaining_ms(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|deadline| deadline.saturating_sub(now))
    }
}

pub(crate) type ShardMap = HashMap<String, Entry>;

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    expired: AtomicU64,
    blocking_wakeups: AtomicU64,
    blocking_timeouts: AtomicU64,
}

/// Point-in-time statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyspaceStats {
    /// Live keys
    pub keys: u64,
    pub reads: u64,
    pub writes: u64,
    /// Keys reclaimed after their deadline passed
    pub expired: u64,
    /// Blocking pops satisfied after waiting
    pub blocking_wakeups: u64,
    /// Blocking pops that gave up at their deadline
    pub blocking_timeouts: u64,
}

/// The shared, typed key space.
///
/// Wrap it in an `Arc` to share between threads or tasks; every method
/// takes `&self`.
///
/// # Example
///
/// ```
/// use memstore::Keyspace;
/// use bytes::Bytes;
///
/// let store = Keyspace::new();
/// store.set("name", Bytes::from("Ariz")).unwrap();
/// store.rpush("queue", vec![Bytes::from("a"), Bytes::from("b")]).unwrap();
///
/// assert_eq!(store.get("name").unwrap(), Some(Bytes::from("Ariz")));
/// assert_eq!(store.llen("queue").unwrap(), 2);
/// assert!(store.get("queue").is_err()); // wrong type
/// ```
pub struct Keyspace {
    shards: Vec<RwLock<ShardMap>>,
    config: StoreConfig,
    pub(crate) waiters: WaiterRegistry,
    counters: Counters,
}

impl std::fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyspace")
            .field("shards", &self.shards.len())
            .field("config", &self.config)
            .field("reads", &self.counters.reads.load(Ordering::Relaxed))
            .field("writes", &self.counters.writes.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyspace {
    /// Creates a key space with the default configuration.
    pub fn new() -> Self {
        Self::build(StoreConfig::default())
    }

    /// Creates a key space after validating `config`.
    pub fn with_config(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: StoreConfig) -> Self {
        debug!(shards = config.shards, "creating keyspace");
        Self {
            shards: (0..config.shards).map(|_| RwLock::new(HashMap::new())).collect(),
            config,
            waiters: WaiterRegistry::new(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    #[inline]
    pub(super) fn shard(&self, key: &str) -> &RwLock<ShardMap> {
        &self.shards[self.shard_index(key)]
    }

    // ========================================================================
    // Access helpers shared by the engine modules
    // ========================================================================

    /// Returns the live entry for `key`, reclaiming it first if expired.
    pub(super) fn live<'m>(&self, map: &'m mut ShardMap, key: &str) -> Option<&'m mut Entry> {
        if map.get(key).is_some_and(|e| e.is_expired_at(now_ms())) {
            map.remove(key);
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "reclaimed expired key");
            return None;
        }
        map.get_mut(key)
    }

    /// Typed mutable access to an existing key.
    fn typed_mut<'m, V: Variant>(
        &self,
        map: &'m mut ShardMap,
        key: &str,
    ) -> StoreResult<Option<&'m mut V>> {
        match self.live(map, key) {
            Some(entry) => V::expect_mut(&mut entry.value).map(Some),
            None => Ok(None),
        }
    }

    /// Typed mutable access, creating the key from `init` if absent.
    fn typed_or_insert<'m, V: Variant>(
        &self,
        map: &'m mut ShardMap,
        key: &str,
        init: impl FnOnce() -> StoreResult<V>,
    ) -> StoreResult<&'m mut V> {
        self.live(map, key);
        let entry = match map.entry(key.to_string()) {
            MapEntry::Occupied(slot) => slot.into_mut(),
            MapEntry::Vacant(slot) => slot.insert(Entry::new(init()?.into_value())),
        };
        V::expect_mut(&mut entry.value)
    }

    /// Runs `f` on the live entry at `key`.
    ///
    /// Takes the read lock first and only upgrades to a write lock when the
    /// key turns out to be expired and must be reclaimed.
    pub(crate) fn peek<R>(&self, key: &str, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        let shard = self.shard(key);

        {
            let map = shard.read();
            match map.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now_ms()) => return Some(f(entry)),
                Some(_) => {}
            }
        }

        let mut map = shard.write();
        self.live(&mut map, key).map(|entry| f(&*entry))
    }

    /// Runs `f` on the value at `key` if it holds a `V`.
    ///
    /// # Returns
    ///
    /// - `Ok(None)` if the key is absent
    /// - `Err(WrongType)` if it holds another type
    pub(crate) fn view<V: Variant, R>(
        &self,
        key: &str,
        f: impl FnOnce(&V) -> R,
    ) -> StoreResult<Option<R>> {
        self.peek(key, |entry| V::expect_ref(&entry.value).map(f))
            .transpose()
    }

    /// Mutates an existing `V` at `key`. The key is removed if `f` leaves
    /// the collection empty.
    pub(crate) fn update<V: Variant, R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut V) -> StoreResult<R>,
    ) -> StoreResult<Option<R>> {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let mut map = self.shard(key).write();
        let out = match self.typed_mut::<V>(&mut map, key)? {
            Some(value) => f(value).map(Some),
            None => return Ok(None),
        };
        drop_if_empty(&mut map, key);
        out
    }

    /// Mutates the `V` at `key`, creating it from `init` when absent.
    /// A key created here but left empty (or rejected by `f`) is removed.
    pub(crate) fn upsert<V: Variant, R>(
        &self,
        key: &str,
        init: impl FnOnce() -> StoreResult<V>,
        f: impl FnOnce(&mut V) -> StoreResult<R>,
    ) -> StoreResult<R> {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let mut map = self.shard(key).write();
        let out = f(self.typed_or_insert(&mut map, key, init)?);
        drop_if_empty(&mut map, key);
        out
    }

    /// Write-locks every shard that holds one of `keys`, in ascending shard
    /// order.
    pub(crate) fn lock_keys<'a>(&'a self, keys: &[&str]) -> LockedShards<'a> {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let mut indices: Vec<usize> = keys.iter().map(|k| self.shard_index(k)).collect();
        indices.sort_unstable();
        indices.dedup();
        let guards = indices
            .into_iter()
            .map(|i| (i, self.shards[i].write()))
            .collect();
        LockedShards {
            keyspace: self,
            guards,
        }
    }

    /// Drops every entry of `map` whose deadline has passed.
    fn purge_expired(&self, map: &mut ShardMap, now: u64) -> u64 {
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired_at(now));
        let purged = (before - map.len()) as u64;
        if purged > 0 {
            self.counters.expired.fetch_add(purged, Ordering::Relaxed);
            trace!(purged, "reclaimed expired keys during scan");
        }
        purged
    }

    pub(super) fn note_write(&self) {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wakeup(&self) {
        self.counters.blocking_wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.counters.blocking_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // ========================================================================
    // Key operations
    // ========================================================================

    /// Checks if a key exists (and is not expired).
    pub fn exists(&self, key: &str) -> bool {
        self.peek(key, |_| ()).is_some()
    }

    /// Counts how many of the given keys exist. Repeats count repeatedly.
    pub fn exists_many(&self, keys: &[&str]) -> u64 {
        keys.iter().filter(|k| self.exists(k)).count() as u64
    }

    /// Deletes a key, or every key matching a glob if the argument contains
    /// `*` or `?`.
    ///
    /// # Returns
    ///
    /// The number of keys removed.
    pub fn delete(&self, key_or_pattern: &str) -> u64 {
        if GlobPattern::is_pattern(key_or_pattern) {
            return self.delete_matching(&GlobPattern::new(key_or_pattern));
        }
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let mut map = self.shard(key_or_pattern).write();
        if self.live(&mut map, key_or_pattern).is_some() {
            map.remove(key_or_pattern);
            1
        } else {
            0
        }
    }

    /// Deletes each listed key literally (no glob expansion).
    pub fn delete_many(&self, keys: &[&str]) -> u64 {
        let mut guards = self.lock_keys(keys);
        let mut deleted = 0;
        for key in keys {
            if let Ok(Some(_)) = guards.take(key) {
                deleted += 1;
            }
        }
        deleted
    }

    fn delete_matching(&self, pattern: &GlobPattern) -> u64 {
        let now = now_ms();
        let mut deleted = 0u64;
        let mut expired = 0u64;

        for shard in &self.shards {
            let mut map = shard.write();
            map.retain(|key, entry| {
                if entry.is_expired_at(now) {
                    expired += 1;
                    false
                } else if pattern.matches(key) {
                    deleted += 1;
                    false
                } else {
                    true
                }
            });
        }

        self.counters.expired.fetch_add(expired, Ordering::Relaxed);
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        debug!(deleted, "pattern delete");
        deleted
    }

    /// The type a key currently holds, or None if absent.
    pub fn key_type(&self, key: &str) -> Option<KeyType> {
        self.peek(key, |entry| entry.value.key_type())
    }

    /// Succeeds if `key` is unset or already holds `wanted`.
    pub fn match_type(&self, key: &str, wanted: KeyType) -> StoreResult<()> {
        match self.key_type(key) {
            Some(kind) if kind != wanted => Err(StoreError::WrongType),
            _ => Ok(()),
        }
    }

    /// Returns all live keys matching a glob pattern. Expired keys met on
    /// the way are reclaimed.
    ///
    /// **Warning**: This scans every shard.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let pattern = GlobPattern::new(pattern);
        let now = now_ms();
        let mut result = Vec::new();

        for shard in &self.shards {
            let mut map = shard.write();
            self.purge_expired(&mut map, now);
            result.extend(map.keys().filter(|key| pattern.matches(key)).cloned());
        }

        result
    }

    /// Sets an absolute deadline (epoch milliseconds) on an existing key.
    /// A deadline at or before now removes the key immediately.
    ///
    /// # Returns
    ///
    /// `true` if the key existed.
    pub fn expire_at(&self, key: &str, deadline_ms: u64) -> bool {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let mut map = self.shard(key).write();
        let Some(entry) = self.live(&mut map, key) else {
            return false;
        };
        if deadline_ms <= now_ms() {
            map.remove(key);
            trace!(key = %key, "deadline in the past, key removed");
        } else {
            entry.expires_at = Some(deadline_ms);
        }
        true
    }

    /// Sets a relative time-to-live on an existing key.
    pub fn expire(&self, key: &str, ttl: Duration) -> bool {
        self.expire_at(key, deadline_after(ttl))
    }

    /// Removes the deadline from a key.
    ///
    /// # Returns
    ///
    /// `true` if a deadline was removed.
    pub fn persist(&self, key: &str) -> bool {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let mut map = self.shard(key).write();
        match self.live(&mut map, key) {
            Some(entry) => entry.expires_at.take().is_some(),
            None => false,
        }
    }

    /// Remaining TTL in seconds.
    ///
    /// # Returns
    ///
    /// - `Some(seconds)` if the key exists and has a deadline
    /// - `Some(-1)` if the key exists without a deadline
    /// - `None` if the key doesn't exist
    pub fn ttl(&self, key: &str) -> Option<i64> {
        self.pttl(key).map(|ms| if ms < 0 { ms } else { ms / 1000 })
    }

    /// Remaining TTL in milliseconds, with the same conventions as [`Keyspace::ttl`].
    pub fn pttl(&self, key: &str) -> Option<i64> {
        self.peek(key, |entry| {
            entry
                .remaining_ms(now_ms())
                .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX))
                .unwrap_or(-1)
        })
    }

    /// Moves the value and deadline of `key` to `new_key`, overwriting
    /// whatever `new_key` held.
    pub fn rename(&self, key: &str, new_key: &str) -> StoreResult<()> {
        self.rename_inner(key, new_key, true).map(|_| ())
    }

    /// Like [`Keyspace::rename`] but only if `new_key` is absent.
    ///
    /// # Returns
    ///
    /// `true` if the rename happened.
    pub fn rename_nx(&self, key: &str, new_key: &str) -> StoreResult<bool> {
        self.rename_inner(key, new_key, false)
    }

    fn rename_inner(&self, key: &str, new_key: &str, overwrite: bool) -> StoreResult<bool> {
        if key == new_key {
            return Err(StoreError::invalid("source and destination keys are the same"));
        }

        let is_list = {
            let mut guards = self.lock_keys(&[key, new_key]);
            if guards.live_type(key)?.is_none() {
                return Err(StoreError::NoSuchKey);
            }
            if !overwrite && guards.live_type(new_key)?.is_some() {
                return Ok(false);
            }
            let Some(entry) = guards.take(key)? else {
                return Err(StoreError::NoSuchKey);
            };
            let is_list = entry.value.key_type() == KeyType::List;
            guards.put(new_key, entry)?;
            is_list
        };

        debug!(from = %key, to = %new_key, "renamed key");
        if is_list {
            self.waiters.wake(new_key);
        }
        Ok(true)
    }

    /// Number of live keys. Expired keys met on the way are reclaimed.
    pub fn dbsize(&self) -> usize {
        let now = now_ms();
        self.shards
            .iter()
            .map(|shard| {
                let mut map = shard.write();
                self.purge_expired(&mut map, now);
                map.len()
            })
            .sum()
    }

    /// Removes every key.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
        info!("keyspace flushed");
    }

    pub fn stats(&self) -> KeyspaceStats {
        KeyspaceStats {
            keys: self.dbsize() as u64,
            reads: self.counters.reads.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            blocking_wakeups: self.counters.blocking_wakeups.load(Ordering::Relaxed),
            blocking_timeouts: self.counters.blocking_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Serializes the value at `key` into an opaque blob.
    pub fn dump(&self, key: &str) -> Option<Bytes> {
        self.peek(key, |entry| entry.value.dump())
    }

    /// Recreates a key from a [`Keyspace::dump`] blob.
    ///
    /// `ttl_ms == 0` means no deadline. Fails with `KeyExists` if the key is
    /// live and `replace` is false, or `Corrupt` if the blob is malformed.
    pub fn restore(&self, key: &str, ttl_ms: u64, blob: &[u8], replace: bool) -> StoreResult<()> {
        let value = TypedValue::restore(blob)?;
        let is_list = value.key_type() == KeyType::List;
        {
            self.counters.writes.fetch_add(1, Ordering::Relaxed);
            let mut map = self.shard(key).write();
            if !replace && self.live(&mut map, key).is_some() {
                return Err(StoreError::KeyExists);
            }
            let mut entry = Entry::new(value);
            if ttl_ms > 0 {
                entry.expires_at = Some(now_ms().saturating_add(ttl_ms));
            }
            if entry.value.is_empty() {
                map.remove(key);
            } else {
                map.insert(key.to_string(), entry);
            }
        }
        if is_list {
            self.waiters.wake(key);
        }
        Ok(())
    }
}

/// Removes `key` if it holds an empty collection.
fn drop_if_empty(map: &mut ShardMap, key: &str) {
    if map.get(key).is_some_and(|e| e.value.is_empty()) {
        map.remove(key);
    }
}

/// Write guards over a sorted, deduplicated set of shards.
///
/// Used by operations that must see several keys atomically. Keys passed to
/// the accessors must be among those given to [`Keyspace::lock_keys`].
pub(crate) struct LockedShards<'a> {
    keyspace: &'a Keyspace,
    guards: Vec<(usize, RwLockWriteGuard<'a, ShardMap>)>,
}

impl LockedShards<'_> {
    fn map(&mut self, key: &str) -> StoreResult<&mut ShardMap> {
        let index = self.keyspace.shard_index(key);
        match self.guards.binary_search_by_key(&index, |(i, _)| *i) {
            Ok(pos) => Ok(&mut *self.guards[pos].1),
            Err(_) => Err(StoreError::invalid(format!(
                "key '{}' is outside the locked shards",
                key
            ))),
        }
    }

    pub(crate) fn live_type(&mut self, key: &str) -> StoreResult<Option<KeyType>> {
        let keyspace = self.keyspace;
        let map = self.map(key)?;
        Ok(keyspace.live(map, key).map(|e| e.value.key_type()))
    }

    pub(crate) fn typed_mut<V: Variant>(&mut self, key: &str) -> StoreResult<Option<&mut V>> {
        let keyspace = self.keyspace;
        let map = self.map(key)?;
        keyspace.typed_mut(map, key)
    }

    pub(crate) fn typed_or_insert<V: Variant>(
        &mut self,
        key: &str,
        init: impl FnOnce() -> StoreResult<V>,
    ) -> StoreResult<&mut V> {
        let keyspace = self.keyspace;
        let map = self.map(key)?;
        keyspace.typed_or_insert(map, key, init)
    }

    /// Removes and returns the live entry at `key`.
    pub(crate) fn take(&mut self, key: &str) -> StoreResult<Option<Entry>> {
        let keyspace = self.keyspace;
        let map = self.map(key)?;
        keyspace.live(map, key);
        Ok(map.remove(key))
    }

    /// Stores `entry` at `key`, replacing anything there. Empty
    /// collections are not stored and clear the key instead.
    pub(crate) fn put(&mut self, key: &str, entry: Entry) -> StoreResult<()> {
        let map = self.map(key)?;
        if entry.value.is_empty() {
            map.remove(key);
        } else {
            map.insert(key.to_string(), entry);
        }
        Ok(())
    }

    pub(crate) fn drop_if_empty(&mut self, key: &str) -> StoreResult<()> {
        drop_if_empty(self.map(key)?, key);
        Ok(())
    }
}
