//! String Engine
//!
//! Binary-safe string values plus the integer and float counters built on
//! top of them. Writing a string over a key of another type is rejected
//! with `WrongType`; use `delete` first to change a key's type.

use crate::error::{StoreError, StoreResult};
use crate::storage::keyspace::{deadline_after, Entry, Keyspace};
use crate::types::value::{TypedValue, Variant};
use bytes::Bytes;
use std::time::Duration;

pub(super) fn parse_int(value: &[u8]) -> StoreResult<i64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(StoreError::NotAnInteger)
}

pub(super) fn parse_float(value: &[u8]) -> StoreResult<f64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|f| !f.is_nan())
        .ok_or(StoreError::NotAFloat)
}

impl Keyspace {
    /// Stores a string, dropping any previous deadline.
    ///
    /// # Returns
    ///
    /// `Ok(false)` only when `only_if_absent` is set and the key exists.
    fn store_string(
        &self,
        key: &str,
        value: Bytes,
        expires_at: Option<u64>,
        only_if_absent: bool,
    ) -> StoreResult<bool> {
        self.note_write();
        let mut map = self.shard(key).write();
        match self.live(&mut map, key) {
            Some(_) if only_if_absent => return Ok(false),
            Some(entry) => {
                Bytes::expect_ref(&entry.value)?;
            }
            None => {}
        }
        map.insert(
            key.to_string(),
            Entry {
                value: TypedValue::String(value),
                expires_at,
            },
        );
        Ok(true)
    }

    /// Sets a string value, clearing any deadline.
    pub fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.store_string(key, value, None, false).map(|_| ())
    }

    /// Sets a string value that expires after `ttl`.
    pub fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> StoreResult<()> {
        if ttl.is_zero() {
            return Err(StoreError::invalid("invalid expire time"));
        }
        let deadline = deadline_after(ttl);
        self.store_string(key, value, Some(deadline), false)
            .map(|_| ())
    }

    /// Sets the value only if the key does not exist.
    pub fn setnx(&self, key: &str, value: Bytes) -> StoreResult<bool> {
        self.store_string(key, value, None, true)
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.view(key, |value: &Bytes| value.clone())
    }

    /// Sets a new value and returns the old one.
    pub fn getset(&self, key: &str, value: Bytes) -> StoreResult<Option<Bytes>> {
        self.note_write();
        let mut map = self.shard(key).write();
        let old = match self.live(&mut map, key) {
            Some(entry) => Some(Bytes::expect_ref(&entry.value)?.clone()),
            None => None,
        };
        map.insert(key.to_string(), Entry::new(TypedValue::String(value)));
        Ok(old)
    }

    /// Returns the value and deletes the key.
    pub fn getdel(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.note_write();
        let mut map = self.shard(key).write();
        let value = match self.live(&mut map, key) {
            Some(entry) => Bytes::expect_ref(&entry.value)?.clone(),
            None => return Ok(None),
        };
        map.remove(key);
        Ok(Some(value))
    }

    /// Sets several strings at once. Either every pair is written or, if any
    /// target holds another type, none is.
    pub fn mset(&self, pairs: &[(&str, Bytes)]) -> StoreResult<()> {
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
        let mut guards = self.lock_keys(&keys);
        for key in &keys {
            guards.typed_mut::<Bytes>(key)?;
        }
        for (key, value) in pairs {
            guards.put(key, Entry::new(TypedValue::String(value.clone())))?;
        }
        Ok(())
    }

    /// Gets several strings. Missing keys and keys of other types read as None.
    pub fn mget(&self, keys: &[&str]) -> Vec<Option<Bytes>> {
        keys.iter()
            .map(|key| self.get(key).ok().flatten())
            .collect()
    }

    pub fn incr(&self, key: &str) -> StoreResult<i64> {
        self.incr_by(key, 1)
    }

    /// Adds `delta` to the integer stored at `key` (absent counts as 0).
    pub fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.upsert(
            key,
            || Ok(Bytes::from_static(b"0")),
            |value: &mut Bytes| {
                let next = parse_int(value)?
                    .checked_add(delta)
                    .ok_or(StoreError::Overflow)?;
                *value = Bytes::from(next.to_string());
                Ok(next)
            },
        )
    }

    pub fn decr(&self, key: &str) -> StoreResult<i64> {
        self.decr_by(key, 1)
    }

    pub fn decr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.incr_by(key, delta.checked_neg().ok_or(StoreError::Overflow)?)
    }

    /// Adds a float increment. Results that are not finite are rejected.
    pub fn incr_by_float(&self, key: &str, delta: f64) -> StoreResult<f64> {
        if !delta.is_finite() {
            return Err(StoreError::NotAFloat);
        }
        self.upsert(
            key,
            || Ok(Bytes::from_static(b"0")),
            |value: &mut Bytes| {
                let next = parse_float(value)? + delta;
                if !next.is_finite() {
                    return Err(StoreError::invalid("increment would produce NaN or Infinity"));
                }
                *value = Bytes::from(next.to_string());
                Ok(next)
            },
        )
    }

    /// Appends to a string, creating it if needed.
    ///
    /// # Returns
    ///
    /// The length of the string after the append.
    pub fn append(&self, key: &str, suffix: Bytes) -> StoreResult<usize> {
        self.upsert(
            key,
            || Ok(Bytes::new()),
            |value: &mut Bytes| {
                let mut joined = Vec::with_capacity(value.len() + suffix.len());
                joined.extend_from_slice(value);
                joined.extend_from_slice(&suffix);
                *value = Bytes::from(joined);
                Ok(value.len())
            },
        )
    }

    pub fn strlen(&self, key: &str) -> StoreResult<usize> {
        Ok(self.view(key, |value: &Bytes| value.len())?.unwrap_or(0))
    }
}
