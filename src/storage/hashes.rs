//! Hash Engine
//!
//! Field/value maps stored under a single key.

use super::strings::{parse_float, parse_int};
use crate::error::{StoreError, StoreResult};
use crate::storage::keyspace::Keyspace;
use bytes::Bytes;
use std::collections::HashMap;

type Hash = HashMap<Bytes, Bytes>;

impl Keyspace {
    /// Sets one field.
    ///
    /// # Returns
    ///
    /// `true` if the field is new, `false` if an existing value was replaced.
    pub fn hset(&self, key: &str, field: Bytes, value: Bytes) -> StoreResult<bool> {
        Ok(self.hset_many(key, vec![(field, value)])? == 1)
    }

    /// Sets several fields; returns how many were new.
    pub fn hset_many(&self, key: &str, pairs: Vec<(Bytes, Bytes)>) -> StoreResult<usize> {
        if pairs.is_empty() {
            return Err(StoreError::invalid("at least one field is required"));
        }
        self.upsert(key, || Ok(Hash::new()), |hash: &mut Hash| {
            Ok(pairs
                .into_iter()
                .filter(|(field, value)| hash.insert(field.clone(), value.clone()).is_none())
                .count())
        })
    }

    /// Sets a field only if it does not exist yet.
    pub fn hsetnx(&self, key: &str, field: Bytes, value: Bytes) -> StoreResult<bool> {
        self.upsert(key, || Ok(Hash::new()), |hash: &mut Hash| {
            if hash.contains_key(&field) {
                return Ok(false);
            }
            hash.insert(field, value);
            Ok(true)
        })
    }

    pub fn hget(&self, key: &str, field: &[u8]) -> StoreResult<Option<Bytes>> {
        Ok(self
            .view(key, |hash: &Hash| hash.get(field).cloned())?
            .flatten())
    }

    pub fn hmget(&self, key: &str, fields: &[Bytes]) -> StoreResult<Vec<Option<Bytes>>> {
        Ok(self
            .view(key, |hash: &Hash| {
                fields.iter().map(|f| hash.get(f).cloned()).collect()
            })?
            .unwrap_or_else(|| vec![None; fields.len()]))
    }

    /// Removes fields; returns how many existed.
    pub fn hdel(&self, key: &str, fields: &[Bytes]) -> StoreResult<usize> {
        Ok(self
            .update(key, |hash: &mut Hash| {
                Ok(fields.iter().filter(|f| hash.remove(*f).is_some()).count())
            })?
            .unwrap_or(0))
    }

    pub fn hexists(&self, key: &str, field: &[u8]) -> StoreResult<bool> {
        Ok(self
            .view(key, |hash: &Hash| hash.contains_key(field))?
            .unwrap_or(false))
    }

    pub fn hlen(&self, key: &str) -> StoreResult<usize> {
        Ok(self.view(key, |hash: &Hash| hash.len())?.unwrap_or(0))
    }

    pub fn hkeys(&self, key: &str) -> StoreResult<Vec<Bytes>> {
        Ok(self
            .view(key, |hash: &Hash| hash.keys().cloned().collect())?
            .unwrap_or_default())
    }

    pub fn hvals(&self, key: &str) -> StoreResult<Vec<Bytes>> {
        Ok(self
            .view(key, |hash: &Hash| hash.values().cloned().collect())?
            .unwrap_or_default())
    }

    pub fn hgetall(&self, key: &str) -> StoreResult<Vec<(Bytes, Bytes)>> {
        Ok(self
            .view(key, |hash: &Hash| {
                hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect()
            })?
            .unwrap_or_default())
    }

    /// Adds `delta` to an integer field (absent counts as 0).
    pub fn hincrby(&self, key: &str, field: Bytes, delta: i64) -> StoreResult<i64> {
        self.upsert(key, || Ok(Hash::new()), |hash: &mut Hash| {
            let current = match hash.get(&field) {
                Some(value) => parse_int(value)?,
                None => 0,
            };
            let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;
            hash.insert(field, Bytes::from(next.to_string()));
            Ok(next)
        })
    }

    /// Adds a float increment to a field.
    pub fn hincrbyfloat(&self, key: &str, field: Bytes, delta: f64) -> StoreResult<f64> {
        if !delta.is_finite() {
            return Err(StoreError::NotAFloat);
        }
        self.upsert(key, || Ok(Hash::new()), |hash: &mut Hash| {
            let current = match hash.get(&field) {
                Some(value) => parse_float(value)?,
                None => 0.0,
            };
            let next = current + delta;
            if !next.is_finite() {
                return Err(StoreError::invalid("increment would produce NaN or Infinity"));
            }
            hash.insert(field, Bytes::from(next.to_string()));
            Ok(next)
        })
    }

    /// Length of a field's value, 0 if missing.
    pub fn hstrlen(&self, key: &str, field: &[u8]) -> StoreResult<usize> {
        Ok(self
            .view(key, |hash: &Hash| hash.get(field).map_or(0, |v| v.len()))?
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_hset_hget() {
        let ks = Keyspace::new();
        assert!(ks.hset("user:1", b("name"), b("Ariz")).unwrap());
        assert!(!ks.hset("user:1", b("name"), b("Zira")).unwrap());
        assert_eq!(ks.hget("user:1", b"name").unwrap(), Some(b("Zira")));
        assert_eq!(ks.hget("user:1", b"age").unwrap(), None);
        assert_eq!(ks.hget("missing", b"name").unwrap(), None);
    }

    #[test]
    fn test_hset_many_and_listing() {
        let ks = Keyspace::new();
        let added = ks
            .hset_many("h", vec![(b("a"), b("1")), (b("b"), b("2")), (b("a"), b("3"))])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(ks.hlen("h").unwrap(), 2);

        let mut keys = ks.hkeys("h").unwrap();
        keys.sort();
        assert_eq!(keys, vec![b("a"), b("b")]);

        let mut vals = ks.hvals("h").unwrap();
        vals.sort();
        assert_eq!(vals, vec![b("2"), b("3")]);

        let mut all = ks.hgetall("h").unwrap();
        all.sort();
        assert_eq!(all, vec![(b("a"), b("3")), (b("b"), b("2"))]);

        assert!(ks.hset_many("h", vec![]).is_err());
    }

    #[test]
    fn test_hsetnx() {
        let ks = Keyspace::new();
        assert!(ks.hsetnx("h", b("f"), b("1")).unwrap());
        assert!(!ks.hsetnx("h", b("f"), b("2")).unwrap());
        assert_eq!(ks.hget("h", b"f").unwrap(), Some(b("1")));
    }

    #[test]
    fn test_hmget() {
        let ks = Keyspace::new();
        ks.hset("h", b("a"), b("1")).unwrap();
        assert_eq!(
            ks.hmget("h", &[b("a"), b("x")]).unwrap(),
            vec![Some(b("1")), None]
        );
        assert_eq!(ks.hmget("missing", &[b("a")]).unwrap(), vec![None]);
    }

    #[test]
    fn test_hdel_and_hexists() {
        let ks = Keyspace::new();
        ks.hset_many("h", vec![(b("a"), b("1")), (b("b"), b("2"))])
            .unwrap();
        assert!(ks.hexists("h", b"a").unwrap());
        assert_eq!(ks.hdel("h", &[b("a"), b("zz")]).unwrap(), 1);
        assert!(!ks.hexists("h", b"a").unwrap());
        assert_eq!(ks.hdel("h", &[b("b")]).unwrap(), 1);
        assert!(!ks.exists("h"));
    }

    #[test]
    fn test_hincrby() {
        let ks = Keyspace::new();
        assert_eq!(ks.hincrby("h", b("n"), 5).unwrap(), 5);
        assert_eq!(ks.hincrby("h", b("n"), -8).unwrap(), -3);
        ks.hset("h", b("s"), b("abc")).unwrap();
        assert_eq!(ks.hincrby("h", b("s"), 1), Err(StoreError::NotAnInteger));
        ks.hset("h", b("max"), b(&i64::MAX.to_string())).unwrap();
        assert_eq!(ks.hincrby("h", b("max"), 1), Err(StoreError::Overflow));
    }

    #[test]
    fn test_hincrby_on_new_key_failure_leaves_nothing() {
        let ks = Keyspace::new();
        assert!(ks.hincrbyfloat("fresh", b("f"), f64::NAN).is_err());
        assert!(!ks.exists("fresh"));
    }

    #[test]
    fn test_hincrbyfloat_and_hstrlen() {
        let ks = Keyspace::new();
        assert_eq!(ks.hincrbyfloat("h", b("f"), 1.5).unwrap(), 1.5);
        assert_eq!(ks.hincrbyfloat("h", b("f"), 1.0).unwrap(), 2.5);
        assert_eq!(ks.hget("h", b"f").unwrap(), Some(b("2.5")));
        assert_eq!(ks.hstrlen("h", b"f").unwrap(), 3);
        assert_eq!(ks.hstrlen("h", b"none").unwrap(), 0);
    }
}
