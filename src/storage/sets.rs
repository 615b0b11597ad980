//! Set Engine
//!
//! Unordered collections of unique binary members, plus the multi-key
//! algebra (intersection, union, difference). Multi-key operations lock
//! every involved shard up front so they observe one consistent state.

use crate::error::StoreResult;
use crate::storage::keyspace::{Entry, Keyspace, LockedShards};
use crate::types::value::TypedValue;
use bytes::Bytes;
use rand::seq::{IteratorRandom, SliceRandom};
use std::collections::HashSet;

type Set = HashSet<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Inter,
    Union,
    Diff,
}

/// Folds the sets at `keys` with `op`. Every key is type-checked before
/// any result is computed.
fn combine(guards: &mut LockedShards<'_>, keys: &[&str], op: SetOp) -> StoreResult<Set> {
    for key in keys {
        guards.typed_mut::<Set>(key)?;
    }

    let Some((first, rest)) = keys.split_first() else {
        return Ok(Set::new());
    };
    let mut result = guards
        .typed_mut::<Set>(first)?
        .map(|set| set.clone())
        .unwrap_or_default();

    for key in rest {
        let other = guards.typed_mut::<Set>(key)?;
        match (op, other) {
            (SetOp::Inter, Some(other)) => result.retain(|m| other.contains(m)),
            (SetOp::Inter, None) => result.clear(),
            (SetOp::Union, Some(other)) => result.extend(other.iter().cloned()),
            (SetOp::Diff, Some(other)) => result.retain(|m| !other.contains(m)),
            (SetOp::Union | SetOp::Diff, None) => {}
        }
        if op == SetOp::Inter && result.is_empty() {
            break;
        }
    }

    Ok(result)
}

impl Keyspace {
    /// Adds members, creating the set if needed.
    ///
    /// # Returns
    ///
    /// How many members were not already present.
    pub fn sadd(&self, key: &str, members: Vec<Bytes>) -> StoreResult<usize> {
        self.upsert(key, || Ok(Set::new()), |set: &mut Set| {
            Ok(members.into_iter().filter(|m| set.insert(m.clone())).count())
        })
    }

    /// Removes members; returns how many were present.
    pub fn srem(&self, key: &str, members: &[Bytes]) -> StoreResult<usize> {
        Ok(self
            .update(key, |set: &mut Set| {
                Ok(members.iter().filter(|m| set.remove(*m)).count())
            })?
            .unwrap_or(0))
    }

    pub fn smembers(&self, key: &str) -> StoreResult<Vec<Bytes>> {
        Ok(self
            .view(key, |set: &Set| set.iter().cloned().collect())?
            .unwrap_or_default())
    }

    pub fn sismember(&self, key: &str, member: &[u8]) -> StoreResult<bool> {
        Ok(self.view(key, |set: &Set| set.contains(member))?.unwrap_or(false))
    }

    pub fn scard(&self, key: &str) -> StoreResult<usize> {
        Ok(self.view(key, |set: &Set| set.len())?.unwrap_or(0))
    }

    /// Removes and returns one random member.
    pub fn spop(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.spop_many(key, 1)?.pop())
    }

    /// Removes and returns up to `count` random members.
    pub fn spop_many(&self, key: &str, count: usize) -> StoreResult<Vec<Bytes>> {
        Ok(self
            .update(key, |set: &mut Set| {
                let mut rng = rand::thread_rng();
                let count = count.min(set.len());
                let picked: Vec<Bytes> =
                    set.iter().cloned().choose_multiple(&mut rng, count);
                for member in &picked {
                    set.remove(member);
                }
                Ok(picked)
            })?
            .unwrap_or_default())
    }

    /// Random members without removal.
    ///
    /// A positive `count` returns up to `count` distinct members. A negative
    /// `count` returns exactly `|count|` members drawn with replacement, so
    /// repeats are possible.
    pub fn srandmember(&self, key: &str, count: i64) -> StoreResult<Vec<Bytes>> {
        Ok(self
            .view(key, |set: &Set| {
                let mut rng = rand::thread_rng();
                if count >= 0 {
                    let count = usize::try_from(count).unwrap_or(usize::MAX).min(set.len());
                    set.iter().cloned().choose_multiple(&mut rng, count)
                } else {
                    let members: Vec<&Bytes> = set.iter().collect();
                    let mut picked = Vec::new();
                    for _ in 0..count.unsigned_abs() {
                        let Some(member) = members.choose(&mut rng) else {
                            break;
                        };
                        picked.push((*member).clone());
                    }
                    picked
                }
            })?
            .unwrap_or_default())
    }

    /// Moves `member` from `src` to `dst` atomically.
    ///
    /// # Returns
    ///
    /// `false` if `src` is absent or lacks the member.
    pub fn smove(&self, src: &str, dst: &str, member: &[u8]) -> StoreResult<bool> {
        let mut guards = self.lock_keys(&[src, dst]);
        guards.typed_mut::<Set>(dst)?;

        let Some(set) = guards.typed_mut::<Set>(src)? else {
            return Ok(false);
        };
        if !set.remove(member) {
            return Ok(false);
        }
        guards.drop_if_empty(src)?;
        guards
            .typed_or_insert(dst, || Ok(Set::new()))?
            .insert(Bytes::copy_from_slice(member));
        Ok(true)
    }

    fn set_algebra(&self, keys: &[&str], op: SetOp) -> StoreResult<Vec<Bytes>> {
        let mut guards = self.lock_keys(keys);
        Ok(combine(&mut guards, keys, op)?.into_iter().collect())
    }

    fn set_algebra_store(&self, dest: &str, keys: &[&str], op: SetOp) -> StoreResult<usize> {
        let mut all = Vec::with_capacity(keys.len() + 1);
        all.push(dest);
        all.extend_from_slice(keys);

        let mut guards = self.lock_keys(&all);
        let result = combine(&mut guards, keys, op)?;
        let len = result.len();
        guards.put(dest, Entry::new(TypedValue::Set(result)))?;
        Ok(len)
    }

    /// Members present in every set. An absent key empties the result.
    pub fn sinter(&self, keys: &[&str]) -> StoreResult<Vec<Bytes>> {
        self.set_algebra(keys, SetOp::Inter)
    }

    pub fn sunion(&self, keys: &[&str]) -> StoreResult<Vec<Bytes>> {
        self.set_algebra(keys, SetOp::Union)
    }

    /// Members of the first set absent from all the others.
    pub fn sdiff(&self, keys: &[&str]) -> StoreResult<Vec<Bytes>> {
        self.set_algebra(keys, SetOp::Diff)
    }

    /// Stores the intersection at `dest`, replacing it; returns its size.
    pub fn sinterstore(&self, dest: &str, keys: &[&str]) -> StoreResult<usize> {
        self.set_algebra_store(dest, keys, SetOp::Inter)
    }

    pub fn sunionstore(&self, dest: &str, keys: &[&str]) -> StoreResult<usize> {
        self.set_algebra_store(dest, keys, SetOp::Union)
    }

    pub fn sdiffstore(&self, dest: &str, keys: &[&str]) -> StoreResult<usize> {
        self.set_algebra_store(dest, keys, SetOp::Diff)
    }
}
