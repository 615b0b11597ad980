//! Cardinality Engine
//!
//! Key-space surface of [`HyperLogLog`]. New keys use the precision from
//! `StoreConfig::hll_precision`.

use crate::error::{StoreError, StoreResult};
use crate::storage::keyspace::{Keyspace, LockedShards};
use crate::types::hyperloglog::HyperLogLog;
use bytes::Bytes;
use tracing::debug;

/// Register-wise union of the estimators at `keys`. Absent keys contribute
/// nothing; `None` if every key is absent.
fn union_of(guards: &mut LockedShards<'_>, keys: &[&str]) -> StoreResult<Option<HyperLogLog>> {
    let mut acc: Option<HyperLogLog> = None;
    for key in keys {
        let Some(hll) = guards.typed_mut::<HyperLogLog>(key)? else {
            continue;
        };
        acc = Some(match acc.take() {
            Some(mut merged) => {
                merged.merge_from(hll)?;
                merged
            }
            None => hll.clone(),
        });
    }
    Ok(acc)
}

impl Keyspace {
    /// Offers elements to the estimator at `key`, creating it if needed.
    ///
    /// # Returns
    ///
    /// `true` if the key was created or any register changed.
    pub fn pfadd(&self, key: &str, elements: &[Bytes]) -> StoreResult<bool> {
        let precision = self.config().hll_precision;
        let mut guards = self.lock_keys(&[key]);
        let created = guards.live_type(key)?.is_none();
        let hll = guards.typed_or_insert(key, || HyperLogLog::new(precision))?;

        let mut changed = false;
        for element in elements {
            changed |= hll.offer(element);
        }
        Ok(created || changed)
    }

    /// Approximate number of distinct elements across `keys`.
    pub fn pfcount(&self, keys: &[&str]) -> StoreResult<u64> {
        match keys {
            [] => Err(StoreError::invalid("at least one key is required")),
            [key] => Ok(self
                .view(key, |hll: &HyperLogLog| hll.cardinality())?
                .unwrap_or(0)),
            _ => {
                let mut guards = self.lock_keys(keys);
                Ok(union_of(&mut guards, keys)?.map_or(0, |hll| hll.cardinality()))
            }
        }
    }

    /// Merges `sources` into `dest`, creating `dest` if needed.
    pub fn pfmerge(&self, dest: &str, sources: &[&str]) -> StoreResult<()> {
        let mut all = Vec::with_capacity(sources.len() + 1);
        all.push(dest);
        all.extend_from_slice(sources);
        let mut guards = self.lock_keys(&all);

        guards.typed_mut::<HyperLogLog>(dest)?;
        let union = union_of(&mut guards, sources)?;

        let precision = union
            .as_ref()
            .map_or(self.config().hll_precision, |hll| hll.precision());
        let target = guards.typed_or_insert(dest, || HyperLogLog::new(precision))?;
        if let Some(union) = &union {
            target.merge_from(union)?;
        }
        debug!(dest = %dest, sources = sources.len(), "merged cardinality estimators");
        Ok(())
    }
}
