//! Ordered-Set Engine
//!
//! Key-space surface of [`SortedSet`]: scored members kept in
//! (score, member) order, with rank, score and lexicographic queries.

use crate::error::{StoreError, StoreResult};
use crate::storage::keyspace::{Entry, Keyspace};
use crate::types::range::{LexRange, Limit, ScoreRange};
use crate::types::sorted_set::{Aggregate, SortedSet};
use crate::types::value::TypedValue;
use tracing::debug;

fn names(pairs: Vec<(String, f64)>) -> Vec<String> {
    pairs.into_iter().map(|(member, _)| member).collect()
}

impl Keyspace {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Adds a member or updates its score.
    ///
    /// # Returns
    ///
    /// `true` if the member is new.
    pub fn zadd(&self, key: &str, score: f64, member: &str) -> StoreResult<bool> {
        Ok(self.zadd_many(key, &[(score, member)])? == 1)
    }

    /// Adds several members; returns how many were new. A NaN score rejects
    /// the whole call before anything is written.
    pub fn zadd_many(&self, key: &str, entries: &[(f64, &str)]) -> StoreResult<usize> {
        if entries.is_empty() {
            return Err(StoreError::invalid("at least one member is required"));
        }
        if entries.iter().any(|(score, _)| score.is_nan()) {
            return Err(StoreError::NotAFloat);
        }
        self.upsert(key, || Ok(SortedSet::new()), |zset: &mut SortedSet| {
            let mut added = 0;
            for (score, member) in entries {
                if zset.insert(*member, *score)? {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    /// Adds `delta` to a member's score (absent counts as 0).
    pub fn zincrby(&self, key: &str, delta: f64, member: &str) -> StoreResult<f64> {
        self.upsert(key, || Ok(SortedSet::new()), |zset: &mut SortedSet| {
            zset.increment(member, delta)
        })
    }

    /// Removes members; returns how many existed.
    pub fn zrem(&self, key: &str, members: &[&str]) -> StoreResult<usize> {
        Ok(self
            .update(key, |zset: &mut SortedSet| {
                Ok(members.iter().filter(|m| zset.remove(m)).count())
            })?
            .unwrap_or(0))
    }

    pub fn zremrangebyrank(&self, key: &str, start: i64, stop: i64) -> StoreResult<usize> {
        Ok(self
            .update(key, |zset: &mut SortedSet| {
                Ok(zset.remove_range_by_rank(start, stop))
            })?
            .unwrap_or(0))
    }

    pub fn zremrangebyscore(&self, key: &str, range: &ScoreRange) -> StoreResult<usize> {
        Ok(self
            .update(key, |zset: &mut SortedSet| Ok(zset.remove_range_by_score(range)))?
            .unwrap_or(0))
    }

    pub fn zremrangebylex(&self, key: &str, range: &LexRange) -> StoreResult<usize> {
        Ok(self
            .update(key, |zset: &mut SortedSet| Ok(zset.remove_range_by_lex(range)))?
            .unwrap_or(0))
    }

    // ========================================================================
    // Point queries
    // ========================================================================

    pub fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        Ok(self.view(key, |zset: &SortedSet| zset.score(member))?.flatten())
    }

    pub fn zcard(&self, key: &str) -> StoreResult<usize> {
        Ok(self.view(key, |zset: &SortedSet| zset.len())?.unwrap_or(0))
    }

    /// 0-based position in ascending order.
    pub fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<usize>> {
        Ok(self.view(key, |zset: &SortedSet| zset.rank(member))?.flatten())
    }

    /// 0-based position in descending order; `rank + revrank == len - 1`.
    pub fn zrevrank(&self, key: &str, member: &str) -> StoreResult<Option<usize>> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.rev_rank(member))?
            .flatten())
    }

    // ========================================================================
    // Range queries
    // ========================================================================

    /// Members by rank, `start..=stop`, negative indices from the end.
    pub fn zrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        Ok(names(self.zrange_withscores(key, start, stop)?))
    }

    pub fn zrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<(String, f64)>> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.range_by_rank(start, stop))?
            .unwrap_or_default())
    }

    /// Like [`Keyspace::zrange`] with ranks counted from the highest score.
    pub fn zrevrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        Ok(names(self.zrevrange_withscores(key, start, stop)?))
    }

    pub fn zrevrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<(String, f64)>> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.rev_range_by_rank(start, stop))?
            .unwrap_or_default())
    }

    pub fn zrangebyscore(
        &self,
        key: &str,
        range: &ScoreRange,
        limit: Limit,
    ) -> StoreResult<Vec<String>> {
        Ok(names(self.zrangebyscore_withscores(key, range, limit)?))
    }

    pub fn zrangebyscore_withscores(
        &self,
        key: &str,
        range: &ScoreRange,
        limit: Limit,
    ) -> StoreResult<Vec<(String, f64)>> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.range_by_score(range, limit))?
            .unwrap_or_default())
    }

    /// Members in `range`, highest score first.
    pub fn zrevrangebyscore(
        &self,
        key: &str,
        range: &ScoreRange,
        limit: Limit,
    ) -> StoreResult<Vec<String>> {
        Ok(names(self.zrevrangebyscore_withscores(key, range, limit)?))
    }

    pub fn zrevrangebyscore_withscores(
        &self,
        key: &str,
        range: &ScoreRange,
        limit: Limit,
    ) -> StoreResult<Vec<(String, f64)>> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.rev_range_by_score(range, limit))?
            .unwrap_or_default())
    }

    pub fn zcount(&self, key: &str, range: &ScoreRange) -> StoreResult<usize> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.count_by_score(range))?
            .unwrap_or(0))
    }

    /// Members in a lexicographic range. Only meaningful when every member
    /// shares one score.
    pub fn zrangebylex(&self, key: &str, range: &LexRange, limit: Limit) -> StoreResult<Vec<String>> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.range_by_lex(range, limit))?
            .unwrap_or_default())
    }

    pub fn zrevrangebylex(
        &self,
        key: &str,
        range: &LexRange,
        limit: Limit,
    ) -> StoreResult<Vec<String>> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.rev_range_by_lex(range, limit))?
            .unwrap_or_default())
    }

    pub fn zlexcount(&self, key: &str, range: &LexRange) -> StoreResult<usize> {
        Ok(self
            .view(key, |zset: &SortedSet| zset.count_by_lex(range))?
            .unwrap_or(0))
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    /// Stores at `dest` the weighted intersection of `keys`, replacing
    /// whatever `dest` held. Returns the size of the result.
    pub fn zinterstore(
        &self,
        dest: &str,
        keys: &[&str],
        weights: &[f64],
        aggregate: Aggregate,
    ) -> StoreResult<usize> {
        self.zstore(dest, keys, |inputs| {
            SortedSet::intersect(inputs, weights, aggregate)
        })
    }

    /// Stores at `dest` the weighted union of `keys`.
    pub fn zunionstore(
        &self,
        dest: &str,
        keys: &[&str],
        weights: &[f64],
        aggregate: Aggregate,
    ) -> StoreResult<usize> {
        self.zstore(dest, keys, |inputs| SortedSet::union(inputs, weights, aggregate))
    }

    fn zstore(
        &self,
        dest: &str,
        keys: &[&str],
        combine: impl FnOnce(&[Option<&SortedSet>]) -> StoreResult<SortedSet>,
    ) -> StoreResult<usize> {
        if keys.is_empty() {
            return Err(StoreError::invalid("at least one input key is required"));
        }
        let mut all = Vec::with_capacity(keys.len() + 1);
        all.push(dest);
        all.extend_from_slice(keys);
        let mut guards = self.lock_keys(&all);

        let mut owned = Vec::with_capacity(keys.len());
        for key in keys {
            owned.push(guards.typed_mut::<SortedSet>(key)?.map(|zset| zset.clone()));
        }
        let inputs: Vec<Option<&SortedSet>> = owned.iter().map(Option::as_ref).collect();

        let result = combine(&inputs)?;
        let len = result.len();
        guards.put(dest, Entry::new(TypedValue::SortedSet(result)))?;
        debug!(dest = %dest, inputs = keys.len(), len, "stored ordered-set aggregate");
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::range::{Boundary, RangeSpec};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn numbers(ks: &Keyspace) {
        ks.zadd_many("z", &[(1.0, "one"), (2.0, "two"), (3.0, "three")])
            .unwrap();
    }

    #[test]
    fn test_zrevrange_scenario() {
        let ks = Keyspace::new();
        numbers(&ks);
        assert_eq!(
            ks.zrevrange("z", 0, -1).unwrap(),
            strings(&["three", "two", "one"])
        );
        assert_eq!(ks.zrange("z", 0, 1).unwrap(), strings(&["one", "two"]));
        assert_eq!(
            ks.zrevrange_withscores("z", 0, 0).unwrap(),
            vec![("three".to_string(), 3.0)]
        );
    }

    #[test]
    fn test_zadd_updates_score() {
        let ks = Keyspace::new();
        assert!(ks.zadd("z", 1.0, "a").unwrap());
        assert!(!ks.zadd("z", 5.0, "a").unwrap());
        assert_eq!(ks.zscore("z", "a").unwrap(), Some(5.0));
        assert_eq!(ks.zcard("z").unwrap(), 1);
    }

    #[test]
    fn test_zadd_nan_writes_nothing() {
        let ks = Keyspace::new();
        assert_eq!(
            ks.zadd_many("z", &[(1.0, "a"), (f64::NAN, "b")]),
            Err(StoreError::NotAFloat)
        );
        assert!(!ks.exists("z"));
    }

    #[test]
    fn test_rank_complement() {
        let ks = Keyspace::new();
        ks.zadd_many("z", &[(5.0, "e"), (1.0, "a"), (1.0, "b"), (3.0, "c")])
            .unwrap();
        let len = ks.zcard("z").unwrap();
        for member in ["a", "b", "c", "e"] {
            let rank = ks.zrank("z", member).unwrap().unwrap();
            let rev = ks.zrevrank("z", member).unwrap().unwrap();
            assert_eq!(rank + rev, len - 1);
        }
        // Equal scores order by member bytes
        assert_eq!(ks.zrank("z", "a").unwrap(), Some(0));
        assert_eq!(ks.zrank("z", "b").unwrap(), Some(1));
        assert_eq!(ks.zrank("z", "missing").unwrap(), None);
    }

    #[test]
    fn test_zincrby() {
        let ks = Keyspace::new();
        assert_eq!(ks.zincrby("z", 2.5, "m").unwrap(), 2.5);
        assert_eq!(ks.zincrby("z", -1.0, "m").unwrap(), 1.5);
        ks.zadd("z", f64::INFINITY, "inf").unwrap();
        assert!(matches!(
            ks.zincrby("z", f64::NEG_INFINITY, "inf"),
            Err(StoreError::InvalidArgument(_))
        ));
        assert_eq!(ks.zscore("z", "inf").unwrap(), Some(f64::INFINITY));
    }

    #[test]
    fn test_score_ranges() {
        let ks = Keyspace::new();
        numbers(&ks);
        let range = ScoreRange::parse_score("(1", "3").unwrap();
        assert_eq!(ks.zrangebyscore("z", &range, Limit::default()).unwrap(), strings(&["two", "three"]));
        assert_eq!(
            ks.zrevrangebyscore("z", &range, Limit::default()).unwrap(),
            strings(&["three", "two"])
        );
        assert_eq!(ks.zcount("z", &range).unwrap(), 2);

        let all = ScoreRange::parse_score("-inf", "+inf").unwrap();
        assert_eq!(
            ks.zrangebyscore_withscores("z", &all, Limit::new(1, 1)).unwrap(),
            vec![("two".to_string(), 2.0)]
        );
    }

    #[test]
    fn test_lex_range_scenario() {
        let ks = Keyspace::new();
        let members = ["a", "b", "c", "d", "e", "f", "g"];
        let entries: Vec<(f64, &str)> = members.iter().map(|m| (0.0, *m)).collect();
        ks.zadd_many("lex", &entries).unwrap();

        let range = LexRange::parse_lex("[b", "(f").unwrap();
        assert_eq!(
            ks.zrangebylex("lex", &range, Limit::default()).unwrap(),
            strings(&["b", "c", "d", "e"])
        );
        assert_eq!(
            ks.zrevrangebylex("lex", &range, Limit::default()).unwrap(),
            strings(&["e", "d", "c", "b"])
        );
        assert_eq!(ks.zlexcount("lex", &RangeSpec::all()).unwrap(), 7);
        assert_eq!(
            ks.zlexcount(
                "lex",
                &RangeSpec::new(Boundary::NegInf, Boundary::Inclusive("c".to_string()))
            )
            .unwrap(),
            3
        );
    }

    #[test]
    fn test_remove_ranges() {
        let ks = Keyspace::new();
        numbers(&ks);
        assert_eq!(ks.zrem("z", &["one", "nope"]).unwrap(), 1);
        assert_eq!(ks.zremrangebyscore("z", &ScoreRange::parse_score("2", "2").unwrap()).unwrap(), 1);
        assert_eq!(ks.zremrangebyrank("z", 0, -1).unwrap(), 1);
        assert!(!ks.exists("z"));

        ks.zadd_many("l", &[(0.0, "a"), (0.0, "b"), (0.0, "c")]).unwrap();
        assert_eq!(
            ks.zremrangebylex("l", &LexRange::parse_lex("-", "[b").unwrap())
                .unwrap(),
            2
        );
        assert_eq!(ks.zrange("l", 0, -1).unwrap(), strings(&["c"]));
    }

    #[test]
    fn test_zunionstore_weights_and_aggregate() {
        let ks = Keyspace::new();
        ks.zadd_many("a", &[(1.0, "x"), (2.0, "y")]).unwrap();
        ks.zadd_many("b", &[(10.0, "y"), (20.0, "z")]).unwrap();

        assert_eq!(
            ks.zunionstore("out", &["a", "b"], &[2.0, 1.0], Aggregate::Sum)
                .unwrap(),
            3
        );
        assert_eq!(
            ks.zrange_withscores("out", 0, -1).unwrap(),
            vec![
                ("x".to_string(), 2.0),
                ("y".to_string(), 14.0),
                ("z".to_string(), 20.0)
            ]
        );

        ks.zunionstore("out", &["a", "b", "missing"], &[], Aggregate::Min)
            .unwrap();
        assert_eq!(ks.zscore("out", "y").unwrap(), Some(2.0));
    }

    #[test]
    fn test_zinterstore() {
        let ks = Keyspace::new();
        ks.zadd_many("a", &[(1.0, "x"), (2.0, "y")]).unwrap();
        ks.zadd_many("b", &[(10.0, "y"), (20.0, "z")]).unwrap();

        assert_eq!(
            ks.zinterstore("out", &["a", "b"], &[], Aggregate::Max).unwrap(),
            1
        );
        assert_eq!(ks.zscore("out", "y").unwrap(), Some(10.0));

        // A missing input empties the result and clears the destination
        assert_eq!(
            ks.zinterstore("out", &["a", "missing"], &[], Aggregate::Sum)
                .unwrap(),
            0
        );
        assert!(!ks.exists("out"));
    }

    #[test]
    fn test_aggregate_errors() {
        let ks = Keyspace::new();
        ks.zadd("a", 1.0, "x").unwrap();
        ks.set("s", bytes::Bytes::from("v")).unwrap();
        assert!(matches!(
            ks.zunionstore("out", &["a"], &[1.0, 2.0], Aggregate::Sum),
            Err(StoreError::InvalidArgument(_))
        ));
        assert_eq!(
            ks.zunionstore("out", &["a", "s"], &[], Aggregate::Sum),
            Err(StoreError::WrongType)
        );
        assert!(!ks.exists("out"));
    }
}
