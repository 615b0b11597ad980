//! Sorted Set
//!
//! Every member carries a score. Members are kept in a total order: score
//! ascending, ties broken by member bytes ascending, so ranks are exactly
//! reproducible and never depend on hashing.
//!
//! ## Layout
//!
//! ```text
//!   scores:  HashMap<member, score>                 O(1) ZSCORE
//!   order:   BTreeSet<(OrderedFloat(score), member)> ordered walks
//! ```
//!
//! Both structures always hold the same members; every mutation goes through
//! [`SortedSet::insert`] / [`SortedSet::remove`] to keep them in step.

use crate::error::{StoreError, StoreResult};
use crate::types::range::{clamp_window, LexRange, Limit, ScoreRange};
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap};

/// Aggregation applied by ZINTERSTORE / ZUNIONSTORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn combine(self, acc: f64, value: f64) -> f64 {
        match self {
            Aggregate::Sum => nan_to_zero(acc + value),
            Aggregate::Min => acc.min(value),
            Aggregate::Max => acc.max(value),
        }
    }
}

/// `inf + -inf` and `0 * inf` are defined as 0 for aggregation purposes.
fn nan_to_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<String, f64>,
    order: BTreeSet<(OrderedFloat<f64>, String)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Adds or re-scores `member`. Returns `true` if the member is new.
    pub fn insert(&mut self, member: impl Into<String>, score: f64) -> StoreResult<bool> {
        if score.is_nan() {
            return Err(StoreError::NotAFloat);
        }
        let member = member.into();
        match self.scores.insert(member.clone(), score) {
            Some(old) => {
                self.order.remove(&(OrderedFloat(old), member.clone()));
                self.order.insert((OrderedFloat(score), member));
                Ok(false)
            }
            None => {
                self.order.insert((OrderedFloat(score), member));
                Ok(true)
            }
        }
    }

    /// Adds `delta` to the member's score (missing members start at 0).
    pub fn increment(&mut self, member: &str, delta: f64) -> StoreResult<f64> {
        let current = self.scores.get(member).copied().unwrap_or(0.0);
        let next = current + delta;
        if next.is_nan() {
            return Err(StoreError::invalid("resulting score is not a number (NaN)"));
        }
        self.insert(member, next)?;
        Ok(next)
    }

    pub fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.order.remove(&(OrderedFloat(score), member.to_string()));
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// 0-based position in ascending order.
    pub fn rank(&self, member: &str) -> Option<usize> {
        let score = self.scores.get(member)?;
        let key = (OrderedFloat(*score), member.to_string());
        Some(self.order.range(..key).count())
    }

    /// 0-based position in descending order.
    pub fn rev_rank(&self, member: &str) -> Option<usize> {
        self.rank(member).map(|rank| self.len() - 1 - rank)
    }

    /// Ascending iterator over `(member, score)`.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, f64)> {
        self.order.iter().map(|(s, m)| (m.as_str(), s.0))
    }

    /// Members between ranks `start` and `stop` (inclusive) in ascending order.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<(String, f64)> {
        match clamp_window(start, stop, self.len()) {
            Some((start, stop)) => self
                .iter()
                .skip(start)
                .take(stop - start + 1)
                .map(|(m, s)| (m.to_string(), s))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Same as [`range_by_rank`](Self::range_by_rank) with ranks counted from the highest score.
    pub fn rev_range_by_rank(&self, start: i64, stop: i64) -> Vec<(String, f64)> {
        match clamp_window(start, stop, self.len()) {
            Some((start, stop)) => self
                .iter()
                .rev()
                .skip(start)
                .take(stop - start + 1)
                .map(|(m, s)| (m.to_string(), s))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn range_by_score(&self, range: &ScoreRange, limit: Limit) -> Vec<(String, f64)> {
        let matching = self.iter().filter(|(_, s)| range.contains(s));
        limit
            .apply(matching)
            .map(|(m, s)| (m.to_string(), s))
            .collect()
    }

    pub fn rev_range_by_score(&self, range: &ScoreRange, limit: Limit) -> Vec<(String, f64)> {
        let matching = self.iter().rev().filter(|(_, s)| range.contains(s));
        limit
            .apply(matching)
            .map(|(m, s)| (m.to_string(), s))
            .collect()
    }

    pub fn count_by_score(&self, range: &ScoreRange) -> usize {
        self.iter().filter(|(_, s)| range.contains(s)).count()
    }

    fn lex_matches<'a>(range: &'a LexRange) -> impl Fn(&(&str, f64)) -> bool + 'a {
        move |entry: &(&str, f64)| range.contains(entry.0)
    }

    pub fn range_by_lex(&self, range: &LexRange, limit: Limit) -> Vec<String> {
        let matching = self.iter().filter(Self::lex_matches(range));
        limit.apply(matching).map(|(m, _)| m.to_string()).collect()
    }

    pub fn rev_range_by_lex(&self, range: &LexRange, limit: Limit) -> Vec<String> {
        let matching = self.iter().rev().filter(Self::lex_matches(range));
        limit.apply(matching).map(|(m, _)| m.to_string()).collect()
    }

    pub fn count_by_lex(&self, range: &LexRange) -> usize {
        self.iter().filter(Self::lex_matches(range)).count()
    }

    fn remove_all(&mut self, doomed: Vec<String>) -> usize {
        let removed = doomed.len();
        for member in doomed {
            self.remove(&member);
        }
        removed
    }

    pub fn remove_range_by_rank(&mut self, start: i64, stop: i64) -> usize {
        let doomed = self
            .range_by_rank(start, stop)
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        self.remove_all(doomed)
    }

    pub fn remove_range_by_score(&mut self, range: &ScoreRange) -> usize {
        let doomed = self
            .range_by_score(range, Limit::default())
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        self.remove_all(doomed)
    }

    pub fn remove_range_by_lex(&mut self, range: &LexRange) -> usize {
        let doomed = self.range_by_lex(range, Limit::default());
        self.remove_all(doomed)
    }

    /// Weighted intersection: members present in every input.
    pub fn intersect(
        inputs: &[Option<&SortedSet>],
        weights: &[f64],
        aggregate: Aggregate,
    ) -> StoreResult<SortedSet> {
        let weights = resolve_weights(inputs.len(), weights)?;
        let mut out = SortedSet::new();

        // Any missing input makes the intersection empty
        let present: Option<Vec<&SortedSet>> = inputs.iter().copied().collect();
        let Some(sets) = present else {
            return Ok(out);
        };
        let Some((first, rest)) = sets.split_first() else {
            return Ok(out);
        };

        'members: for (member, score) in first.iter() {
            let mut acc = weighted(score, weights[0]);
            for (i, set) in rest.iter().enumerate() {
                match set.score(member) {
                    Some(other) => acc = aggregate.combine(acc, weighted(other, weights[i + 1])),
                    None => continue 'members,
                }
            }
            out.insert(member, acc)?;
        }
        Ok(out)
    }

    /// Weighted union: members present in any input.
    pub fn union(
        inputs: &[Option<&SortedSet>],
        weights: &[f64],
        aggregate: Aggregate,
    ) -> StoreResult<SortedSet> {
        let weights = resolve_weights(inputs.len(), weights)?;
        let mut acc: HashMap<&str, f64> = HashMap::new();

        for (set, weight) in inputs.iter().zip(&weights) {
            let Some(set) = set else { continue };
            for (member, score) in set.iter() {
                let value = weighted(score, *weight);
                acc.entry(member)
                    .and_modify(|current| *current = aggregate.combine(*current, value))
                    .or_insert(value);
            }
        }

        let mut out = SortedSet::new();
        for (member, score) in acc {
            out.insert(member, score)?;
        }
        Ok(out)
    }
}

fn weighted(score: f64, weight: f64) -> f64 {
    nan_to_zero(score * weight)
}

fn resolve_weights(inputs: usize, weights: &[f64]) -> StoreResult<Vec<f64>> {
    if weights.is_empty() {
        return Ok(vec![1.0; inputs]);
    }
    if weights.len() != inputs {
        return Err(StoreError::invalid(format!(
            "expected {} weights, got {}",
            inputs,
            weights.len()
        )));
    }
    if weights.iter().any(|w| w.is_nan()) {
        return Err(StoreError::invalid("weight value is not a float"));
    }
    Ok(weights.to_vec())
}
