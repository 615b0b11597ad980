//! List Engine
//!
//! Double-ended lists of binary values, stored as a `VecDeque` for O(1)
//! push/pop at both ends. Indices may be negative, counting from the tail
//! (`-1` is the last element).
//!
//! ## Blocking pops
//!
//! `blpop`, `brpop` and `brpoplpush` pop at once when an element is there.
//! Otherwise they register on the key's signal and sleep until a push to
//! that key or their deadline, retrying the pop after every wake-up and one
//! last time at the deadline. Every operation that adds elements to a list
//! signals the key after releasing the shard lock.
//!
//! A zero timeout means "wait as long as allowed", which is
//! `StoreConfig::max_block`; longer timeouts are clamped to it.

use crate::error::{StoreError, StoreResult};
use crate::storage::keyspace::Keyspace;
use crate::types::range::clamp_window;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

type List = VecDeque<Bytes>;

/// Where `linsert` places the new element relative to the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let actual = if index < 0 { len + index } else { index };
    (0..len).contains(&actual).then_some(actual as usize)
}

fn no_values(values: &[Bytes]) -> StoreResult<()> {
    if values.is_empty() {
        return Err(StoreError::invalid("at least one value is required"));
    }
    Ok(())
}

impl Keyspace {
    // ========================================================================
    // Push / pop
    // ========================================================================

    /// Pushes values to the head of a list, creating it if needed.
    /// `lpush k a b c` leaves `[c, b, a]`.
    ///
    /// # Returns
    ///
    /// The length of the list after the push.
    pub fn lpush(&self, key: &str, values: Vec<Bytes>) -> StoreResult<usize> {
        no_values(&values)?;
        let len = self.upsert(key, || Ok(List::new()), |list: &mut List| {
            for value in values {
                list.push_front(value);
            }
            Ok(list.len())
        })?;
        self.waiters.wake(key);
        Ok(len)
    }

    /// Pushes values to the tail of a list, creating it if needed.
    pub fn rpush(&self, key: &str, values: Vec<Bytes>) -> StoreResult<usize> {
        no_values(&values)?;
        let len = self.upsert(key, || Ok(List::new()), |list: &mut List| {
            list.extend(values);
            Ok(list.len())
        })?;
        self.waiters.wake(key);
        Ok(len)
    }

    /// Like [`Keyspace::lpush`] but only if the list already exists.
    /// Returns 0 when it does not.
    pub fn lpushx(&self, key: &str, values: Vec<Bytes>) -> StoreResult<usize> {
        no_values(&values)?;
        let len = self.update(key, |list: &mut List| {
            for value in values {
                list.push_front(value);
            }
            Ok(list.len())
        })?;
        self.wake_if_pushed(key, len)
    }

    /// Like [`Keyspace::rpush`] but only if the list already exists.
    pub fn rpushx(&self, key: &str, values: Vec<Bytes>) -> StoreResult<usize> {
        no_values(&values)?;
        let len = self.update(key, |list: &mut List| {
            list.extend(values);
            Ok(list.len())
        })?;
        self.wake_if_pushed(key, len)
    }

    fn wake_if_pushed(&self, key: &str, len: Option<usize>) -> StoreResult<usize> {
        match len {
            Some(len) => {
                self.waiters.wake(key);
                Ok(len)
            }
            None => Ok(0),
        }
    }

    /// Removes and returns the head of a list.
    pub fn lpop(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.update(key, |list: &mut List| Ok(list.pop_front()))?.flatten())
    }

    /// Removes and returns the tail of a list.
    pub fn rpop(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.update(key, |list: &mut List| Ok(list.pop_back()))?.flatten())
    }

    // ========================================================================
    // Inspection and in-place edits
    // ========================================================================

    /// Length of a list, 0 if absent.
    pub fn llen(&self, key: &str) -> StoreResult<usize> {
        Ok(self.view(key, |list: &List| list.len())?.unwrap_or(0))
    }

    pub fn lindex(&self, key: &str, index: i64) -> StoreResult<Option<Bytes>> {
        Ok(self
            .view(key, |list: &List| {
                resolve_index(index, list.len()).and_then(|i| list.get(i).cloned())
            })?
            .flatten())
    }

    /// Elements from `start` to `stop`, both inclusive.
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<Bytes>> {
        Ok(self
            .view(key, |list: &List| match clamp_window(start, stop, list.len()) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            })?
            .unwrap_or_default())
    }

    /// Overwrites the element at `index`.
    ///
    /// Fails with `NoSuchKey` if the list is absent and `IndexOutOfRange`
    /// if the index falls outside it.
    pub fn lset(&self, key: &str, index: i64, value: Bytes) -> StoreResult<()> {
        self.update(key, |list: &mut List| {
            let i = resolve_index(index, list.len()).ok_or(StoreError::IndexOutOfRange)?;
            list[i] = value;
            Ok(())
        })?
        .ok_or(StoreError::NoSuchKey)
    }

    /// Keeps only the elements from `start` to `stop`. An empty window
    /// removes the key.
    pub fn ltrim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()> {
        self.update(key, |list: &mut List| {
            match clamp_window(start, stop, list.len()) {
                Some((from, to)) => {
                    list.truncate(to + 1);
                    list.drain(..from);
                }
                None => list.clear(),
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Inserts `value` next to the first occurrence of `pivot`.
    ///
    /// # Returns
    ///
    /// - the new length on success
    /// - `-1` if the pivot was not found
    /// - `0` if the key does not exist
    pub fn linsert(
        &self,
        key: &str,
        position: InsertPosition,
        pivot: &[u8],
        value: Bytes,
    ) -> StoreResult<i64> {
        let result = self.update(key, |list: &mut List| {
            let Some(at) = list.iter().position(|item| item.as_ref() == pivot) else {
                return Ok(-1);
            };
            let at = match position {
                InsertPosition::Before => at,
                InsertPosition::After => at + 1,
            };
            list.insert(at, value);
            Ok(list.len() as i64)
        })?;

        match result {
            Some(len) if len > 0 => {
                self.waiters.wake(key);
                Ok(len)
            }
            Some(missing) => Ok(missing),
            None => Ok(0),
        }
    }

    /// Removes elements equal to `value`.
    ///
    /// - count > 0: remove up to `count` matches, head to tail
    /// - count < 0: remove up to `|count|` matches, tail to head
    /// - count = 0: remove every match
    ///
    /// # Returns
    ///
    /// The number of removed elements.
    pub fn lrem(&self, key: &str, count: i64, value: &[u8]) -> StoreResult<usize> {
        let removed = self.update(key, |list: &mut List| {
            let limit = if count == 0 {
                usize::MAX
            } else {
                count.unsigned_abs() as usize
            };

            let mut removed = 0usize;
            if count >= 0 {
                let mut i = 0;
                while i < list.len() && removed < limit {
                    if list[i].as_ref() == value {
                        list.remove(i);
                        removed += 1;
                    } else {
                        i += 1;
                    }
                }
            } else {
                let mut i = list.len();
                while i > 0 && removed < limit {
                    i -= 1;
                    if list[i].as_ref() == value {
                        list.remove(i);
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        })?;
        Ok(removed.unwrap_or(0))
    }

    // ========================================================================
    // Atomic transfer
    // ========================================================================

    /// Pops the tail of `src` and pushes it onto the head of `dst` as one
    /// atomic step. The destination's type is checked before the source is
    /// touched, so a `WrongType` failure moves nothing.
    ///
    /// With `src == dst` this rotates the list.
    pub fn rpoplpush(&self, src: &str, dst: &str) -> StoreResult<Option<Bytes>> {
        let moved = {
            let mut guards = self.lock_keys(&[src, dst]);
            guards.typed_mut::<List>(dst)?;

            let Some(list) = guards.typed_mut::<List>(src)? else {
                return Ok(None);
            };
            let Some(item) = list.pop_back() else {
                return Ok(None);
            };
            guards.drop_if_empty(src)?;

            guards
                .typed_or_insert(dst, || Ok(List::new()))?
                .push_front(item.clone());
            item
        };
        self.waiters.wake(dst);
        Ok(Some(moved))
    }

    // ========================================================================
    // Blocking variants
    // ========================================================================

    /// Pops the head of `key`, waiting up to `timeout` for an element.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the deadline passed with the list still empty.
    pub fn blpop(&self, key: &str, timeout: Duration) -> StoreResult<Option<Bytes>> {
        self.block_on(key, timeout, || self.lpop(key))
    }

    /// Pops the tail of `key`, waiting up to `timeout` for an element.
    pub fn brpop(&self, key: &str, timeout: Duration) -> StoreResult<Option<Bytes>> {
        self.block_on(key, timeout, || self.rpop(key))
    }

    /// Blocking form of [`Keyspace::rpoplpush`]; waits on `src`.
    pub fn brpoplpush(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> StoreResult<Option<Bytes>> {
        self.block_on(src, timeout, || self.rpoplpush(src, dst))
    }

    pub async fn blpop_async(&self, key: &str, timeout: Duration) -> StoreResult<Option<Bytes>> {
        self.block_on_async(key, timeout, || self.lpop(key)).await
    }

    pub async fn brpop_async(&self, key: &str, timeout: Duration) -> StoreResult<Option<Bytes>> {
        self.block_on_async(key, timeout, || self.rpop(key)).await
    }

    pub async fn brpoplpush_async(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> StoreResult<Option<Bytes>> {
        self.block_on_async(src, timeout, || self.rpoplpush(src, dst))
            .await
    }

    fn block_on<T>(
        &self,
        key: &str,
        timeout: Duration,
        mut attempt: impl FnMut() -> StoreResult<Option<T>>,
    ) -> StoreResult<Option<T>> {
        if let Some(found) = attempt()? {
            return Ok(Some(found));
        }

        let wait = self.config().effective_wait(timeout);
        let deadline = Instant::now() + wait;
        let guard = self.waiters.register(key);
        debug!(key = %key, ?wait, "blocking pop waiting");

        loop {
            // Read the sequence before trying, so a push racing with the
            // attempt still ends the wait below.
            let seen = guard.seq();
            if let Some(found) = attempt()? {
                self.record_wakeup();
                return Ok(Some(found));
            }
            if !guard.wait_until(seen, deadline) {
                return self.last_attempt(key, attempt());
            }
        }
    }

    async fn block_on_async<T>(
        &self,
        key: &str,
        timeout: Duration,
        mut attempt: impl FnMut() -> StoreResult<Option<T>>,
    ) -> StoreResult<Option<T>> {
        if let Some(found) = attempt()? {
            return Ok(Some(found));
        }

        let wait = self.config().effective_wait(timeout);
        let deadline = tokio::time::Instant::now() + wait;
        let guard = self.waiters.register(key);
        debug!(key = %key, ?wait, "blocking pop waiting (async)");

        loop {
            let notified = guard.notify().notified();
            tokio::pin!(notified);
            // Enabled before the attempt so a concurrent push is not missed
            notified.as_mut().enable();

            if let Some(found) = attempt()? {
                self.record_wakeup();
                return Ok(Some(found));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.last_attempt(key, attempt());
            }
        }
    }

    fn last_attempt<T>(
        &self,
        key: &str,
        result: StoreResult<Option<T>>,
    ) -> StoreResult<Option<T>> {
        match result? {
            Some(found) => {
                self.record_wakeup();
                Ok(Some(found))
            }
            None => {
                self.record_timeout();
                debug!(key = %key, "blocking pop timed out");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::storage::keyspace::tests::init_tracing;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    fn items(values: &[&str]) -> Vec<Bytes> {
        values.iter().map(|v| b(v)).collect()
    }

    #[test]
    fn test_lpush_rpush_order() {
        let ks = Keyspace::new();
        assert_eq!(ks.lpush("l", items(&["a", "b", "c"])).unwrap(), 3);
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), items(&["c", "b", "a"]));
        assert_eq!(ks.rpush("l", items(&["d", "e"])).unwrap(), 5);
        assert_eq!(
            ks.lrange("l", 0, -1).unwrap(),
            items(&["c", "b", "a", "d", "e"])
        );
        assert!(ks.lpush("l", vec![]).is_err());
    }

    #[test]
    fn test_pushx_requires_existing_list() {
        let ks = Keyspace::new();
        assert_eq!(ks.lpushx("l", items(&["a"])).unwrap(), 0);
        assert_eq!(ks.rpushx("l", items(&["a"])).unwrap(), 0);
        assert!(!ks.exists("l"));
        ks.rpush("l", items(&["x"])).unwrap();
        assert_eq!(ks.rpushx("l", items(&["y"])).unwrap(), 2);
        assert_eq!(ks.lpushx("l", items(&["w"])).unwrap(), 3);
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), items(&["w", "x", "y"]));
    }

    #[test]
    fn test_pop_removes_empty_list() {
        let ks = Keyspace::new();
        ks.rpush("l", items(&["a", "b"])).unwrap();
        assert_eq!(ks.lpop("l").unwrap(), Some(b("a")));
        assert_eq!(ks.rpop("l").unwrap(), Some(b("b")));
        assert_eq!(ks.lpop("l").unwrap(), None);
        assert!(!ks.exists("l"));
    }

    #[test]
    fn test_lindex_and_lrange_bounds() {
        let ks = Keyspace::new();
        ks.rpush("l", items(&["a", "b", "c", "d"])).unwrap();
        assert_eq!(ks.lindex("l", 0).unwrap(), Some(b("a")));
        assert_eq!(ks.lindex("l", -1).unwrap(), Some(b("d")));
        assert_eq!(ks.lindex("l", 4).unwrap(), None);
        assert_eq!(ks.lindex("l", -5).unwrap(), None);

        assert_eq!(ks.lrange("l", 1, 2).unwrap(), items(&["b", "c"]));
        assert_eq!(ks.lrange("l", -2, 100).unwrap(), items(&["c", "d"]));
        assert_eq!(ks.lrange("l", -100, 0).unwrap(), items(&["a"]));
        assert!(ks.lrange("l", 3, 1).unwrap().is_empty());
        assert!(ks.lrange("missing", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn test_lset_errors() {
        let ks = Keyspace::new();
        assert_eq!(ks.lset("l", 0, b("x")), Err(StoreError::NoSuchKey));
        ks.rpush("l", items(&["a", "b"])).unwrap();
        ks.lset("l", -1, b("z")).unwrap();
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), items(&["a", "z"]));
        assert_eq!(ks.lset("l", 2, b("x")), Err(StoreError::IndexOutOfRange));
    }

    #[test]
    fn test_ltrim() {
        let ks = Keyspace::new();
        ks.rpush("l", items(&["a", "b", "c", "d", "e"])).unwrap();
        ks.ltrim("l", 1, -2).unwrap();
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), items(&["b", "c", "d"]));
        ks.ltrim("l", 5, 10).unwrap();
        assert!(!ks.exists("l"));
    }

    #[test]
    fn test_linsert() {
        let ks = Keyspace::new();
        assert_eq!(
            ks.linsert("l", InsertPosition::Before, b"a", b("x")).unwrap(),
            0
        );
        ks.rpush("l", items(&["a", "c"])).unwrap();
        assert_eq!(
            ks.linsert("l", InsertPosition::After, b"a", b("b")).unwrap(),
            3
        );
        assert_eq!(
            ks.linsert("l", InsertPosition::Before, b"a", b("_")).unwrap(),
            4
        );
        assert_eq!(
            ks.linsert("l", InsertPosition::Before, b"zz", b("q")).unwrap(),
            -1
        );
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), items(&["_", "a", "b", "c"]));
    }

    #[test]
    fn test_lrem() {
        let ks = Keyspace::new();
        ks.rpush("l", items(&["a", "b", "a", "c", "a"])).unwrap();
        assert_eq!(ks.lrem("l", 1, b"a").unwrap(), 1);
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), items(&["b", "a", "c", "a"]));
        assert_eq!(ks.lrem("l", -1, b"a").unwrap(), 1);
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), items(&["b", "a", "c"]));
        assert_eq!(ks.lrem("l", 0, b"b").unwrap(), 1);
        assert_eq!(ks.lrem("l", 0, b"a").unwrap(), 1);
        assert_eq!(ks.lrem("l", 0, b"c").unwrap(), 1);
        assert!(!ks.exists("l"));
    }

    #[test]
    fn test_rpoplpush_moves_and_rotates() {
        let ks = Keyspace::new();
        ks.rpush("src", items(&["a", "b", "c"])).unwrap();
        assert_eq!(ks.rpoplpush("src", "dst").unwrap(), Some(b("c")));
        assert_eq!(ks.lrange("dst", 0, -1).unwrap(), items(&["c"]));
        assert_eq!(ks.lrange("src", 0, -1).unwrap(), items(&["a", "b"]));

        assert_eq!(ks.rpoplpush("src", "src").unwrap(), Some(b("b")));
        assert_eq!(ks.lrange("src", 0, -1).unwrap(), items(&["b", "a"]));

        assert_eq!(ks.rpoplpush("missing", "dst").unwrap(), None);
    }

    #[test]
    fn test_rpoplpush_single_element_rotation() {
        let ks = Keyspace::new();
        ks.rpush("one", items(&["x"])).unwrap();
        assert_eq!(ks.rpoplpush("one", "one").unwrap(), Some(b("x")));
        assert_eq!(ks.lrange("one", 0, -1).unwrap(), items(&["x"]));
    }

    #[test]
    fn test_rpoplpush_checks_destination_first() {
        let ks = Keyspace::new();
        ks.rpush("src", items(&["a"])).unwrap();
        ks.set("dst", b("string")).unwrap();
        assert_eq!(ks.rpoplpush("src", "dst"), Err(StoreError::WrongType));
        assert_eq!(ks.llen("src").unwrap(), 1);
    }

    #[test]
    fn test_blpop_returns_immediately_when_available() {
        let ks = Keyspace::new();
        ks.rpush("l", items(&["a"])).unwrap();
        let start = Instant::now();
        assert_eq!(ks.blpop("l", Duration::from_secs(5)).unwrap(), Some(b("a")));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_blpop_times_out() {
        init_tracing();
        let ks = Keyspace::new();
        let start = Instant::now();
        assert_eq!(ks.blpop("empty", Duration::from_millis(100)).unwrap(), None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(ks.stats().blocking_timeouts, 1);
        assert_eq!(ks.waiters.waiting_keys(), 0);
    }

    #[test]
    fn test_zero_timeout_waits_up_to_max_block() {
        let config = StoreConfig::default().max_block(Duration::from_millis(80));
        let ks = Keyspace::with_config(config).unwrap();
        let start = Instant::now();
        assert_eq!(ks.brpop("empty", Duration::ZERO).unwrap(), None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_blpop_wrong_type_fails_fast() {
        let ks = Keyspace::new();
        ks.set("s", b("x")).unwrap();
        assert_eq!(
            ks.blpop("s", Duration::from_secs(5)),
            Err(StoreError::WrongType)
        );
    }

    #[test]
    fn test_blpop_wakes_on_push() {
        let ks = Arc::new(Keyspace::new());
        let consumer = {
            let ks = Arc::clone(&ks);
            thread::spawn(move || ks.blpop("jobs", Duration::from_secs(10)))
        };

        while ks.waiters.waiting_keys() == 0 {
            thread::yield_now();
        }
        let start = Instant::now();
        ks.rpush("jobs", items(&["job-1"])).unwrap();

        assert_eq!(consumer.join().unwrap().unwrap(), Some(b("job-1")));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!ks.exists("jobs"));
    }

    #[test]
    fn test_brpoplpush_wakes_on_push() {
        let ks = Arc::new(Keyspace::new());
        let mover = {
            let ks = Arc::clone(&ks);
            thread::spawn(move || ks.brpoplpush("in", "out", Duration::from_secs(10)))
        };

        while ks.waiters.waiting_keys() == 0 {
            thread::yield_now();
        }
        ks.lpush("in", items(&["x"])).unwrap();

        assert_eq!(mover.join().unwrap().unwrap(), Some(b("x")));
        assert_eq!(ks.lrange("out", 0, -1).unwrap(), items(&["x"]));
    }

    #[test]
    fn test_each_push_serves_one_waiter() {
        let ks = Arc::new(Keyspace::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let ks = Arc::clone(&ks);
                thread::spawn(move || ks.blpop("q", Duration::from_secs(10)))
            })
            .collect();

        for i in 0..4 {
            ks.rpush("q", vec![b(&format!("item-{}", i))]).unwrap();
        }

        let got: HashSet<Bytes> = consumers
            .into_iter()
            .map(|h| h.join().unwrap().unwrap().unwrap())
            .collect();
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn test_concurrent_rpoplpush_loses_nothing() {
        let ks = Arc::new(Keyspace::new());
        let total = 2_000;
        let values: Vec<Bytes> = (0..total).map(|i| b(&i.to_string())).collect();
        ks.rpush("a", values).unwrap();

        let movers: Vec<_> = (0..4)
            .map(|i| {
                let ks = Arc::clone(&ks);
                let (from, to) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        ks.rpoplpush(from, to).unwrap();
                    }
                })
            })
            .collect();
        for mover in movers {
            mover.join().unwrap();
        }

        let mut all = ks.lrange("a", 0, -1).unwrap();
        all.extend(ks.lrange("b", 0, -1).unwrap());
        assert_eq!(all.len(), total);
        let distinct: HashSet<Bytes> = all.into_iter().collect();
        assert_eq!(distinct.len(), total);
    }

    #[tokio::test]
    async fn test_blpop_async_wakes_on_push() {
        let ks = Arc::new(Keyspace::new());
        let consumer = {
            let ks = Arc::clone(&ks);
            tokio::spawn(async move { ks.blpop_async("jobs", Duration::from_secs(10)).await })
        };

        while ks.waiters.waiting_keys() == 0 {
            tokio::task::yield_now().await;
        }
        ks.rpush("jobs", items(&["a"])).unwrap();

        assert_eq!(consumer.await.unwrap().unwrap(), Some(b("a")));
    }

    #[tokio::test]
    async fn test_brpop_async_times_out() {
        let ks = Keyspace::new();
        let start = Instant::now();
        assert_eq!(
            ks.brpop_async("empty", Duration::from_millis(50)).await.unwrap(),
            None
        );
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(ks.waiters.waiting_keys(), 0);
    }

    #[tokio::test]
    async fn test_brpoplpush_async_cancelled_loses_nothing() {
        let ks = Keyspace::new();
        let cancelled = tokio::time::timeout(
            Duration::from_millis(30),
            ks.brpoplpush_async("src", "dst", Duration::from_secs(10)),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(ks.waiters.waiting_keys(), 0);

        ks.rpush("src", items(&["a"])).unwrap();
        assert_eq!(
            ks.brpoplpush_async("src", "dst", Duration::from_secs(1))
                .await
                .unwrap(),
            Some(b("a"))
        );
        assert_eq!(ks.llen("dst").unwrap(), 1);
    }
}
