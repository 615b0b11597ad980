//! Wake-ups for Blocking List Pops
//!
//! A blocked pop registers interest in one key and sleeps until a producer
//! pushes to that key or its deadline passes. Each key with waiters owns a
//! [`Signal`]: a sequence number bumped on every push, a condition variable
//! for threads, and a [`Notify`] for async tasks.
//!
//! ```text
//!   blpop("jobs")                              rpush("jobs", x)
//!   ─────────────                              ────────────────
//!   guard = registry.register("jobs")
//!   seen  = guard.seq()
//!   try pop  → empty
//!   guard.wait_until(seen, deadline) ◄──────── registry.wake("jobs")
//!   try pop  → x                                 seq += 1, notify all
//!   drop(guard)  (entry removed when last waiter leaves)
//! ```
//!
//! Producers only ever wake waiters of the key they pushed to. A waiter that
//! loses the race for the element simply retries and sleeps again.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

/// Per-key wake-up state.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    seq: Mutex<u64>,
    cond: Condvar,
    notify: Notify,
    /// Live guards; only touched while the registry lock is held
    waiters: Mutex<usize>,
}

impl Signal {
    fn bump(&self) {
        let mut seq = self.seq.lock();
        *seq = seq.wrapping_add(1);
        self.cond.notify_all();
        drop(seq);
        self.notify.notify_waiters();
    }
}

/// Registry of signals for keys that currently have blocked callers.
#[derive(Debug, Default)]
pub(crate) struct WaiterRegistry {
    signals: Mutex<HashMap<String, Arc<Signal>>>,
}

impl WaiterRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter on `key`. The registration lasts as long as the
    /// returned guard.
    pub(crate) fn register(&self, key: &str) -> WaitGuard<'_> {
        let mut signals = self.signals.lock();
        let signal = signals
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Signal::default()))
            .clone();
        *signal.waiters.lock() += 1;
        WaitGuard {
            registry: self,
            key: key.to_string(),
            signal,
        }
    }

    /// Wakes every waiter of `key`. A no-op when nobody is waiting.
    pub(crate) fn wake(&self, key: &str) {
        let signal = self.signals.lock().get(key).cloned();
        if let Some(signal) = signal {
            tracing::trace!(key = %key, "waking blocked poppers");
            signal.bump();
        }
    }

    /// Number of keys with at least one waiter.
    pub(crate) fn waiting_keys(&self) -> usize {
        self.signals.lock().len()
    }
}

/// A registered interest in one key. Dropping it deregisters.
pub(crate) struct WaitGuard<'a> {
    registry: &'a WaiterRegistry,
    key: String,
    signal: Arc<Signal>,
}

impl WaitGuard<'_> {
    /// Current sequence number. Read this before each pop attempt.
    pub(crate) fn seq(&self) -> u64 {
        *self.signal.seq.lock()
    }

    /// Sleeps until the sequence moves past `seen` or `deadline` passes.
    ///
    /// # Returns
    ///
    /// `true` if woken by a push, `false` on timeout.
    pub(crate) fn wait_until(&self, seen: u64, deadline: Instant) -> bool {
        let mut seq = self.signal.seq.lock();
        while *seq == seen {
            if self.signal.cond.wait_until(&mut seq, deadline).timed_out() {
                return *seq != seen;
            }
        }
        true
    }

    /// The async half of the signal.
    pub(crate) fn notify(&self) -> &Notify {
        &self.signal.notify
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut signals = self.registry.signals.lock();
        let mut waiters = self.signal.waiters.lock();
        *waiters -= 1;
        if *waiters == 0 {
            signals.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_registration_lifecycle() {
        let registry = WaiterRegistry::new();
        let a = registry.register("k");
        let b = registry.register("k");
        assert_eq!(registry.waiting_keys(), 1);
        drop(a);
        assert_eq!(registry.waiting_keys(), 1);
        drop(b);
        assert_eq!(registry.waiting_keys(), 0);
    }

    #[test]
    fn test_wait_times_out() {
        let registry = WaiterRegistry::new();
        let guard = registry.register("k");
        let start = Instant::now();
        let woke = guard.wait_until(guard.seq(), start + Duration::from_millis(50));
        assert!(!woke);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wake_only_targets_its_key() {
        let registry = Arc::new(WaiterRegistry::new());
        let waiter = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let guard = registry.register("k");
                let seen = guard.seq();
                guard.wait_until(seen, Instant::now() + Duration::from_secs(5))
            })
        };

        while registry.waiting_keys() == 0 {
            thread::yield_now();
        }
        registry.wake("other");
        // The waiter may still be between register and seq; keep waking
        while !waiter.is_finished() {
            registry.wake("k");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wake_before_wait_is_not_lost() {
        let registry = WaiterRegistry::new();
        let guard = registry.register("k");
        let seen = guard.seq();
        registry.wake("k");
        // Sequence already moved, so this returns at once
        assert!(guard.wait_until(seen, Instant::now() + Duration::from_secs(5)));
    }
}
