//! Storage Module
//!
//! The [`Keyspace`] and the per-type engines that operate on it. Every
//! engine is a set of `impl Keyspace` blocks in its own file, so the whole
//! command surface is reached through a single handle.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Keyspace                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...N     │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └──────┬───────────────────────────────────────┬──────────────┘
//!        │                                       │
//!  strings / lists / sets / hashes       WaiterRegistry
//!  zsets / geo / hll engines            (blocking pops)
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: independent shards reduce lock contention
//! - **Typed Values**: every key holds exactly one kind of value
//! - **Lazy Expiry**: expired keys are reclaimed when they are touched
//! - **Atomic Multi-Key Ops**: shards are locked in a fixed order
//! - **Blocking Pops**: sync and async waiters woken by pushes
//!
//! ## Example
//!
//! ```
//! use memstore::storage::Keyspace;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let ks = Keyspace::new();
//!
//! ks.set("name", Bytes::from("Ariz")).unwrap();
//! assert_eq!(ks.get("name").unwrap(), Some(Bytes::from("Ariz")));
//!
//! ks.set_with_ttl("session", Bytes::from("token123"), Duration::from_secs(3600))
//!     .unwrap();
//! assert!(ks.ttl("session").unwrap() > 0);
//! ```

mod blocking;
pub mod glob;
pub mod keyspace;

mod geo;
mod hashes;
mod hll;
mod lists;
mod sets;
mod strings;
mod zsets;

pub use glob::GlobPattern;
pub use keyspace::{now_ms, Entry, Keyspace, KeyspaceStats};
pub use lists::InsertPosition;
