//! # memstore - A Typed In-Memory Multi-Model Store
//!
//! memstore is an embeddable, in-memory data store. Every key holds one
//! typed value (string, list, set, hash, sorted set, geo index or
//! HyperLogLog), may carry an expiry deadline, and is manipulated through
//! the methods of a single [`Keyspace`] handle that is safe to share across
//! threads and async tasks.
//!
//! ## Features
//!
//! - **Typed Keys**: operations on a key of the wrong type fail with
//!   [`StoreError::WrongType`] and leave the key untouched
//! - **High Performance**: sharded storage with one RwLock per shard
//! - **TTL Support**: millisecond deadlines with lazy reclamation
//! - **Blocking Pops**: `blpop`/`brpop`/`brpoplpush` for threads and for
//!   Tokio tasks
//! - **Probabilistic and Spatial Types**: HyperLogLog counting and geo
//!   radius search
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               Keyspace                                  │
//! │                                                                         │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────┐   │
//! │  │ strings  │ │  lists   │ │ sets     │ │ hashes   │ │ zsets / geo  │   │
//! │  │ engine   │ │  engine  │ │ engine   │ │ engine   │ │ / hll        │   │
//! │  └────┬─────┘ └────┬─────┘ └────┬─────┘ └────┬─────┘ └──────┬───────┘   │
//! │       └────────────┴────────────┼────────────┴──────────────┘           │
//! │                                 ▼                                       │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐                      │  │
//! │  │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │   key -> Entry       │  │
//! │  │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │   (value, deadline)  │  │
//! │  │  └────────┘ └────────┘ └────────┘ └────────┘                      │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                                 ▲                                       │
//! │                   ┌─────────────┴──────────────┐                        │
//! │                   │      WaiterRegistry        │                        │
//! │                   │ (blocked list consumers)   │                        │
//! │                   └────────────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use memstore::{DistanceUnit, Keyspace};
//! use bytes::Bytes;
//!
//! let ks = Keyspace::new();
//!
//! // Strings and counters
//! ks.set("greeting", Bytes::from("hello")).unwrap();
//! assert_eq!(ks.incr("visits").unwrap(), 1);
//!
//! // Lists
//! ks.rpush("queue", vec![Bytes::from("job-1"), Bytes::from("job-2")]).unwrap();
//! assert_eq!(ks.lpop("queue").unwrap(), Some(Bytes::from("job-1")));
//!
//! // Sorted sets
//! ks.zadd("board", 10.0, "alice").unwrap();
//! ks.zadd("board", 20.0, "bob").unwrap();
//! assert_eq!(ks.zrevrange("board", 0, 0).unwrap(), vec!["bob".to_string()]);
//!
//! // Geo
//! ks.geoadd("cities", 13.361389, 38.115556, "Palermo").unwrap();
//! ks.geoadd("cities", 15.087269, 37.502669, "Catania").unwrap();
//! let km = ks
//!     .geodist("cities", "Palermo", "Catania", DistanceUnit::Kilometers)
//!     .unwrap()
//!     .unwrap();
//! assert!((km - 166.27).abs() < 0.1);
//!
//! // Wrong type
//! assert!(ks.lpush("greeting", vec![Bytes::from("x")]).is_err());
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the sharded keyspace and the per-type engines
//! - [`types`]: value types (sorted set, geo index, HyperLogLog, ranges)
//! - [`config`]: keyspace configuration
//! - [`error`]: error type shared by every operation
//!
//! ## Design Highlights
//!
//! ### Thread Safety
//!
//! Keys are spread over independent RwLock shards. Operations that touch
//! several keys (`rpoplpush`, `smove`, `zunionstore`, `mset`, ...) lock every
//! shard involved in ascending index order, so they are atomic and cannot
//! deadlock against each other.
//!
//! ### Lazy Expiry
//!
//! A key whose deadline has passed is indistinguishable from an absent key.
//! It is removed the next time any operation touches it.
//!
//! ### Empty Collections
//!
//! A collection that loses its last element is deleted, so `exists` and
//! `key_type` never report an empty list, set, hash or sorted set.

pub mod config;
pub mod error;
pub mod storage;
pub mod types;

// Re-export commonly used types for convenience
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use storage::{GlobPattern, InsertPosition, Keyspace, KeyspaceStats};
pub use types::{
    Aggregate, Boundary, DistanceUnit, GeoMatch, GeoOrigin, GeoPoint, HyperLogLog, KeyType,
    LexRange, Limit, RadiusOptions, RangeSpec, ScoreRange, SortedSet, TypedValue,
};

/// Version of memstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
