//! Value Types
//!
//! The data structures a key can hold, independent of the keyspace that
//! stores them. Each type enforces its own invariants; the engines in
//! [`crate::storage`] only add key lookup, locking and expiry on top.
//!
//! | Type            | Backing structure                         |
//! |-----------------|-------------------------------------------|
//! | string          | `Bytes`                                   |
//! | list            | `VecDeque<Bytes>`                         |
//! | set             | `HashSet<Bytes>`                          |
//! | hash            | `HashMap<Bytes, Bytes>`                   |
//! | zset            | [`SortedSet`] (member map + ordered index) |
//! | geo             | [`GeoIndex`]                              |
//! | hyperloglog     | [`HyperLogLog`]                           |

pub mod dump;
pub mod geo;
pub mod hyperloglog;
pub mod range;
pub mod sorted_set;
pub mod value;

pub use dump::{Dump, DUMP_VERSION};
pub use geo::{DistanceUnit, GeoIndex, GeoMatch, GeoOrigin, GeoPoint, RadiusOptions};
pub use hyperloglog::HyperLogLog;
pub use range::{Boundary, LexRange, Limit, RangeSpec, ScoreRange};
pub use sorted_set::{Aggregate, SortedSet};
pub use value::{KeyType, TypedValue, Variant};
