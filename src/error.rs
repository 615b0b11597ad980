//! Error Types
//!
//! Every fallible keyspace operation returns a [`StoreResult`]. Absence is
//! never an error: a missing key or member is reported as `None`, `0` or an
//! empty collection. Errors are reserved for calls that cannot be honoured,
//! and they are always raised before any state is touched.

use thiserror::Error;

/// Errors produced by the keyspace and its engines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The key holds a value of a different type than the operation expects
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// A malformed argument: bad range syntax, unknown unit, precision mismatch, ...
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation requires an existing key
    #[error("no such key")]
    NoSuchKey,

    /// A list index outside the current bounds
    #[error("index out of range")]
    IndexOutOfRange,

    /// The stored value or the argument is not a 64-bit integer
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The stored value or the argument is not a finite float
    #[error("value is not a valid float")]
    NotAFloat,

    /// Integer arithmetic would overflow
    #[error("increment or decrement would overflow")]
    Overflow,

    /// RESTORE target already exists and replacing was not requested
    #[error("target key name is busy")]
    KeyExists,

    /// A dump payload that cannot be decoded
    #[error("corrupt dump payload: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Shorthand for building an [`StoreError::InvalidArgument`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }
}

/// Result type for keyspace operations.
pub type StoreResult<T> = Result<T, StoreError>;
