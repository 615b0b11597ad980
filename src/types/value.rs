//! Typed Values
//!
//! A key maps to exactly one [`TypedValue`] variant. The keyspace reaches the
//! concrete engine state through the [`Variant`] trait, which is how a
//! type-mismatched call is turned into [`StoreError::WrongType`] before any
//! mutation happens.

use crate::error::{StoreError, StoreResult};
use crate::types::geo::GeoIndex;
use crate::types::hyperloglog::HyperLogLog;
use crate::types::sorted_set::SortedSet;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Tag naming the type a key currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    String,
    List,
    Set,
    SortedSet,
    Hash,
    Geo,
    HyperLogLog,
}

impl KeyType {
    /// The name reported by `TYPE`.
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::SortedSet => "zset",
            KeyType::Hash => "hash",
            KeyType::Geo => "geo",
            KeyType::HyperLogLog => "hyperloglog",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value stored under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    SortedSet(SortedSet),
    Hash(HashMap<Bytes, Bytes>),
    Geo(GeoIndex),
    HyperLogLog(HyperLogLog),
}

impl TypedValue {
    pub fn key_type(&self) -> KeyType {
        match self {
            TypedValue::String(_) => KeyType::String,
            TypedValue::List(_) => KeyType::List,
            TypedValue::Set(_) => KeyType::Set,
            TypedValue::SortedSet(_) => KeyType::SortedSet,
            TypedValue::Hash(_) => KeyType::Hash,
            TypedValue::Geo(_) => KeyType::Geo,
            TypedValue::HyperLogLog(_) => KeyType::HyperLogLog,
        }
    }

    /// True for collections that hold nothing. Such keys are removed.
    pub fn is_empty(&self) -> bool {
        match self {
            TypedValue::String(_) | TypedValue::HyperLogLog(_) => false,
            TypedValue::List(l) => l.is_empty(),
            TypedValue::Set(s) => s.is_empty(),
            TypedValue::SortedSet(z) => z.is_empty(),
            TypedValue::Hash(h) => h.is_empty(),
            TypedValue::Geo(g) => g.is_empty(),
        }
    }
}

/// Access to one engine's state inside a [`TypedValue`].
pub trait Variant: Sized {
    fn as_variant(value: &TypedValue) -> Option<&Self>;

    fn as_variant_mut(value: &mut TypedValue) -> Option<&mut Self>;

    fn into_value(self) -> TypedValue;

    /// Checked borrow: `WrongType` if `value` holds another variant.
    fn expect_ref(value: &TypedValue) -> StoreResult<&Self> {
        Self::as_variant(value).ok_or(StoreError::WrongType)
    }

    /// Checked mutable borrow: `WrongType` if `value` holds another variant.
    fn expect_mut(value: &mut TypedValue) -> StoreResult<&mut Self> {
        Self::as_variant_mut(value).ok_or(StoreError::WrongType)
    }
}

macro_rules! impl_variant {
    ($ty:ty, $variant:ident) => {
        impl Variant for $ty {
            fn as_variant(value: &TypedValue) -> Option<&Self> {
                match value {
                    TypedValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn as_variant_mut(value: &mut TypedValue) -> Option<&mut Self> {
                match value {
                    TypedValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_value(self) -> TypedValue {
                TypedValue::$variant(self)
            }
        }
    };
}

impl_variant!(Bytes, String);
impl_variant!(VecDeque<Bytes>, List);
impl_variant!(HashSet<Bytes>, Set);
impl_variant!(SortedSet, SortedSet);
impl_variant!(HashMap<Bytes, Bytes>, Hash);
impl_variant!(GeoIndex, Geo);
impl_variant!(HyperLogLog, HyperLogLog);
