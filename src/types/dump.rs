//! Dump / Restore Hook
//!
//! Each engine value can serialize itself into an opaque, type-tagged blob
//! and be rebuilt from it. The layout is private to this crate; an external
//! persistence layer should treat the blob as a black box.
//!
//! ```text
//! ┌─────────┬──────┬──────────────────────────────┐
//! │ version │ tag  │ engine payload               │
//! │  1 byte │ 1 B  │ length-prefixed, big-endian  │
//! └─────────┴──────┴──────────────────────────────┘
//! ```

use crate::error::{StoreError, StoreResult};
use crate::types::geo::{GeoIndex, GeoPoint};
use crate::types::hyperloglog::HyperLogLog;
use crate::types::sorted_set::SortedSet;
use crate::types::value::{KeyType, TypedValue, Variant};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::{HashMap, HashSet, VecDeque};

/// Current payload version.
pub const DUMP_VERSION: u8 = 1;

/// Serialization hook implemented by every engine value.
pub trait Dump: Variant {
    fn dump_payload(&self, out: &mut BytesMut);

    fn load_payload(input: &mut Bytes) -> StoreResult<Self>;
}

fn tag(kind: KeyType) -> u8 {
    match kind {
        KeyType::String => 0,
        KeyType::List => 1,
        KeyType::Set => 2,
        KeyType::SortedSet => 3,
        KeyType::Hash => 4,
        KeyType::Geo => 5,
        KeyType::HyperLogLog => 6,
    }
}

impl TypedValue {
    /// Serializes this value as `[version][tag][payload]`.
    pub fn dump(&self) -> Bytes {
        let mut out = BytesMut::new();
        out.put_u8(DUMP_VERSION);
        out.put_u8(tag(self.key_type()));
        match self {
            TypedValue::String(v) => v.dump_payload(&mut out),
            TypedValue::List(v) => v.dump_payload(&mut out),
            TypedValue::Set(v) => v.dump_payload(&mut out),
            TypedValue::SortedSet(v) => v.dump_payload(&mut out),
            TypedValue::Hash(v) => v.dump_payload(&mut out),
            TypedValue::Geo(v) => v.dump_payload(&mut out),
            TypedValue::HyperLogLog(v) => v.dump_payload(&mut out),
        }
        out.freeze()
    }

    /// Rebuilds a value produced by [`TypedValue::dump`].
    pub fn restore(blob: &[u8]) -> StoreResult<TypedValue> {
        let mut input = Bytes::copy_from_slice(blob);
        need(&input, 2)?;
        let version = input.get_u8();
        if version != DUMP_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported dump version {}",
                version
            )));
        }
        let value = match input.get_u8() {
            0 => Bytes::load_payload(&mut input)?.into_value(),
            1 => VecDeque::<Bytes>::load_payload(&mut input)?.into_value(),
            2 => HashSet::<Bytes>::load_payload(&mut input)?.into_value(),
            3 => SortedSet::load_payload(&mut input)?.into_value(),
            4 => HashMap::<Bytes, Bytes>::load_payload(&mut input)?.into_value(),
            5 => GeoIndex::load_payload(&mut input)?.into_value(),
            6 => HyperLogLog::load_payload(&mut input)?.into_value(),
            other => return Err(StoreError::Corrupt(format!("unknown type tag {}", other))),
        };
        if input.has_remaining() {
            return Err(StoreError::Corrupt(format!(
                "{} trailing bytes",
                input.remaining()
            )));
        }
        Ok(value)
    }
}

fn need(input: &Bytes, n: usize) -> StoreResult<()> {
    if input.remaining() < n {
        return Err(StoreError::Corrupt("unexpected end of payload".into()));
    }
    Ok(())
}

fn put_blob(out: &mut BytesMut, blob: &[u8]) {
    out.put_u32(blob.len() as u32);
    out.put_slice(blob);
}

fn get_blob(input: &mut Bytes) -> StoreResult<Bytes> {
    need(input, 4)?;
    let len = input.get_u32() as usize;
    need(input, len)?;
    Ok(input.split_to(len))
}

fn get_string(input: &mut Bytes) -> StoreResult<String> {
    let blob = get_blob(input)?;
    String::from_utf8(blob.to_vec()).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn get_count(input: &mut Bytes) -> StoreResult<usize> {
    need(input, 4)?;
    Ok(input.get_u32() as usize)
}

fn get_f64(input: &mut Bytes) -> StoreResult<f64> {
    need(input, 8)?;
    Ok(input.get_f64())
}

impl Dump for Bytes {
    fn dump_payload(&self, out: &mut BytesMut) {
        put_blob(out, self);
    }

    fn load_payload(input: &mut Bytes) -> StoreResult<Self> {
        get_blob(input)
    }
}

impl Dump for VecDeque<Bytes> {
    fn dump_payload(&self, out: &mut BytesMut) {
        out.put_u32(self.len() as u32);
        for item in self {
            put_blob(out, item);
        }
    }

    fn load_payload(input: &mut Bytes) -> StoreResult<Self> {
        let count = get_count(input)?;
        (0..count).map(|_| get_blob(input)).collect()
    }
}

impl Dump for HashSet<Bytes> {
    fn dump_payload(&self, out: &mut BytesMut) {
        out.put_u32(self.len() as u32);
        for item in self {
            put_blob(out, item);
        }
    }

    fn load_payload(input: &mut Bytes) -> StoreResult<Self> {
        let count = get_count(input)?;
        (0..count).map(|_| get_blob(input)).collect()
    }
}

impl Dump for HashMap<Bytes, Bytes> {
    fn dump_payload(&self, out: &mut BytesMut) {
        out.put_u32(self.len() as u32);
        for (field, value) in self {
            put_blob(out, field);
            put_blob(out, value);
        }
    }

    fn load_payload(input: &mut Bytes) -> StoreResult<Self> {
        let count = get_count(input)?;
        let mut hash = HashMap::with_capacity(count.min(1024));
        for _ in 0..count {
            let field = get_blob(input)?;
            let value = get_blob(input)?;
            hash.insert(field, value);
        }
        Ok(hash)
    }
}

impl Dump for SortedSet {
    fn dump_payload(&self, out: &mut BytesMut) {
        out.put_u32(self.len() as u32);
        for (member, score) in self.iter() {
            put_blob(out, member.as_bytes());
            out.put_f64(score);
        }
    }

    fn load_payload(input: &mut Bytes) -> StoreResult<Self> {
        let count = get_count(input)?;
        let mut set = SortedSet::new();
        for _ in 0..count {
            let member = get_string(input)?;
            let score = get_f64(input)?;
            set.insert(member, score)
                .map_err(|_| StoreError::Corrupt("NaN score".into()))?;
        }
        Ok(set)
    }
}

impl Dump for GeoIndex {
    fn dump_payload(&self, out: &mut BytesMut) {
        out.put_u32(self.len() as u32);
        for (member, point) in self.iter() {
            put_blob(out, member.as_bytes());
            out.put_f64(point.longitude);
            out.put_f64(point.latitude);
        }
    }

    fn load_payload(input: &mut Bytes) -> StoreResult<Self> {
        let count = get_count(input)?;
        let mut geo = GeoIndex::new();
        for _ in 0..count {
            let member = get_string(input)?;
            let lon = get_f64(input)?;
            let lat = get_f64(input)?;
            let point =
                GeoPoint::new(lon, lat).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            geo.add(member, point);
        }
        Ok(geo)
    }
}

impl Dump for HyperLogLog {
    fn dump_payload(&self, out: &mut BytesMut) {
        out.put_u8(self.precision());
        out.put_slice(self.registers());
    }

    fn load_payload(input: &mut Bytes) -> StoreResult<Self> {
        need(input, 1)?;
        let precision = input.get_u8();
        // Registers run to the end of the payload
        let registers = input.split_to(input.remaining()).to_vec();
        HyperLogLog::from_registers(precision, registers)
    }
}
