//! HyperLogLog Cardinality Estimator
//!
//! Counts distinct elements in fixed memory. Each element is hashed to 64 bits;
//! the top `p` bits pick one of `m = 2^p` registers and the register keeps the
//! longest run of leading zeros (plus one) seen in the remaining bits.
//!
//! ```text
//!   hash (64 bits)
//!   ┌──────────── p bits ───────────┬──────────── 64 - p bits ──────────────┐
//!   │        register index         │  0 0 0 1 ...  → rho = zeros + 1      │
//!   └───────────────────────────────┴───────────────────────────────────────┘
//! ```
//!
//! The estimate is the bias-corrected harmonic mean of `2^register`, with a
//! linear-counting fallback for small cardinalities. Results are approximate:
//! the standard error is `1.04 / sqrt(m)` (about 0.81% at `p = 14`).

use crate::error::{StoreError, StoreResult};
use xxhash_rust::xxh64::xxh64;

/// Smallest supported precision (16 registers).
pub const MIN_PRECISION: u8 = 4;

/// Largest supported precision (262,144 registers).
pub const MAX_PRECISION: u8 = 18;

/// A register set plus its precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperLogLog {
    precision: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Creates an empty estimator with `2^precision` registers.
    pub fn new(precision: u8) -> StoreResult<Self> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(StoreError::invalid(format!(
                "hll precision must be within {}..={}, got {}",
                MIN_PRECISION, MAX_PRECISION, precision
            )));
        }
        Ok(Self {
            precision,
            registers: vec![0; 1usize << precision],
        })
    }

    /// Rebuilds an estimator from raw registers (used by restore).
    pub(crate) fn from_registers(precision: u8, registers: Vec<u8>) -> StoreResult<Self> {
        let mut hll = Self::new(precision)?;
        if registers.len() != hll.registers.len() {
            return Err(StoreError::Corrupt(format!(
                "expected {} registers, found {}",
                hll.registers.len(),
                registers.len()
            )));
        }
        let max_rho = 64 - precision + 1;
        if registers.iter().any(|&r| r > max_rho) {
            return Err(StoreError::Corrupt("register value out of range".into()));
        }
        hll.registers = registers;
        Ok(hll)
    }

    #[inline]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    #[inline]
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    pub(crate) fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Standard error of the estimate for this precision.
    pub fn standard_error(&self) -> f64 {
        1.04 / (self.register_count() as f64).sqrt()
    }

    /// Adds an element. Returns `true` if any register changed.
    pub fn offer(&mut self, element: &[u8]) -> bool {
        let (index, rho) = self.index_and_rho(xxh64(element, 0));
        if rho > self.registers[index] {
            self.registers[index] = rho;
            true
        } else {
            false
        }
    }

    /// Splits a hash into the register index (top `p` bits) and
    /// `rho` = leading zeros of the remaining bits + 1.
    fn index_and_rho(&self, hash: u64) -> (usize, u8) {
        let p = self.precision as u32;
        let index = (hash >> (64 - p)) as usize;
        let rest = hash << p;
        // An all-zero remainder would report 64 leading zeros; cap at its width.
        let rho = (rest.leading_zeros() + 1).min(64 - p + 1) as u8;
        (index, rho)
    }

    /// Estimates the number of distinct elements offered so far.
    pub fn cardinality(&self) -> u64 {
        let m = self.register_count() as f64;
        let mut sum = 0.0;
        let mut zeros = 0usize;

        for &register in &self.registers {
            if register == 0 {
                zeros += 1;
            }
            sum += 1.0 / (1u64 << register) as f64;
        }

        let raw = alpha(self.precision) * m * m / sum;

        let estimate = if raw <= 2.5 * m && zeros != 0 {
            m * (m / zeros as f64).ln()
        } else {
            raw
        };

        estimate.round() as u64
    }

    /// Returns the register-wise maximum of `self` and `other`.
    pub fn merge(&self, other: &HyperLogLog) -> StoreResult<HyperLogLog> {
        let mut merged = self.clone();
        merged.merge_from(other)?;
        Ok(merged)
    }

    /// Folds `other` into `self` (register-wise maximum).
    pub fn merge_from(&mut self, other: &HyperLogLog) -> StoreResult<()> {
        if self.precision != other.precision {
            return Err(StoreError::invalid(format!(
                "cannot merge estimators of precision {} and {}",
                self.precision, other.precision
            )));
        }
        for (mine, theirs) in self.registers.iter_mut().zip(&other.registers) {
            if *theirs > *mine {
                *mine = *theirs;
            }
        }
        Ok(())
    }

    /// True if nothing has been offered yet.
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }
}

/// Bias-correction constant for `m = 2^p` registers.
fn alpha(precision: u8) -> f64 {
    match precision {
        4 => 0.673,
        5 => 0.697,
        6 => 0.709,
        p => {
            let m = (1u64 << p) as f64;
            0.7213 / (1.0 + 1.079 / m)
        }
    }
}
