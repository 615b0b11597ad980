//! Keyspace Configuration
//!
//! [`StoreConfig`] carries the few knobs the keyspace exposes. It follows the
//! same shape as the rest of the crate's configuration: a plain struct with
//! sensible defaults, builder-style setters and a `validate()` step that runs
//! before a [`Keyspace`](crate::Keyspace) is built.

use crate::error::{StoreError, StoreResult};
use crate::types::hyperloglog::{MAX_PRECISION, MIN_PRECISION};
use std::time::Duration;

/// Default number of shards. 64 keeps lock contention low without
/// noticeable per-shard overhead.
pub const DEFAULT_SHARDS: usize = 64;

/// Default precision of new cardinality estimators (16,384 registers).
pub const DEFAULT_HLL_PRECISION: u8 = 14;

/// Default upper bound for any blocking pop.
pub const DEFAULT_MAX_BLOCK: Duration = Duration::from_secs(300);

/// Configuration for a [`Keyspace`](crate::Keyspace).
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Number of independently locked shards (must be > 0)
    pub shards: usize,

    /// Index bits of estimators created by `pfadd`/`pfmerge`
    pub hll_precision: u8,

    /// Longest time a blocking pop may suspend its caller. A blocking call
    /// with a zero timeout waits exactly this long.
    pub max_block: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shards: DEFAULT_SHARDS,
            hll_precision: DEFAULT_HLL_PRECISION,
            max_block: DEFAULT_MAX_BLOCK,
        }
    }
}

impl StoreConfig {
    /// Sets the shard count.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Sets the estimator precision used for new keys.
    pub fn hll_precision(mut self, precision: u8) -> Self {
        self.hll_precision = precision;
        self
    }

    /// Sets the cap applied to blocking pops.
    pub fn max_block(mut self, max_block: Duration) -> Self {
        self.max_block = max_block;
        self
    }

    /// Checks that every field is usable.
    pub fn validate(&self) -> StoreResult<()> {
        if self.shards == 0 {
            return Err(StoreError::invalid("shard count must be positive"));
        }
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.hll_precision) {
            return Err(StoreError::invalid(format!(
                "hll precision must be within {}..={}, got {}",
                MIN_PRECISION, MAX_PRECISION, self.hll_precision
            )));
        }
        if self.max_block.is_zero() {
            return Err(StoreError::invalid("max_block must be positive"));
        }
        Ok(())
    }

    /// Resolves the effective wait for a blocking call.
    ///
    /// Zero means "as long as allowed"; anything longer than `max_block` is clamped.
    pub(crate) fn effective_wait(&self, requested: Duration) -> Duration {
        if requested.is_zero() {
            self.max_block
        } else {
            requested.min(self.max_block)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(StoreConfig::default().shards(0).validate().is_err());
        assert!(StoreConfig::default().hll_precision(3).validate().is_err());
        assert!(StoreConfig::default().hll_precision(19).validate().is_err());
        assert!(StoreConfig::default()
            .max_block(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_effective_wait() {
        let config = StoreConfig::default().max_block(Duration::from_secs(2));
        assert_eq!(config.effective_wait(Duration::ZERO), Duration::from_secs(2));
        assert_eq!(
            config.effective_wait(Duration::from_millis(250)),
            Duration::from_millis(250)
        );
        assert_eq!(
            config.effective_wait(Duration::from_secs(60)),
            Duration::from_secs(2)
        );
    }
}
