//! Compaction policy.
//!
//! Decides whether a write rolls the accumulated deltas into a new full file
//! instead of appending one more delta.

use crate::config::DEFAULT_COMPACT_THRESHOLD_PERCENT;
use crate::error::{Error, Result};
use std::fmt;

/// Decides whether a change set must be written as a new full file.
pub trait CompactionThreshold: Send + Sync + fmt::Debug {
    /// Returns true if a change removing `removed` and changing `changed`
    /// entries of a snapshot of `previous_total` entries should compact.
    ///
    /// Only called for change sets that are not empty.
    fn trigger(&self, removed: usize, changed: usize, previous_total: usize) -> bool;
}

/// Compacts once removed plus changed entries exceed a percentage of the
/// previous snapshot size. Added entries do not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRemovedThreshold {
    percent: u32,
}

impl ChangedRemovedThreshold {
    /// Create a threshold of `percent` percent, which must lie in `0..=100`.
    pub fn new(percent: u32) -> Result<Self> {
        if percent > 100 {
            return Err(Error::invalid_argument(format!("Invalid percent value: {}", percent)));
        }
        Ok(Self { percent })
    }

    /// The configured percentage.
    pub fn percent(&self) -> u32 {
        self.percent
    }
}

impl Default for ChangedRemovedThreshold {
    fn default() -> Self {
        Self { percent: DEFAULT_COMPACT_THRESHOLD_PERCENT }
    }
}

impl CompactionThreshold for ChangedRemovedThreshold {
    fn trigger(&self, removed: usize, changed: usize, previous_total: usize) -> bool {
        if self.percent == 0 {
            return true;
        }
        // (removed + changed) / previous_total > percent / 100, without rounding
        let touched = (removed as u128 + changed as u128) * 100;
        touched > previous_total as u128 * self.percent as u128
    }
}
