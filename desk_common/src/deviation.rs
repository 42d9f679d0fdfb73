//! Left/right synchronization math.
//!
//! Deviation is the distance between the two gearbox positions. Positions
//! travel on the wire as `u32`, the difference is taken in signed 32-bit
//! arithmetic so either side may be ahead.
//!
//! The soft-limit correction shortens the leading side's requested travel:
//!
//! ```text
//! correction = round((deviation - soft) / (hard - soft) * hard)
//! ```
//!
//! It is zero at the soft limit, `hard` at the hard limit and monotonic in
//! between.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    MAX_DEVIATION_STOP_RECOVERY, MAX_GEARBOX_DEVIATION, MAX_SOFT_GEARBOX_DEVIATION,
};

/// Deviation thresholds [steps].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationLimits {
    /// Emergency stop when the deviation is strictly greater.
    #[serde(default = "default_hard")]
    pub hard: u32,
    /// Travel correction for the leading side above this deviation.
    #[serde(default = "default_soft")]
    pub soft: u32,
    /// Recovery is complete at or below this deviation.
    #[serde(default = "default_stop_recovery")]
    pub stop_recovery: u32,
}

/// Inconsistent deviation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviationError {
    #[error("deviation.soft must be greater than 0")]
    ZeroSoft,

    #[error("deviation.hard ({hard}) must exceed deviation.soft ({soft})")]
    HardNotAboveSoft { hard: u32, soft: u32 },

    #[error("deviation.stop_recovery ({stop_recovery}) must be below deviation.hard ({hard})")]
    RecoveryNotBelowHard { stop_recovery: u32, hard: u32 },
}

fn default_hard() -> u32 {
    MAX_GEARBOX_DEVIATION
}
fn default_soft() -> u32 {
    MAX_SOFT_GEARBOX_DEVIATION
}
fn default_stop_recovery() -> u32 {
    MAX_DEVIATION_STOP_RECOVERY
}

impl Default for DeviationLimits {
    fn default() -> Self {
        Self {
            hard: MAX_GEARBOX_DEVIATION,
            soft: MAX_SOFT_GEARBOX_DEVIATION,
            stop_recovery: MAX_DEVIATION_STOP_RECOVERY,
        }
    }
}

impl DeviationLimits {
    /// Validate the ordering `0 < soft < hard` and `stop_recovery < hard`.
    pub fn validate(&self) -> Result<(), DeviationError> {
        if self.soft == 0 {
            return Err(DeviationError::ZeroSoft);
        }
        if self.hard <= self.soft {
            return Err(DeviationError::HardNotAboveSoft {
                hard: self.hard,
                soft: self.soft,
            });
        }
        if self.stop_recovery >= self.hard {
            return Err(DeviationError::RecoveryNotBelowHard {
                stop_recovery: self.stop_recovery,
                hard: self.hard,
            });
        }
        Ok(())
    }

    /// Whether `deviation` is past the hard limit (`>`, not `>=`).
    #[inline]
    pub const fn exceeds_hard(&self, deviation: u32) -> bool {
        deviation > self.hard
    }

    /// Whether `deviation` is past the soft limit.
    #[inline]
    pub const fn exceeds_soft(&self, deviation: u32) -> bool {
        deviation > self.soft
    }

    /// Soft-limit travel correction for the given deviation.
    #[inline]
    pub fn correction(&self, deviation: u32) -> u32 {
        soft_limit_correction(deviation, self.soft, self.hard)
    }
}

/// Absolute difference of two positions via signed 32-bit subtraction.
#[inline]
pub const fn deviation(left: u32, right: u32) -> u32 {
    (left as i32).wrapping_sub(right as i32).unsigned_abs()
}

/// Signed difference `this - other` (positive when `this` is ahead).
#[inline]
pub const fn signed_deviation(this: u32, other: u32) -> i32 {
    (this as i32).wrapping_sub(other as i32)
}

/// Proportional correction, rounded half up, clamped to `[0, hard]`.
///
/// Requires `hard > soft`; deviations below the soft limit yield zero.
pub fn soft_limit_correction(deviation: u32, soft: u32, hard: u32) -> u32 {
    let span = u64::from(hard.saturating_sub(soft));
    if span == 0 {
        return 0;
    }
    let over = u64::from(deviation.saturating_sub(soft));
    let scaled = (over * u64::from(hard) + span / 2) / span;
    scaled.min(u64::from(hard)) as u32
}
