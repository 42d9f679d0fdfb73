//! Emergency-stop recovery toward the midpoint of both gearboxes.
//!
//! On entry the target is fixed to the integer midpoint of the last known
//! positions. Both gearboxes are driven there (each receiving the target as
//! its peer position, so neither sees a deviation) until the deviation
//! drops to the recovery threshold.

use desk_common::deviation::{DeviationLimits, deviation};

/// Integer midpoint without overflow.
#[inline]
pub const fn midpoint(left: u32, right: u32) -> u32 {
    ((left as u64 + right as u64) / 2) as u32
}

/// Recovery target bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryManager {
    target: Option<u32>,
}

impl RecoveryManager {
    pub const fn new() -> Self {
        Self { target: None }
    }

    /// Fix the target from the current positions.
    pub fn begin(&mut self, left: u32, right: u32) -> u32 {
        let target = midpoint(left, right);
        self.target = Some(target);
        target
    }

    /// Forget the target.
    pub fn clear(&mut self) {
        self.target = None;
    }

    #[inline]
    pub const fn target(&self) -> Option<u32> {
        self.target
    }

    /// Deviation back within the recovery threshold.
    #[inline]
    pub fn is_recovered(&self, left: u32, right: u32, limits: &DeviationLimits) -> bool {
        deviation(left, right) <= limits.stop_recovery
    }
}
