//! Cross-gearbox deviation guard.
//!
//! Level-triggered: evaluated every cycle from the latest telemetry and
//! forces EmergencyStop whenever the hard limit is exceeded, except while
//! already stopping or recovering.

use desk_common::deviation::{DeviationLimits, deviation};

use crate::state::gearbox::GearboxState;

/// Guard outcome for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Clear,
    /// Deviation above the hard limit; enter EmergencyStop.
    Trip { deviation: u32 },
    /// Not evaluated in the current state.
    Suppressed,
}

pub fn evaluate(state: GearboxState, left: u32, right: u32, limits: &DeviationLimits) -> GuardVerdict {
    match state {
        GearboxState::EmergencyStop | GearboxState::EmergencyStopRecovery => GuardVerdict::Suppressed,
        GearboxState::OnBrake
        | GearboxState::UnlockingBrakes
        | GearboxState::DriveMode
        | GearboxState::Stop
        | GearboxState::LockingBrakes => {
            let d = deviation(left, right);
            if limits.exceeds_hard(d) {
                GuardVerdict::Trip { deviation: d }
            } else {
                GuardVerdict::Clear
            }
        }
    }
}
