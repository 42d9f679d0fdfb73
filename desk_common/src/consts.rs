//! System-wide constants for the desk workspace.
//!
//! Single source of truth for deviation limits, bus addresses, timing and
//! step bounds. Configuration files may override the runtime values, but
//! their defaults always come from here.

use static_assertions::const_assert;

// ─── Deviation Limits [steps] ───────────────────────────────────────

/// Hard deviation limit. Exceeding it (strictly) triggers an emergency stop.
pub const MAX_GEARBOX_DEVIATION: u32 = 1000;

/// Soft deviation limit. Above it the leading side gets a travel correction.
pub const MAX_SOFT_GEARBOX_DEVIATION: u32 = 400;

/// Deviation at which emergency-stop recovery hands back to drive mode.
pub const MAX_DEVIATION_STOP_RECOVERY: u32 = 100;

const_assert!(MAX_SOFT_GEARBOX_DEVIATION > 0);
const_assert!(MAX_GEARBOX_DEVIATION > MAX_SOFT_GEARBOX_DEVIATION);
const_assert!(MAX_DEVIATION_STOP_RECOVERY < MAX_GEARBOX_DEVIATION);

// ─── Bus ────────────────────────────────────────────────────────────

/// Bus address of the left gearbox node.
pub const GEARBOX_LEFT_ADDRESS: u8 = 0x33;

/// Bus address of the right gearbox node.
pub const GEARBOX_RIGHT_ADDRESS: u8 = 0x88;

/// Bounded wait for a single gearbox transaction [ms].
pub const BUS_TIMEOUT_MS: u64 = 20;

// ─── Coordinator Timing ─────────────────────────────────────────────

/// Control cycle period [ms].
pub const CYCLE_TIME_MS: u64 = 10;

/// Minimum dwell in each power/enable sequencing step [ms].
pub const POWER_STEP_DWELL_MS: u64 = 200;

/// Minimum dwell before a brake step may complete [ms].
pub const BRAKE_STEP_DWELL_MS: u64 = 100;

/// Time allowed for the brakes to report unlocked before driving up [ms].
pub const BRAKE_UNLOCK_TIMEOUT_MS: u64 = 3000;

/// Duration of the drive-up used to unload the brake pins [ms].
pub const UNLOCK_DRIVE_UP_MS: u64 = 300;

/// Failed acknowledgements tolerated per step before an error is logged.
pub const MAX_ACTION_RETRIES: u32 = 10;

/// Unchanged position samples required in Stop before locking the brakes.
pub const STOP_STANDSTILL_SAMPLES: u8 = 2;

/// Unchanged position samples required before emergency-stop recovery.
pub const EMERGENCY_STANDSTILL_SAMPLES: u8 = 1;

/// Fixed target of the move-to shortcut [steps].
pub const MOVE_TO_TARGET: u32 = 40_000;

/// Capacity of the panel input event queue.
pub const INPUT_QUEUE_CAPACITY: usize = 64;

// ─── Gearbox Motion ─────────────────────────────────────────────────

/// Lowest reachable desk position [steps].
pub const MIN_STEPS: u32 = 0;

/// Highest reachable desk position [steps].
pub const MAX_STEPS: u32 = 40_000_000;

/// Main motor max speed [steps/s].
pub const MOTOR_MAX_SPEED: f32 = 1500.0;

/// Main motor acceleration [steps/s²].
pub const MOTOR_MAX_ACCELERATION: f32 = 100.0;

/// Interval between move commands from the coordinator, seen by a node [ms].
pub const MOVE_INPUT_INTERVAL_MS: u64 = CYCLE_TIME_MS;

/// Extra travel added to each up/down request, as a fraction.
pub const UP_DOWN_STEP_BUFFER_FACTOR: f32 = 0.002;

/// Step timer period [µs].
pub const STEP_INTERVAL_US: u64 = 100;

/// Step iterations between skipped-step reconciliations.
pub const SKIPPED_STEPS_UPDATE_ITERATIONS: u32 = 10_000;

/// Brake actuator travel between open and closed [steps].
pub const BRAKE_TRAVEL_STEPS: i32 = 1000;

/// Brake actuator steps per step-timer iteration.
pub const BRAKE_STEPS_PER_ITERATION: i32 = 1;

const_assert!(MAX_STEPS > MIN_STEPS);
