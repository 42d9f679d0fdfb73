//! Brake unlock/lock sequences.
//!
//! Unlock: gearbox power → motor power supply → motor control power →
//! motor control → brakes open (with a short drive-up if the brakes stick).
//! Lock runs the same rails in reverse after closing the brakes.
//!
//! Each step has a minimum dwell. Steps acknowledged by a switch or a
//! gearbox only advance when the last action succeeded; on failure the
//! dwell restarts.

use std::time::Duration;

use desk_common::config::{SequencingConfig, TimingConfig};
use desk_common::protocol::BrakeState;
use tracing::error;

// ─── Unlock Sequence ────────────────────────────────────────────────

/// Steps of the brake unlock sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum UnlockStep {
    #[default]
    SwitchOnGearboxPower = 0,
    SwitchOnMotorPowerSupply = 1,
    SwitchOnMotorControlPower = 2,
    SwitchOnMotorControl = 3,
    UnlockBrakes = 4,
    /// Drive up briefly to unload stuck brake pins.
    UnlockDriveUp = 5,
}

impl UnlockStep {
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::SwitchOnGearboxPower => Some(Self::SwitchOnMotorPowerSupply),
            Self::SwitchOnMotorPowerSupply => Some(Self::SwitchOnMotorControlPower),
            Self::SwitchOnMotorControlPower => Some(Self::SwitchOnMotorControl),
            Self::SwitchOnMotorControl => Some(Self::UnlockBrakes),
            Self::UnlockBrakes | Self::UnlockDriveUp => None,
        }
    }
}

// ─── Lock Sequence ──────────────────────────────────────────────────

/// Steps of the brake lock sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LockStep {
    #[default]
    LockBrakes = 0,
    SwitchOffMotorControl = 1,
    SwitchOffMotorControlPower = 2,
    SwitchOffMotorPowerSupply = 3,
    SwitchOffGearboxPower = 4,
}

impl LockStep {
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::LockBrakes => Some(Self::SwitchOffMotorControl),
            Self::SwitchOffMotorControl => Some(Self::SwitchOffMotorControlPower),
            Self::SwitchOffMotorControlPower => Some(Self::SwitchOffMotorPowerSupply),
            Self::SwitchOffMotorPowerSupply => Some(Self::SwitchOffGearboxPower),
            Self::SwitchOffGearboxPower => None,
        }
    }
}

// ─── Step Evaluation ────────────────────────────────────────────────

/// What a step's check decided this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision<S> {
    /// Keep performing the current step.
    Wait,
    /// Step done; move to `next()` or finish the sequence.
    Advance,
    /// Dwell expired without acknowledgement; restart the dwell.
    Retry,
    /// Switch to another step. `failed` counts toward the retry budget.
    Jump { to: S, failed: bool },
}

/// Inputs to a step check.
#[derive(Debug, Clone, Copy)]
pub struct StepInput {
    /// Time spent in the current step (since the last dwell restart).
    pub elapsed: Duration,
    /// Outcome of the action performed last cycle.
    pub last_action_ok: bool,
    pub left_brake: BrakeState,
    pub right_brake: BrakeState,
}

impl StepInput {
    fn both(&self, state: BrakeState) -> bool {
        self.left_brake == state && self.right_brake == state
    }
}

fn acknowledged<S>(input: &StepInput, dwell: Duration) -> StepDecision<S> {
    if input.elapsed < dwell {
        StepDecision::Wait
    } else if input.last_action_ok {
        StepDecision::Advance
    } else {
        StepDecision::Retry
    }
}

/// Check one unlock step.
pub fn check_unlock_step(
    step: UnlockStep,
    input: &StepInput,
    timing: &TimingConfig,
    sequencing: &SequencingConfig,
) -> StepDecision<UnlockStep> {
    match step {
        UnlockStep::SwitchOnGearboxPower
        | UnlockStep::SwitchOnMotorPowerSupply
        | UnlockStep::SwitchOnMotorControlPower
        | UnlockStep::SwitchOnMotorControl => acknowledged(input, timing.power_step_dwell()),
        UnlockStep::UnlockBrakes => {
            if input.elapsed < timing.brake_step_dwell() {
                StepDecision::Wait
            } else if input.both(BrakeState::Unlocked) || sequencing.assume_brakes_unlocked {
                StepDecision::Advance
            } else if input.elapsed >= timing.brake_unlock_timeout() {
                StepDecision::Jump { to: UnlockStep::UnlockDriveUp, failed: true }
            } else {
                StepDecision::Wait
            }
        }
        UnlockStep::UnlockDriveUp => {
            if input.elapsed >= timing.unlock_drive_up() {
                StepDecision::Jump { to: UnlockStep::UnlockBrakes, failed: false }
            } else {
                StepDecision::Wait
            }
        }
    }
}

/// Check one lock step.
pub fn check_lock_step(
    step: LockStep,
    input: &StepInput,
    timing: &TimingConfig,
    sequencing: &SequencingConfig,
) -> StepDecision<LockStep> {
    match step {
        LockStep::LockBrakes => {
            if input.elapsed < timing.brake_step_dwell() {
                StepDecision::Wait
            } else if input.both(BrakeState::Locked) || sequencing.assume_brakes_locked {
                StepDecision::Advance
            } else if input.elapsed >= timing.brake_unlock_timeout() {
                StepDecision::Retry
            } else {
                StepDecision::Wait
            }
        }
        LockStep::SwitchOffMotorControl
        | LockStep::SwitchOffMotorControlPower
        | LockStep::SwitchOffMotorPowerSupply
        | LockStep::SwitchOffGearboxPower => acknowledged(input, timing.power_step_dwell()),
    }
}

// ─── Sequence Tracker ───────────────────────────────────────────────

/// Current step, dwell start and failure count of one sequence.
#[derive(Debug, Clone, Copy)]
pub struct SequenceTracker<S> {
    step: S,
    entered_at: Duration,
    failures: u32,
    escalated: bool,
}

/// Outcome of applying a [`StepDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceProgress {
    Running,
    Complete,
}

impl<S: Copy + Default + core::fmt::Debug> SequenceTracker<S> {
    pub fn new(now: Duration) -> Self {
        Self {
            step: S::default(),
            entered_at: now,
            failures: 0,
            escalated: false,
        }
    }

    #[inline]
    pub fn step(&self) -> S {
        self.step
    }

    #[inline]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Back to the first step.
    pub fn reset(&mut self, now: Duration) {
        *self = Self::new(now);
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.entered_at)
    }

    /// Apply a check result. `next` yields the successor of a step.
    pub fn apply(
        &mut self,
        decision: StepDecision<S>,
        next: impl Fn(S) -> Option<S>,
        max_retries: u32,
        now: Duration,
    ) -> SequenceProgress {
        match decision {
            StepDecision::Wait => {}
            StepDecision::Advance => match next(self.step) {
                Some(step) => {
                    self.step = step;
                    self.entered_at = now;
                    self.failures = 0;
                    self.escalated = false;
                }
                None => return SequenceProgress::Complete,
            },
            StepDecision::Retry => {
                self.entered_at = now;
                self.record_failure(max_retries);
            }
            StepDecision::Jump { to, failed } => {
                self.step = to;
                self.entered_at = now;
                if failed {
                    self.record_failure(max_retries);
                }
            }
        }
        SequenceProgress::Running
    }

    fn record_failure(&mut self, max_retries: u32) {
        self.failures = self.failures.saturating_add(1);
        if self.failures > max_retries && !self.escalated {
            self.escalated = true;
            error!(step = ?self.step, failures = self.failures, "Sequencing step keeps failing, still retrying");
        }
    }
}
