//! GearboxState transitions and per-state actions.
//!
//! OnBrake → UnlockingBrakes → DriveMode → Stop → LockingBrakes → OnBrake,
//! with EmergencyStop → EmergencyStopRecovery → DriveMode overlaid by the
//! deviation guard.
//!
//! Each cycle runs [`check`] (may change state, no I/O) and then
//! [`perform`] (maps the now-current state to one [`Action`]).

use std::time::Duration;

use desk_common::config::DeskConfig;

use crate::context::CoordinatorContext;
use crate::state::sequence::{
    LockStep, SequenceProgress, StepInput, UnlockStep, check_lock_step, check_unlock_step,
};
use crate::state::ui::UiState;

/// Coordinator gearbox state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum GearboxState {
    #[default]
    OnBrake = 0,
    UnlockingBrakes = 1,
    DriveMode = 2,
    Stop = 3,
    LockingBrakes = 4,
    EmergencyStop = 5,
    EmergencyStopRecovery = 6,
}

/// What to do toward the gearboxes or power rails this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Position request only.
    Poll,
    DriveUp,
    DriveDown,
    DriveTo(u32),
    /// Stop both motors (emergency stop opcode).
    Halt,
    /// Both sides move to `target`, with `target` as the peer position.
    RecoverTo(u32),
    LoosenBrakes,
    FastenBrakes,
    MotorControl(bool),
    MotorControlPower(bool),
    GearboxPower(bool),
    MotorPowerSupply(bool),
}

fn step_input(ctx: &CoordinatorContext, elapsed: Duration) -> StepInput {
    StepInput {
        elapsed,
        last_action_ok: ctx.last_action_ok,
        left_brake: ctx.telemetry.left.brake,
        right_brake: ctx.telemetry.right.brake,
    }
}

/// Transition check for the current state.
///
/// Advances the brake sequences and the standstill detector; returns the
/// state to enter, if any.
pub fn check(ctx: &mut CoordinatorContext, config: &DeskConfig, now: Duration) -> Option<GearboxState> {
    let ui = ctx.ui.state();
    let retries = config.sequencing.max_action_retries;

    match ctx.state {
        GearboxState::OnBrake => ui.is_moving().then_some(GearboxState::UnlockingBrakes),

        GearboxState::UnlockingBrakes => {
            if ui.is_stationary() {
                return Some(GearboxState::Stop);
            }
            let input = step_input(ctx, ctx.unlock.elapsed(now));
            let decision = check_unlock_step(ctx.unlock.step(), &input, &config.timing, &config.sequencing);
            match ctx.unlock.apply(decision, UnlockStep::next, retries, now) {
                SequenceProgress::Complete => Some(GearboxState::DriveMode),
                SequenceProgress::Running => None,
            }
        }

        GearboxState::DriveMode => ui.is_stationary().then_some(GearboxState::Stop),

        GearboxState::Stop => {
            if ui.is_moving() {
                return Some(GearboxState::DriveMode);
            }
            let (left, right) = ctx.telemetry.positions();
            (ctx.telemetry.fresh && ctx.standstill.sample(left, right))
                .then_some(GearboxState::LockingBrakes)
        }

        GearboxState::LockingBrakes => {
            if ui.is_moving() {
                return Some(GearboxState::UnlockingBrakes);
            }
            let input = step_input(ctx, ctx.lock.elapsed(now));
            let decision = check_lock_step(ctx.lock.step(), &input, &config.timing, &config.sequencing);
            match ctx.lock.apply(decision, LockStep::next, retries, now) {
                SequenceProgress::Complete => Some(GearboxState::OnBrake),
                SequenceProgress::Running => None,
            }
        }

        GearboxState::EmergencyStop => {
            let (left, right) = ctx.telemetry.positions();
            (ctx.telemetry.fresh && ctx.standstill.sample(left, right))
                .then_some(GearboxState::EmergencyStopRecovery)
        }

        GearboxState::EmergencyStopRecovery => {
            let (left, right) = ctx.telemetry.positions();
            ctx.recovery
                .is_recovered(left, right, &config.deviation)
                .then_some(GearboxState::DriveMode)
        }
    }
}

/// Action for the current state.
pub fn perform(ctx: &CoordinatorContext, config: &DeskConfig) -> Action {
    // a cancelled move-to may still be running after the UI reached Idle
    if ctx.halt_pending && matches!(ctx.state, GearboxState::DriveMode | GearboxState::Stop) {
        return Action::Halt;
    }

    match ctx.state {
        GearboxState::OnBrake | GearboxState::Stop => Action::Poll,

        GearboxState::UnlockingBrakes => match ctx.unlock.step() {
            UnlockStep::SwitchOnGearboxPower => Action::GearboxPower(true),
            UnlockStep::SwitchOnMotorPowerSupply => Action::MotorPowerSupply(true),
            UnlockStep::SwitchOnMotorControlPower => Action::MotorControlPower(true),
            UnlockStep::SwitchOnMotorControl => Action::MotorControl(true),
            UnlockStep::UnlockBrakes => Action::LoosenBrakes,
            UnlockStep::UnlockDriveUp => Action::DriveUp,
        },

        GearboxState::DriveMode => match ctx.ui.state() {
            UiState::MoveUp => Action::DriveUp,
            UiState::MoveDown => Action::DriveDown,
            UiState::MoveTo => Action::DriveTo(config.sequencing.move_to_target),
            UiState::DriveControl | UiState::Idle => Action::Poll,
        },

        GearboxState::LockingBrakes => match ctx.lock.step() {
            LockStep::LockBrakes => Action::FastenBrakes,
            LockStep::SwitchOffMotorControl => Action::MotorControl(false),
            LockStep::SwitchOffMotorControlPower => Action::MotorControlPower(false),
            LockStep::SwitchOffMotorPowerSupply => Action::MotorPowerSupply(false),
            LockStep::SwitchOffGearboxPower => Action::GearboxPower(false),
        },

        GearboxState::EmergencyStop => Action::Halt,

        GearboxState::EmergencyStopRecovery => match ctx.recover_position() {
            Some(target) => Action::RecoverTo(target),
            None => Action::Halt,
        },
    }
}
