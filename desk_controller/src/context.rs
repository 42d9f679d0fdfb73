//! Coordinator runtime state, allocated once at startup.

use std::time::Duration;

use desk_common::config::DeskConfig;
use tracing::{error, info, warn};

use crate::link::Telemetry;
use crate::panel::EventQueue;
use crate::safety::recovery::RecoveryManager;
use crate::safety::standstill::StandstillDetector;
use crate::state::gearbox::{Action, GearboxState};
use crate::state::sequence::{LockStep, SequenceTracker, UnlockStep};
use crate::state::ui::UiStateMachine;

/// Motor driver outputs as last acknowledged by both gearboxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveOutputs {
    pub motor_control: bool,
    pub motor_control_power: bool,
}

impl DriveOutputs {
    /// Both outputs on: the motors can step.
    #[inline]
    pub const fn powered(&self) -> bool {
        self.motor_control && self.motor_control_power
    }

    /// Record an action both gearboxes acknowledged.
    pub fn acknowledge(&mut self, action: Action) {
        match action {
            Action::MotorControl(enable) => self.motor_control = enable,
            Action::MotorControlPower(enable) => self.motor_control_power = enable,
            _ => {}
        }
    }
}

/// Everything the state machines read and update between cycles.
#[derive(Debug)]
pub struct CoordinatorContext {
    pub ui: UiStateMachine,
    pub state: GearboxState,
    /// Time of the last gearbox state change.
    pub state_entered_at: Duration,
    pub unlock: SequenceTracker<UnlockStep>,
    pub lock: SequenceTracker<LockStep>,
    pub standstill: StandstillDetector,
    pub recovery: RecoveryManager,
    pub telemetry: Telemetry,
    /// Outcome of the action performed in the previous cycle.
    pub last_action_ok: bool,
    /// A move-to was cancelled; halt the drives once.
    pub halt_pending: bool,
    pub drives: DriveOutputs,
    pub events: EventQueue,
}

impl CoordinatorContext {
    pub fn new(config: &DeskConfig) -> Self {
        Self {
            ui: UiStateMachine::new(),
            state: GearboxState::OnBrake,
            state_entered_at: Duration::ZERO,
            unlock: SequenceTracker::new(Duration::ZERO),
            lock: SequenceTracker::new(Duration::ZERO),
            standstill: StandstillDetector::new(config.sequencing.stop_standstill_samples),
            recovery: RecoveryManager::new(),
            telemetry: Telemetry::default(),
            last_action_ok: true,
            halt_pending: false,
            drives: DriveOutputs::default(),
            events: EventQueue::new(),
        }
    }

    /// Change the gearbox state and reset the sub-state it starts from.
    pub fn enter(&mut self, next: GearboxState, config: &DeskConfig, now: Duration) {
        let (left, right) = self.telemetry.positions();
        match next {
            GearboxState::OnBrake | GearboxState::DriveMode => {}
            GearboxState::UnlockingBrakes => self.unlock.reset(now),
            GearboxState::Stop => {
                self.lock.reset(now);
                self.standstill.reset(config.sequencing.stop_standstill_samples);
            }
            GearboxState::LockingBrakes => self.lock.reset(now),
            GearboxState::EmergencyStop => {
                self.recovery.clear();
                self.standstill.reset(config.sequencing.emergency_standstill_samples);
            }
            GearboxState::EmergencyStopRecovery => {
                let target = self.recovery.begin(left, right);
                warn!(left, right, target, "Emergency stop recovery toward midpoint");
                if !self.drives.powered() {
                    error!(
                        left,
                        right,
                        target,
                        drives = ?self.drives,
                        "Recovery started with unpowered drives, desk stays in emergency stop recovery"
                    );
                }
            }
        }
        info!(from = ?self.state, to = ?next, ui = ?self.ui.state(), left, right, "Gearbox state");
        self.state = next;
        self.state_entered_at = now;
    }

    /// Recovery target, if recovery has started since the last emergency stop.
    #[inline]
    pub fn recover_position(&self) -> Option<u32> {
        self.recovery.target()
    }
}
