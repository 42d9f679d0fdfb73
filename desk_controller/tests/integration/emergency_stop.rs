//! Integration test: deviation emergency stop and recovery.
//!
//! Validates the full lifecycle:
//! 1. Deviation above the hard limit → EmergencyStop, motors halted
//! 2. Standstill → EmergencyStopRecovery toward the midpoint
//! 3. Deviation within the recovery limit → DriveMode

use std::time::Duration;

use desk_common::deviation::deviation;
use desk_common::input::{ButtonEvent, ButtonId};
use desk_controller::{Action, GearboxState};

use super::desk::{Desk, LEFT, RIGHT};

// ── Helpers ─────────────────────────────────────────────────────────

/// Report `steps` lost on one side; reconciled by the node's skipped-steps
/// update within `skipped_steps_update_iterations`.
fn slip(desk: &Desk, address: u8, steps: i32) {
    desk.hardware(address).lock().skipped_steps().add(steps);
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn equal_positions_recover_immediately() {
    let mut desk = Desk::at(7_000, 7_000);
    desk.step();
    let config = desk.coordinator.config().clone();
    desk.coordinator
        .context_mut()
        .enter(GearboxState::EmergencyStop, &config, Duration::ZERO);

    assert_eq!(desk.step(), Action::Halt);
    assert_eq!(desk.state(), GearboxState::EmergencyStop);
    assert_eq!(desk.step(), Action::RecoverTo(7_000));
    assert_eq!(desk.state(), GearboxState::EmergencyStopRecovery);
    assert_eq!(desk.coordinator.context().recover_position(), Some(7_000));

    desk.step();
    assert_eq!(desk.state(), GearboxState::DriveMode);
    assert_eq!(desk.coordinator.context().recover_position(), Some(7_000));
}

#[test]
fn hard_deviation_at_rest_trips_after_first_poll() {
    let mut desk = Desk::at(5_001, 4_000);
    assert_eq!(desk.step(), Action::Poll);
    assert_eq!(desk.state(), GearboxState::OnBrake);

    assert_eq!(desk.step(), Action::Halt);
    assert_eq!(desk.state(), GearboxState::EmergencyStop);
}

#[test]
fn deviation_at_hard_limit_does_not_trip() {
    let mut desk = Desk::at(5_000, 4_000);
    desk.run(10);
    assert_eq!(desk.state(), GearboxState::OnBrake);
}

#[test]
fn slipped_gearbox_is_recovered_to_midpoint() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.unlock();
    slip(&desk, RIGHT, 1_500);

    let tripped = desk.run_until(200, |d| d.state() == GearboxState::EmergencyStop);
    assert!(tripped.is_some(), "no emergency stop, positions {:?}", desk.positions());
    assert_eq!(desk.positions(), (20_000, 18_500));

    let recovering = desk.run_until(5, |d| d.state() == GearboxState::EmergencyStopRecovery);
    assert!(recovering.is_some());
    assert_eq!(desk.coordinator.context().recover_position(), Some(19_250));

    // guard stays suppressed while the deviation is still above the limit
    assert_eq!(desk.step(), Action::RecoverTo(19_250));
    assert_eq!(desk.state(), GearboxState::EmergencyStopRecovery);

    let recovered = desk.run_until(2_000, |d| d.state() == GearboxState::DriveMode);
    assert!(recovered.is_some(), "recovery stuck at {:?}", desk.positions());
    let (left, right) = desk.positions();
    assert!(deviation(left, right) <= desk.coordinator.config().deviation.stop_recovery);
    assert!(left < 20_000 && right > 18_500);

    assert_eq!(desk.step(), Action::Poll);
    let settled = desk.run_until(1_000, |d| d.positions() == (19_250, 19_250));
    assert!(settled.is_some(), "settled at {:?}", desk.positions());
}

#[test]
fn emergency_stop_halts_moving_desk() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.unlock();
    desk.press(ButtonId::MoveUp, ButtonEvent::Pressed);
    desk.run(100);
    assert!(desk.hardware(LEFT).lock().motor().is_running());
    slip(&desk, LEFT, -1_200);

    let tripped = desk.run_until(200, |d| d.state() == GearboxState::EmergencyStop);
    assert!(tripped.is_some(), "no emergency stop, positions {:?}", desk.positions());
    for address in [LEFT, RIGHT] {
        let hw = desk.hardware(address);
        let hw = hw.lock();
        assert_eq!(hw.motor().speed(), 0.0);
        assert!(!hw.motor().is_running());
    }
}
