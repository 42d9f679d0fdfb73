//! Integration test: panel input to gearbox motion.

use desk_common::config::DeskConfig;
use desk_common::deviation::deviation;
use desk_common::input::{ButtonEvent, ButtonId};
use desk_common::protocol::BrakeState;
use desk_controller::{Action, GearboxState, UiState};
use desk_gearbox::GearboxHardware;

use super::desk::{Desk, LEFT, RIGHT};

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn idle_desk_only_polls() {
    let mut desk = Desk::at(20_000, 20_000);
    let actions = desk.run(50);
    assert!(actions.iter().all(|a| *a == Action::Poll));
    assert_eq!(desk.state(), GearboxState::OnBrake);
    assert_eq!(desk.coordinator.telemetry().positions(), (20_000, 20_000));
    assert!(!desk.coordinator.power().gearbox_power);
}

#[test]
fn move_up_press_starts_unlocking_in_same_cycle() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.click(ButtonId::Main);
    desk.press(ButtonId::MoveUp, ButtonEvent::Pressed);

    assert_eq!(desk.step(), Action::GearboxPower(true));
    assert_eq!(desk.ui(), UiState::MoveUp);
    assert_eq!(desk.state(), GearboxState::UnlockingBrakes);
}

#[test]
fn unlock_powers_up_and_releases_brakes() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.unlock();

    let power = desk.coordinator.power();
    assert!(power.gearbox_power);
    assert!(power.motor_power_supply);
    for address in [LEFT, RIGHT] {
        let hw = desk.hardware(address);
        let hw = hw.lock();
        assert!(hw.outputs().motor_enabled(), "0x{address:02x} motor disabled");
        assert_eq!(hw.brake_state(), BrakeState::Unlocked);
    }
    assert_eq!(desk.coordinator.context().unlock.failures(), 0);
    assert!(desk.coordinator.context().drives.powered());
}

#[test]
fn holding_move_up_raises_both_sides_together() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.click(ButtonId::Main);
    desk.press(ButtonId::MoveUp, ButtonEvent::Pressed);
    assert!(desk.run_until(300, |d| d.state() == GearboxState::DriveMode).is_some());

    let soft = desk.coordinator.config().deviation.soft;
    for _ in 0..300 {
        assert_eq!(desk.step(), Action::DriveUp);
        let (left, right) = desk.positions();
        assert!(deviation(left, right) <= soft, "deviation {left}/{right}");
    }
    let (left, right) = desk.positions();
    assert!(left > 20_000, "left did not move: {left}");
    assert!(right > 20_000, "right did not move: {right}");

    desk.press(ButtonId::MoveUp, ButtonEvent::Released);
    assert_eq!(desk.step(), Action::Poll);
    assert_eq!(desk.ui(), UiState::DriveControl);
    assert_eq!(desk.state(), GearboxState::DriveMode);
}

#[test]
fn move_to_shortcut_reaches_target_then_cancels_once() {
    let mut config = DeskConfig::default();
    config.sequencing.move_to_target = 20_100;
    let mut desk = Desk::new(config, 20_000, 20_000);
    desk.click(ButtonId::Main);
    desk.click(ButtonId::Shortcut2);
    assert!(desk.run_until(300, |d| d.state() == GearboxState::DriveMode).is_some());
    assert_eq!(desk.ui(), UiState::MoveTo);

    let arrived = desk.run_until(1_000, |d| d.positions() == (20_100, 20_100));
    assert!(arrived.is_some(), "stopped at {:?}", desk.positions());
    assert_eq!(desk.step(), Action::DriveTo(20_100));

    desk.click(ButtonId::Shortcut1);
    assert_eq!(desk.step(), Action::Halt);
    assert_eq!(desk.ui(), UiState::DriveControl);
    assert_eq!(desk.step(), Action::Poll);
}

#[test]
fn move_to_cancelled_together_with_main_click_halts_and_locks() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.click(ButtonId::Main);
    desk.click(ButtonId::Shortcut2);
    assert!(desk.run_until(300, |d| d.state() == GearboxState::DriveMode).is_some());
    desk.run(50);
    assert!(desk.hardware(LEFT).lock().motor().is_running());

    desk.click(ButtonId::Shortcut1);
    desk.click(ButtonId::Main);
    assert_eq!(desk.step(), Action::Halt);
    assert_eq!(desk.ui(), UiState::Idle);
    assert_eq!(desk.state(), GearboxState::Stop);
    let halted = desk.positions();

    let locked = desk.run_until(400, |d| d.state() == GearboxState::OnBrake);
    assert!(locked.is_some(), "lock stuck in {:?}", desk.state());
    assert_eq!(desk.positions(), halted);

    // no leftover halt once the desk is driven again
    desk.unlock();
    assert_eq!(desk.step(), Action::Poll);
}

#[test]
fn main_click_locks_desk_again() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.unlock();

    desk.click(ButtonId::Main);
    desk.step();
    assert_eq!(desk.ui(), UiState::Idle);
    assert_eq!(desk.state(), GearboxState::Stop);

    let locked = desk.run_until(400, |d| d.state() == GearboxState::OnBrake);
    assert!(locked.is_some(), "lock stuck in {:?}", desk.state());

    let power = desk.coordinator.power();
    assert!(!power.gearbox_power);
    assert!(!power.motor_power_supply);
    for address in [LEFT, RIGHT] {
        let hw = desk.hardware(address);
        let hw = hw.lock();
        assert!(!hw.outputs().motor_enabled());
        assert_eq!(hw.brake_state(), BrakeState::Locked);
    }
    assert!(!desk.coordinator.context().drives.powered());
    assert_eq!(desk.step(), Action::Poll);
}

#[test]
fn stop_needs_consecutive_unchanged_samples() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.unlock();
    desk.click(ButtonId::Main);
    desk.step();
    assert_eq!(desk.state(), GearboxState::Stop);

    // reference sample, then one unchanged sample
    desk.step();
    desk.step();
    assert_eq!(desk.state(), GearboxState::Stop);

    desk.step();
    assert_eq!(desk.state(), GearboxState::LockingBrakes);
}

#[test]
fn moving_again_while_stopping_returns_to_drive() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.unlock();
    desk.click(ButtonId::Main);
    desk.step();
    assert_eq!(desk.state(), GearboxState::Stop);

    desk.click(ButtonId::Main);
    desk.step();
    assert_eq!(desk.state(), GearboxState::DriveMode);
}

#[test]
fn moving_again_while_locking_unlocks_again() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.unlock();
    desk.click(ButtonId::Main);
    assert!(desk.run_until(20, |d| d.state() == GearboxState::LockingBrakes).is_some());

    desk.click(ButtonId::Main);
    assert_eq!(desk.step(), Action::GearboxPower(true));
    assert_eq!(desk.state(), GearboxState::UnlockingBrakes);
    assert!(desk.run_until(300, |d| d.state() == GearboxState::DriveMode).is_some());
}
