//! Integration test: brake unlock sequencing against misbehaving gearboxes.
//!
//! Validates:
//! 1. A step without acknowledgement is retried, never skipped
//! 2. Brakes that do not open fall back to a short upward drive
//! 3. Sensor faults are reported and can be overridden by configuration

use desk_common::config::DeskConfig;
use desk_common::input::ButtonId;
use desk_common::protocol::BrakeState;
use desk_controller::error::LinkFaults;
use desk_controller::state::sequence::UnlockStep;
use desk_controller::{Action, GearboxState};
use desk_gearbox::GearboxHardware;

use super::desk::{Desk, LEFT, RIGHT};

// ── Helpers ─────────────────────────────────────────────────────────

fn unlock_step(desk: &Desk) -> UnlockStep {
    desk.coordinator.context().unlock.step()
}

fn reach_step(desk: &mut Desk, step: UnlockStep) {
    let reached = desk.run_until(300, |d| unlock_step(d) == step);
    assert!(reached.is_some(), "stuck at {:?}", unlock_step(desk));
}

fn jam_brakes(desk: &Desk, address: u8) {
    let hw = desk.hardware(address);
    let mut hw = hw.lock();
    let (primary, secondary) = hw.brakes_mut();
    primary.actuator_mut().jam();
    secondary.actuator_mut().jam();
}

fn fault_brake_sensors(desk: &Desk, address: u8) {
    let hw = desk.hardware(address);
    let mut hw = hw.lock();
    let (primary, secondary) = hw.brakes_mut();
    primary.actuator_mut().set_sensor_fault(true);
    secondary.actuator_mut().set_sensor_fault(true);
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn unacknowledged_step_is_retried_not_skipped() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.click(ButtonId::Main);
    reach_step(&mut desk, UnlockStep::SwitchOnMotorPowerSupply);
    desk.set_offline(RIGHT, true);
    reach_step(&mut desk, UnlockStep::SwitchOnMotorControlPower);

    let actions = desk.run(60);
    assert!(actions.iter().all(|a| *a == Action::MotorControlPower(true)));
    assert_eq!(unlock_step(&desk), UnlockStep::SwitchOnMotorControlPower);
    assert!(desk.coordinator.context().unlock.failures() >= 2);
    assert!(desk.coordinator.link().faults().contains(LinkFaults::RIGHT_UNREACHABLE));
    assert!(!desk.hardware(RIGHT).lock().outputs().motor_control_power);

    desk.set_offline(RIGHT, false);
    reach_step(&mut desk, UnlockStep::SwitchOnMotorControl);
    assert!(desk.hardware(RIGHT).lock().outputs().motor_control_power);
    assert!(desk.coordinator.link().faults().is_empty());
}

#[test]
fn failed_power_rail_is_retried() {
    let mut desk = Desk::at(20_000, 20_000);
    desk.coordinator.power_mut().fail_next(30);
    desk.click(ButtonId::Main);

    let actions = desk.run(25);
    assert!(actions.iter().all(|a| *a == Action::GearboxPower(true)));
    assert_eq!(unlock_step(&desk), UnlockStep::SwitchOnGearboxPower);
    assert_eq!(desk.coordinator.context().unlock.failures(), 1);
    assert!(!desk.coordinator.power().gearbox_power);

    reach_step(&mut desk, UnlockStep::SwitchOnMotorPowerSupply);
    assert_eq!(desk.coordinator.context().unlock.failures(), 0);
}

#[test]
fn jammed_brake_falls_back_to_drive_up() {
    let mut config = DeskConfig::default();
    config.timing.brake_unlock_timeout_ms = 500;
    let mut desk = Desk::new(config, 20_000, 20_000);
    jam_brakes(&desk, RIGHT);
    desk.click(ButtonId::Main);
    reach_step(&mut desk, UnlockStep::UnlockBrakes);

    reach_step(&mut desk, UnlockStep::UnlockDriveUp);
    assert_eq!(desk.step(), Action::DriveUp);
    assert_eq!(desk.coordinator.context().unlock.failures(), 1);
    assert_eq!(desk.hardware(LEFT).lock().brake_state(), BrakeState::Unlocked);
    assert_eq!(desk.hardware(RIGHT).lock().brake_state(), BrakeState::Locked);

    reach_step(&mut desk, UnlockStep::UnlockBrakes);
    assert_eq!(desk.step(), Action::LoosenBrakes);
    assert_eq!(desk.state(), GearboxState::UnlockingBrakes);
}

#[test]
fn brake_sensor_fault_blocks_unlock() {
    let mut config = DeskConfig::default();
    config.timing.brake_unlock_timeout_ms = 500;
    let mut desk = Desk::new(config, 20_000, 20_000);
    fault_brake_sensors(&desk, LEFT);
    desk.click(ButtonId::Main);

    reach_step(&mut desk, UnlockStep::UnlockDriveUp);
    assert_eq!(desk.state(), GearboxState::UnlockingBrakes);
    assert_eq!(desk.coordinator.telemetry().left.brake, BrakeState::Error);
    assert!(desk.coordinator.link().faults().contains(LinkFaults::BRAKE_SENSOR));
}

#[test]
fn assumed_unlock_overrides_brake_sensor_fault() {
    let mut config = DeskConfig::default();
    config.sequencing.assume_brakes_unlocked = true;
    let mut desk = Desk::new(config, 20_000, 20_000);
    fault_brake_sensors(&desk, LEFT);

    desk.unlock();
    assert_eq!(desk.coordinator.context().unlock.failures(), 0);
}

#[test]
fn assumed_lock_overrides_brake_sensor_fault() {
    let mut config = DeskConfig::default();
    config.sequencing.assume_brakes_locked = true;
    let mut desk = Desk::new(config, 20_000, 20_000);
    desk.unlock();
    fault_brake_sensors(&desk, RIGHT);

    desk.click(ButtonId::Main);
    let locked = desk.run_until(400, |d| d.state() == GearboxState::OnBrake);
    assert!(locked.is_some(), "lock stuck in {:?}", desk.state());
    assert!(!desk.coordinator.power().gearbox_power);
}
