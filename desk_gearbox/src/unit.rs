//! Gearbox hardware: main motor, two brakes, driver outputs.

use desk_common::config::GearboxConfig;
use desk_common::protocol::{BrakeState, GearboxStatus};
use tracing::info;

use crate::brake::{Brake, BrakeActuator, SimBrakeActuator, combine_brake_states};
use crate::motor::{DeskMotor, SkippedSteps};
use crate::stepper::{SimStepper, Stepper};

/// Operations the command protocol performs on the local hardware.
pub trait GearboxHardware: Send {
    fn position(&self) -> u32;
    fn brake_state(&self) -> BrakeState;
    fn start_motor(&mut self);
    fn stop_motor(&mut self);
    fn move_up(&mut self, penalty: u32);
    fn move_down(&mut self, penalty: u32);
    fn move_to(&mut self, target: u32);
    fn loosen_brake(&mut self);
    fn fasten_brake(&mut self);
    fn set_motor_control(&mut self, enable: bool);
    fn set_motor_control_power(&mut self, enable: bool);

    /// Position and brake state as sent on the wire.
    fn status(&self) -> GearboxStatus {
        GearboxStatus {
            position: self.position(),
            brake: self.brake_state(),
        }
    }
}

/// Anything advanced by the step timer.
pub trait StepTarget: Send {
    fn step(&mut self);
}

/// Motor driver enable and driver power rail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerOutputs {
    pub motor_control: bool,
    pub motor_control_power: bool,
}

impl PowerOutputs {
    /// The motor can only step with both outputs on.
    #[inline]
    pub const fn motor_enabled(&self) -> bool {
        self.motor_control && self.motor_control_power
    }
}

/// One gearbox.
pub struct GearboxUnit<S: Stepper, A: BrakeActuator> {
    motor: DeskMotor<S>,
    primary_brake: Brake<A>,
    secondary_brake: Brake<A>,
    outputs: PowerOutputs,
}

/// Fully simulated gearbox.
pub type SimGearbox = GearboxUnit<SimStepper, SimBrakeActuator>;

impl<S: Stepper, A: BrakeActuator> GearboxUnit<S, A> {
    pub fn new(motor: DeskMotor<S>, primary_brake: Brake<A>, secondary_brake: Brake<A>) -> Self {
        Self {
            motor,
            primary_brake,
            secondary_brake,
            outputs: PowerOutputs::default(),
        }
    }

    #[inline]
    pub fn motor(&self) -> &DeskMotor<S> {
        &self.motor
    }

    #[inline]
    pub fn outputs(&self) -> PowerOutputs {
        self.outputs
    }

    pub fn skipped_steps(&self) -> SkippedSteps {
        self.motor.skipped_steps()
    }

    pub fn brakes_mut(&mut self) -> (&mut Brake<A>, &mut Brake<A>) {
        (&mut self.primary_brake, &mut self.secondary_brake)
    }
}

impl SimGearbox {
    /// Simulated gearbox resting at `position` with both brakes closed.
    pub fn simulated(config: &GearboxConfig, position: u32) -> Self {
        let stepper = SimStepper::new(config.max_speed, config.max_acceleration, config.step_interval())
            .with_position(i64::from(position));
        let brake = || SimBrakeActuator::new(config.brake_travel_steps, config.brake_steps_per_iteration);
        Self::new(
            DeskMotor::new(stepper, *config),
            Brake::new("primary", brake()),
            Brake::new("secondary", brake()),
        )
    }
}

impl<S: Stepper, A: BrakeActuator> GearboxHardware for GearboxUnit<S, A> {
    fn position(&self) -> u32 {
        self.motor.position()
    }

    fn brake_state(&self) -> BrakeState {
        combine_brake_states(self.primary_brake.state(), self.secondary_brake.state())
    }

    fn start_motor(&mut self) {
        self.motor.start();
    }

    fn stop_motor(&mut self) {
        self.motor.stop();
    }

    fn move_up(&mut self, penalty: u32) {
        self.motor.move_up(penalty);
    }

    fn move_down(&mut self, penalty: u32) {
        self.motor.move_down(penalty);
    }

    fn move_to(&mut self, target: u32) {
        self.motor.move_to(target);
    }

    fn loosen_brake(&mut self) {
        self.primary_brake.loosen();
        self.secondary_brake.loosen();
    }

    fn fasten_brake(&mut self) {
        self.primary_brake.fasten();
        self.secondary_brake.fasten();
    }

    fn set_motor_control(&mut self, enable: bool) {
        if self.outputs.motor_control != enable {
            info!(enable, "Motor control output");
        }
        self.outputs.motor_control = enable;
    }

    fn set_motor_control_power(&mut self, enable: bool) {
        if self.outputs.motor_control_power != enable {
            info!(enable, "Motor control power output");
        }
        self.outputs.motor_control_power = enable;
    }
}

impl<S: Stepper, A: BrakeActuator> StepTarget for GearboxUnit<S, A> {
    fn step(&mut self) {
        self.motor.step(self.outputs.motor_enabled());
        self.primary_brake.step();
        self.secondary_brake.step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> SimGearbox {
        SimGearbox::simulated(&GearboxConfig::default(), 10_000)
    }

    #[test]
    fn starts_locked_and_disabled() {
        let u = unit();
        assert_eq!(u.status(), GearboxStatus { position: 10_000, brake: BrakeState::Locked });
        assert!(!u.outputs().motor_enabled());
    }

    #[test]
    fn brakes_open_together() {
        let mut u = unit();
        u.loosen_brake();
        u.step();
        assert_eq!(u.brake_state(), BrakeState::Intermediate);
        for _ in 0..GearboxConfig::default().brake_travel_steps {
            u.step();
        }
        assert_eq!(u.brake_state(), BrakeState::Unlocked);
    }

    #[test]
    fn motor_needs_both_outputs() {
        let mut u = unit();
        u.start_motor();
        u.move_to(20_000);
        u.set_motor_control(true);
        for _ in 0..20_000 {
            u.step();
        }
        assert_eq!(u.position(), 10_000);

        u.set_motor_control_power(true);
        for _ in 0..20_000 {
            u.step();
        }
        assert!(u.position() > 10_000);
    }
}
