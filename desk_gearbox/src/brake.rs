//! Brake actuator with light-gate feedback.
//!
//! A small stepper pushes the brake pin between two light gates. The gate
//! pair is the only feedback; see [`BrakeState::from_light_gates`].

use desk_common::protocol::BrakeState;
use tracing::debug;

/// Brake actuator hardware.
pub trait BrakeActuator: Send {
    /// Command travel toward the open end.
    fn open(&mut self);

    /// Command travel toward the closed end.
    fn close(&mut self);

    /// Advance one step-timer iteration.
    fn step(&mut self);

    /// `(open_blocked, closed_blocked)`.
    fn light_gates(&self) -> (bool, bool);
}

/// One brake.
pub struct Brake<A: BrakeActuator> {
    name: &'static str,
    actuator: A,
}

impl<A: BrakeActuator> Brake<A> {
    pub fn new(name: &'static str, actuator: A) -> Self {
        Self { name, actuator }
    }

    pub fn loosen(&mut self) {
        debug!(brake = self.name, "Opening brake");
        self.actuator.open();
    }

    pub fn fasten(&mut self) {
        debug!(brake = self.name, "Closing brake");
        self.actuator.close();
    }

    #[inline]
    pub fn step(&mut self) {
        self.actuator.step();
    }

    pub fn state(&self) -> BrakeState {
        let (open, closed) = self.actuator.light_gates();
        BrakeState::from_light_gates(open, closed)
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }
}

/// Combined reading of the primary and secondary brake.
///
/// Any error wins; otherwise both must agree on Locked or Unlocked.
pub fn combine_brake_states(primary: BrakeState, secondary: BrakeState) -> BrakeState {
    match (primary, secondary) {
        (BrakeState::Error, _) | (_, BrakeState::Error) => BrakeState::Error,
        (BrakeState::Locked, BrakeState::Locked) => BrakeState::Locked,
        (BrakeState::Unlocked, BrakeState::Unlocked) => BrakeState::Unlocked,
        _ => BrakeState::Intermediate,
    }
}

/// Simulated brake actuator: position `0` is closed, `travel` is open.
#[derive(Debug, Clone)]
pub struct SimBrakeActuator {
    position: i32,
    target: i32,
    travel: i32,
    steps_per_iteration: i32,
    sensor_fault: bool,
}

impl SimBrakeActuator {
    /// New actuator resting closed.
    pub fn new(travel: i32, steps_per_iteration: i32) -> Self {
        Self {
            position: 0,
            target: 0,
            travel: travel.max(1),
            steps_per_iteration: steps_per_iteration.max(1),
            sensor_fault: false,
        }
    }

    /// Report both gates blocked, as with a broken sensor connection.
    pub fn set_sensor_fault(&mut self, fault: bool) {
        self.sensor_fault = fault;
    }

    /// Jam the actuator so commands no longer move it.
    pub fn jam(&mut self) {
        self.steps_per_iteration = 0;
    }

    pub fn position(&self) -> i32 {
        self.position
    }
}

impl BrakeActuator for SimBrakeActuator {
    fn open(&mut self) {
        self.target = self.travel;
    }

    fn close(&mut self) {
        self.target = 0;
    }

    fn step(&mut self) {
        let remaining = self.target - self.position;
        let delta = remaining.clamp(-self.steps_per_iteration, self.steps_per_iteration);
        self.position += delta;
    }

    fn light_gates(&self) -> (bool, bool) {
        if self.sensor_fault {
            return (true, true);
        }
        (self.position >= self.travel, self.position <= 0)
    }
}
