//! Stepper drive abstraction.
//!
//! [`SimStepper`] integrates a trapezoidal velocity profile at the step timer
//! rate: accelerate toward max speed, decelerate once the remaining distance
//! falls inside the stopping distance.

use std::time::Duration;

/// A stepper drive advanced once per step-timer iteration.
pub trait Stepper: Send {
    /// Current position [steps].
    fn current_position(&self) -> i64;

    /// Overwrite the position counter.
    fn set_current_position(&mut self, position: i64);

    /// Position the drive is moving toward [steps].
    fn target_position(&self) -> i64;

    /// Signed speed [steps/s]; positive is upward.
    fn speed(&self) -> f32;

    /// Set a new absolute target.
    fn move_to(&mut self, target: i64);

    /// Advance one iteration. Returns `true` while motion remains.
    fn run(&mut self) -> bool;

    /// Stop immediately and hold the current position.
    fn halt(&mut self);

    /// Remaining signed distance to the target [steps].
    fn distance_to_go(&self) -> i64 {
        self.target_position() - self.current_position()
    }

    /// Subtract steps the drive lost to slip from the position counter.
    fn fix_missing_steps(&mut self, missing: i32) {
        let position = self.current_position() - i64::from(missing);
        self.set_current_position(position);
    }
}

/// Acceleration-limited stepper simulation.
#[derive(Debug, Clone)]
pub struct SimStepper {
    position: i64,
    target: i64,
    speed: f32,
    max_speed: f32,
    acceleration: f32,
    dt: f32,
    /// Sub-step travel carried between iterations.
    fraction: f32,
}

impl SimStepper {
    /// Create a stepper at position 0.
    ///
    /// `iteration` is the step timer period.
    pub fn new(max_speed: f32, acceleration: f32, iteration: Duration) -> Self {
        Self {
            position: 0,
            target: 0,
            speed: 0.0,
            max_speed: max_speed.abs(),
            acceleration: acceleration.abs(),
            dt: iteration.as_secs_f32(),
            fraction: 0.0,
        }
    }

    /// Start at `position` instead of 0.
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self.target = position;
        self
    }
}

impl Stepper for SimStepper {
    fn current_position(&self) -> i64 {
        self.position
    }

    fn set_current_position(&mut self, position: i64) {
        self.position = position;
    }

    fn target_position(&self) -> i64 {
        self.target
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn move_to(&mut self, target: i64) {
        self.target = target;
    }

    fn run(&mut self) -> bool {
        let distance = self.target - self.position;
        let max_dv = self.acceleration * self.dt;
        let stopping = self.speed * self.speed / (2.0 * self.acceleration);

        // On target and able to stop within one step.
        if distance == 0 && stopping < 1.0 {
            self.speed = 0.0;
            self.fraction = 0.0;
            return false;
        }

        let direction = distance.signum() as f32;
        let approaching = self.speed * direction > 0.0;
        let desired = if distance == 0 || (approaching && distance.abs() as f32 <= stopping) {
            0.0
        } else {
            direction * self.max_speed
        };

        self.speed += (desired - self.speed).clamp(-max_dv, max_dv);
        self.fraction += self.speed * self.dt;

        while self.fraction >= 1.0 {
            self.position += 1;
            self.fraction -= 1.0;
        }
        while self.fraction <= -1.0 {
            self.position -= 1;
            self.fraction += 1.0;
        }
        true
    }

    fn halt(&mut self) {
        self.target = self.position;
        self.speed = 0.0;
        self.fraction = 0.0;
    }
}
