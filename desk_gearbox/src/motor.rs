//! Desk motor control on top of a [`Stepper`].
//!
//! The coordinator sends a move command every input interval. Each
//! `move_up`/`move_down` plans only as far as the motor can travel until the
//! next command arrives plus the distance it needs to brake from there, so a
//! missing command brings the desk to rest instead of running away.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use desk_common::config::GearboxConfig;
use tracing::{debug, trace};

use crate::stepper::Stepper;

/// Steps the drive lost to slip, shared between the step task and whoever
/// detects the slip.
#[derive(Debug, Clone, Default)]
pub struct SkippedSteps(Arc<AtomicI32>);

impl SkippedSteps {
    /// Record `steps` additional lost steps.
    #[inline]
    pub fn add(&self, steps: i32) {
        self.0.fetch_add(steps, Ordering::AcqRel);
    }

    /// Take the accumulated count, resetting it to zero.
    #[inline]
    pub fn take(&self) -> i32 {
        self.0.swap(0, Ordering::AcqRel)
    }

    /// Current count without resetting.
    #[inline]
    pub fn pending(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Main desk motor.
pub struct DeskMotor<S: Stepper> {
    stepper: S,
    config: GearboxConfig,
    running: bool,
    target: u32,
    target_dirty: bool,
    skipped: SkippedSteps,
    iterations: u32,
}

impl<S: Stepper> DeskMotor<S> {
    pub fn new(stepper: S, config: GearboxConfig) -> Self {
        let mut motor = Self {
            stepper,
            config,
            running: false,
            target: 0,
            target_dirty: false,
            skipped: SkippedSteps::default(),
            iterations: 0,
        };
        motor.target = motor.clamp(motor.stepper.current_position());
        motor
    }

    #[inline]
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop stepping immediately and hold the current position.
    pub fn stop(&mut self) {
        self.running = false;
        self.stepper.halt();
        self.target = self.position();
        self.target_dirty = false;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current position clamped to the `u32` wire range.
    pub fn position(&self) -> u32 {
        self.stepper.current_position().clamp(0, i64::from(u32::MAX)) as u32
    }

    #[inline]
    pub fn target(&self) -> u32 {
        self.target
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.stepper.speed()
    }

    /// Handle for reporting lost steps from another context.
    pub fn skipped_steps(&self) -> SkippedSteps {
        self.skipped.clone()
    }

    /// Set an absolute target, clamped to the configured step range.
    pub fn move_to(&mut self, target: u32) {
        self.set_target(i64::from(target));
    }

    /// Extend travel upward by one command interval, shortened by `penalty`.
    ///
    /// Ignored while the motor is still heading down.
    pub fn move_up(&mut self, penalty: u32) {
        if self.stepper.distance_to_go() < 0 {
            trace!("move_up ignored, motor still moving down");
            return;
        }
        let travel = self.travel_after_penalty(penalty);
        self.set_target(self.stepper.current_position() + travel);
    }

    /// Extend travel downward by one command interval, shortened by `penalty`.
    ///
    /// Ignored while the motor is still heading up.
    pub fn move_down(&mut self, penalty: u32) {
        if self.stepper.distance_to_go() > 0 {
            trace!("move_down ignored, motor still moving up");
            return;
        }
        let travel = self.travel_after_penalty(penalty);
        self.set_target(self.stepper.current_position() - travel);
    }

    /// One step-timer iteration.
    ///
    /// `enabled` is the state of the motor control and power outputs; the
    /// stepper only advances while running and enabled. Skipped steps are
    /// reconciled every `skipped_steps_update_iterations` regardless.
    pub fn step(&mut self, enabled: bool) {
        if self.running && enabled {
            if self.target_dirty {
                self.stepper.move_to(i64::from(self.target));
                self.target_dirty = false;
            }
            self.stepper.run();
        }

        self.iterations += 1;
        if self.iterations >= self.config.skipped_steps_update_iterations {
            self.iterations = 0;
            let missing = self.skipped.take();
            if missing != 0 {
                self.stepper.fix_missing_steps(missing);
                debug!(missing, position = self.position(), "Reconciled skipped steps");
            }
            if self.running {
                self.stepper.move_to(i64::from(self.target));
                self.target_dirty = false;
            }
        }
    }

    /// Steps reachable within one command interval plus the stopping
    /// distance from the speed reached at its end, with the buffer applied.
    pub fn planned_travel(&self) -> f32 {
        let v0 = self.stepper.speed().abs();
        let a = self.config.max_acceleration;
        let v_max = self.config.max_speed;
        let dt = self.config.move_input_interval_ms as f32 / 1000.0;

        let (interval_distance, end_speed) = if v0 + a * dt > v_max {
            let t_acc = ((v_max - v0) / a).clamp(0.0, dt);
            (
                v0 * t_acc + 0.5 * a * t_acc * t_acc + v_max * (dt - t_acc),
                v_max,
            )
        } else {
            (v0 * dt + 0.5 * a * dt * dt, v0 + a * dt)
        };
        let stopping_distance = end_speed * end_speed / (2.0 * a);

        (interval_distance + stopping_distance) * (1.0 + self.config.up_down_step_buffer_factor)
    }

    fn travel_after_penalty(&self, penalty: u32) -> i64 {
        let travel = self.planned_travel().ceil() as i64;
        (travel - i64::from(penalty)).max(0)
    }

    fn set_target(&mut self, target: i64) {
        self.target = self.clamp(target);
        self.target_dirty = true;
    }

    fn clamp(&self, position: i64) -> u32 {
        position.clamp(
            i64::from(self.config.min_steps),
            i64::from(self.config.max_steps),
        ) as u32
    }
}
