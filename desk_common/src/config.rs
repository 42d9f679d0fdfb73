//! Configuration loading traits and types.
//!
//! Every field defaults to the matching constant in [`crate::consts`], so an
//! empty file (or no file at all) yields the built-in configuration.
//!
//! # TOML Example
//!
//! ```toml
//! log_level = "debug"
//!
//! [deviation]
//! hard = 1000
//! soft = 400
//!
//! [bus]
//! timeout_ms = 20
//!
//! [sequencing]
//! assume_brakes_unlocked = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::consts::*;
use crate::deviation::DeviationLimits;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level, lowercase in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string for an `EnvFilter`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ─── Sections ───────────────────────────────────────────────────────

/// Gearbox bus addressing and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub left_address: u8,
    pub right_address: u8,
    /// Bound on a single transaction [ms].
    pub timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            left_address: GEARBOX_LEFT_ADDRESS,
            right_address: GEARBOX_RIGHT_ADDRESS,
            timeout_ms: BUS_TIMEOUT_MS,
        }
    }
}

impl BusConfig {
    #[inline]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Coordinator cycle and sequencing dwell times, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub cycle_time_ms: u64,
    pub power_step_dwell_ms: u64,
    pub brake_step_dwell_ms: u64,
    pub brake_unlock_timeout_ms: u64,
    pub unlock_drive_up_ms: u64,
    /// Cycles between statistics log lines (0 disables).
    pub stats_interval_cycles: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_time_ms: CYCLE_TIME_MS,
            power_step_dwell_ms: POWER_STEP_DWELL_MS,
            brake_step_dwell_ms: BRAKE_STEP_DWELL_MS,
            brake_unlock_timeout_ms: BRAKE_UNLOCK_TIMEOUT_MS,
            unlock_drive_up_ms: UNLOCK_DRIVE_UP_MS,
            stats_interval_cycles: 1000,
        }
    }
}

impl TimingConfig {
    #[inline]
    pub const fn cycle_time(&self) -> Duration {
        Duration::from_millis(self.cycle_time_ms)
    }
    #[inline]
    pub const fn power_step_dwell(&self) -> Duration {
        Duration::from_millis(self.power_step_dwell_ms)
    }
    #[inline]
    pub const fn brake_step_dwell(&self) -> Duration {
        Duration::from_millis(self.brake_step_dwell_ms)
    }
    #[inline]
    pub const fn brake_unlock_timeout(&self) -> Duration {
        Duration::from_millis(self.brake_unlock_timeout_ms)
    }
    #[inline]
    pub const fn unlock_drive_up(&self) -> Duration {
        Duration::from_millis(self.unlock_drive_up_ms)
    }
}

/// Brake sequencing behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencingConfig {
    /// Complete the unlock step on dwell expiry without sensor confirmation.
    pub assume_brakes_unlocked: bool,
    /// Complete the lock step on dwell expiry without sensor confirmation.
    pub assume_brakes_locked: bool,
    /// Failed acknowledgements per step before an error is logged.
    pub max_action_retries: u32,
    pub stop_standstill_samples: u8,
    pub emergency_standstill_samples: u8,
    /// Target of the move-to shortcut [steps].
    pub move_to_target: u32,
}

impl Default for SequencingConfig {
    fn default() -> Self {
        Self {
            assume_brakes_unlocked: false,
            assume_brakes_locked: false,
            max_action_retries: MAX_ACTION_RETRIES,
            stop_standstill_samples: STOP_STANDSTILL_SAMPLES,
            emergency_standstill_samples: EMERGENCY_STANDSTILL_SAMPLES,
            move_to_target: MOVE_TO_TARGET,
        }
    }
}

/// Gearbox node motion, step timer and brake actuator settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GearboxConfig {
    pub min_steps: u32,
    pub max_steps: u32,
    /// [steps/s]
    pub max_speed: f32,
    /// [steps/s²]
    pub max_acceleration: f32,
    /// Expected interval between move commands [ms].
    pub move_input_interval_ms: u64,
    pub up_down_step_buffer_factor: f32,
    /// Step timer period [µs].
    pub step_interval_us: u64,
    pub skipped_steps_update_iterations: u32,
    pub brake_travel_steps: i32,
    pub brake_steps_per_iteration: i32,
}

impl Default for GearboxConfig {
    fn default() -> Self {
        Self {
            min_steps: MIN_STEPS,
            max_steps: MAX_STEPS,
            max_speed: MOTOR_MAX_SPEED,
            max_acceleration: MOTOR_MAX_ACCELERATION,
            move_input_interval_ms: MOVE_INPUT_INTERVAL_MS,
            up_down_step_buffer_factor: UP_DOWN_STEP_BUFFER_FACTOR,
            step_interval_us: STEP_INTERVAL_US,
            skipped_steps_update_iterations: SKIPPED_STEPS_UPDATE_ITERATIONS,
            brake_travel_steps: BRAKE_TRAVEL_STEPS,
            brake_steps_per_iteration: BRAKE_STEPS_PER_ITERATION,
        }
    }
}

impl GearboxConfig {
    #[inline]
    pub const fn step_interval(&self) -> Duration {
        Duration::from_micros(self.step_interval_us)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps <= self.min_steps {
            return invalid(format!(
                "gearbox.max_steps ({}) must exceed gearbox.min_steps ({})",
                self.max_steps, self.min_steps
            ));
        }
        if !(self.max_speed > 0.0) || !(self.max_acceleration > 0.0) {
            return invalid("gearbox.max_speed and gearbox.max_acceleration must be > 0");
        }
        if self.step_interval_us == 0 {
            return invalid("gearbox.step_interval_us must be > 0");
        }
        if self.skipped_steps_update_iterations == 0 {
            return invalid("gearbox.skipped_steps_update_iterations must be > 0");
        }
        if self.brake_travel_steps <= 0 || self.brake_steps_per_iteration <= 0 {
            return invalid("gearbox brake travel and step rate must be > 0");
        }
        if !(self.up_down_step_buffer_factor >= 0.0) {
            return invalid("gearbox.up_down_step_buffer_factor must be >= 0");
        }
        Ok(())
    }
}

// ─── Root ───────────────────────────────────────────────────────────

/// Complete desk configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeskConfig {
    pub log_level: LogLevel,
    pub deviation: DeviationLimits,
    pub bus: BusConfig,
    pub timing: TimingConfig,
    pub sequencing: SequencingConfig,
    pub gearbox: GearboxConfig,
}

impl DeskConfig {
    /// Load from `path` if given, otherwise return defaults. Always validated.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - deviation limits are not ordered `0 < soft < hard`, `stop_recovery < hard`
    /// - the two bus addresses are equal or the bus timeout is zero
    /// - the cycle time or any dwell is zero
    /// - a standstill sample count is zero
    /// - the gearbox section is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.deviation
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.bus.left_address == self.bus.right_address {
            return invalid(format!(
                "bus.left_address and bus.right_address are both 0x{:02x}",
                self.bus.left_address
            ));
        }
        if self.bus.timeout_ms == 0 {
            return invalid("bus.timeout_ms must be > 0");
        }

        let t = &self.timing;
        if t.cycle_time_ms == 0 {
            return invalid("timing.cycle_time_ms must be > 0");
        }
        if t.power_step_dwell_ms == 0 || t.brake_step_dwell_ms == 0 {
            return invalid("timing dwell times must be > 0");
        }
        if t.brake_unlock_timeout_ms < t.brake_step_dwell_ms {
            return invalid(format!(
                "timing.brake_unlock_timeout_ms ({}) below brake_step_dwell_ms ({})",
                t.brake_unlock_timeout_ms, t.brake_step_dwell_ms
            ));
        }

        let s = &self.sequencing;
        if s.stop_standstill_samples == 0 || s.emergency_standstill_samples == 0 {
            return invalid("sequencing standstill sample counts must be > 0");
        }
        if s.move_to_target < self.gearbox.min_steps || s.move_to_target > self.gearbox.max_steps
        {
            return invalid(format!(
                "sequencing.move_to_target ({}) outside gearbox step range",
                s.move_to_target
            ));
        }

        self.gearbox.validate()
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, ConfigError> {
    Err(ConfigError::ValidationError(msg.into()))
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
