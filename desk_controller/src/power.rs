//! Coordinator-local power rails: gearbox supply and motor power supply.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::PowerError;

/// The two rails switched by the coordinator itself.
pub trait PowerSwitches: Send {
    fn set_gearbox_power(&mut self, on: bool) -> Result<(), PowerError>;
    fn set_motor_power_supply(&mut self, on: bool) -> Result<(), PowerError>;
}

impl<T: PowerSwitches + ?Sized> PowerSwitches for Box<T> {
    fn set_gearbox_power(&mut self, on: bool) -> Result<(), PowerError> {
        (**self).set_gearbox_power(on)
    }

    fn set_motor_power_supply(&mut self, on: bool) -> Result<(), PowerError> {
        (**self).set_motor_power_supply(on)
    }
}

/// In-memory rails with failure injection.
#[derive(Debug, Clone, Default)]
pub struct SimPowerSwitches {
    pub gearbox_power: bool,
    pub motor_power_supply: bool,
    fail_remaining: u32,
    switch_count: u32,
}

impl SimPowerSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` switch operations.
    pub fn fail_next(&mut self, n: u32) {
        self.fail_remaining = n;
    }

    /// Successful switch operations so far.
    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    fn apply(&mut self, name: &'static str, on: bool) -> Result<bool, PowerError> {
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            return Err(PowerError::Unavailable(name));
        }
        self.switch_count += 1;
        Ok(on)
    }
}

impl PowerSwitches for SimPowerSwitches {
    fn set_gearbox_power(&mut self, on: bool) -> Result<(), PowerError> {
        self.gearbox_power = self.apply("gearbox_power", on)?;
        Ok(())
    }

    fn set_motor_power_supply(&mut self, on: bool) -> Result<(), PowerError> {
        self.motor_power_supply = self.apply("motor_power_supply", on)?;
        Ok(())
    }
}

/// Rails driven through sysfs GPIO `value` files.
#[derive(Debug, Clone)]
pub struct SysfsPowerSwitches {
    gearbox_power: PathBuf,
    motor_power_supply: PathBuf,
    state: (Option<bool>, Option<bool>),
}

impl SysfsPowerSwitches {
    pub fn new(gearbox_power: impl Into<PathBuf>, motor_power_supply: impl Into<PathBuf>) -> Self {
        let s = Self {
            gearbox_power: gearbox_power.into(),
            motor_power_supply: motor_power_supply.into(),
            state: (None, None),
        };
        info!(
            gearbox = %s.gearbox_power.display(),
            motor = %s.motor_power_supply.display(),
            "GPIO power switches"
        );
        s
    }

    fn write(path: &Path, switch: &'static str, on: bool) -> Result<(), PowerError> {
        debug!(switch, on, "Writing GPIO");
        fs::write(path, if on { "1" } else { "0" })
            .map_err(|source| PowerError::Io { switch, source })
    }
}

impl PowerSwitches for SysfsPowerSwitches {
    fn set_gearbox_power(&mut self, on: bool) -> Result<(), PowerError> {
        if self.state.0 != Some(on) {
            Self::write(&self.gearbox_power, "gearbox_power", on)?;
            self.state.0 = Some(on);
        }
        Ok(())
    }

    fn set_motor_power_supply(&mut self, on: bool) -> Result<(), PowerError> {
        if self.state.1 != Some(on) {
            Self::write(&self.motor_power_supply, "motor_power_supply", on)?;
            self.state.1 = Some(on);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_records_state() {
        let mut p = SimPowerSwitches::new();
        p.set_gearbox_power(true).unwrap();
        p.set_motor_power_supply(true).unwrap();
        assert!(p.gearbox_power && p.motor_power_supply);
        p.set_gearbox_power(false).unwrap();
        assert!(!p.gearbox_power);
        assert_eq!(p.switch_count(), 3);
    }

    #[test]
    fn injected_failure_keeps_state() {
        let mut p = SimPowerSwitches::new();
        p.fail_next(1);
        assert!(p.set_gearbox_power(true).is_err());
        assert!(!p.gearbox_power);
        assert!(p.set_gearbox_power(true).is_ok());
        assert!(p.gearbox_power);
    }

    #[test]
    fn sysfs_writes_value_files() {
        let dir = tempfile::tempdir().unwrap();
        let g = dir.path().join("gearbox");
        let m = dir.path().join("motor");
        let mut p = SysfsPowerSwitches::new(&g, &m);
        p.set_gearbox_power(true).unwrap();
        p.set_motor_power_supply(false).unwrap();
        assert_eq!(fs::read_to_string(&g).unwrap(), "1");
        assert_eq!(fs::read_to_string(&m).unwrap(), "0");
    }

    #[test]
    fn sysfs_missing_directory_is_io_error() {
        let mut p = SysfsPowerSwitches::new("/nonexistent/gpio/value", "/nonexistent/gpio/value2");
        assert!(matches!(p.set_gearbox_power(true), Err(PowerError::Io { .. })));
    }
}
