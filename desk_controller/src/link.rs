//! Gearbox bus client and transports.

pub mod gearbox;
pub mod i2c;

pub use gearbox::{GearboxLink, GearboxSession, Side, Telemetry};
pub use i2c::I2cBus;
