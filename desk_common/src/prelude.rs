//! Prelude module for common re-exports.
//!
//! ```rust
//! use desk_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, DeskConfig, GearboxConfig, LogLevel};

// ─── Protocol ───────────────────────────────────────────────────────
pub use crate::protocol::{BrakeState, GearboxCommand, GearboxStatus, ProtocolError};

// ─── Deviation ──────────────────────────────────────────────────────
pub use crate::deviation::{DeviationError, DeviationLimits, deviation, soft_limit_correction};

// ─── Input ──────────────────────────────────────────────────────────
pub use crate::input::{ButtonEvent, ButtonId, InputEvent};
pub use crate::panel::{PanelError, PanelMessage};

// ─── Bus ────────────────────────────────────────────────────────────
pub use crate::bus::{BusError, BusTransport};
