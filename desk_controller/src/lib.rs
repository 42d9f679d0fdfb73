//! # Desk Controller Library
//!
//! General controller of the dual-gearbox desk. Every control cycle it
//! applies panel input to the UI sub-machine, guards the left/right
//! deviation, runs the gearbox state machine (brake unlock/lock sequencing,
//! drive, emergency stop and recovery) and sends one command to each
//! gearbox.
//!
//! ## Layout
//!
//! - [`state`]: UI sub-machine, gearbox state machine, brake sequences
//! - [`safety`]: deviation guard, standstill detection, recovery
//! - [`context`]: runtime state shared by the machines
//! - [`coordinator`]: one control cycle
//! - [`link`]: gearbox bus client and the Linux I2C transport
//! - [`panel`]: panel frame reassembly and the input event queue
//! - [`power`]: coordinator-local power rails
//! - [`cycle`]: fixed-period loop, statistics and RT setup

pub mod context;
pub mod coordinator;
pub mod cycle;
pub mod error;
pub mod link;
pub mod panel;
pub mod power;
pub mod safety;
pub mod state;

pub use coordinator::Coordinator;
pub use cycle::CycleRunner;
pub use state::gearbox::{Action, GearboxState};
pub use state::ui::UiState;
