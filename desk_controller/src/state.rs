//! State machine module root.
//!
//! UI sub-machine, gearbox state machine and the brake sequences it runs.

pub mod gearbox;
pub mod sequence;
pub mod ui;
