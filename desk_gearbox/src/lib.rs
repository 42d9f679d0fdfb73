//! Gearbox peripheral node.
//!
//! Each side of the desk runs one node. The coordinator addresses it over the
//! bus; [`protocol::GearboxProtocol`] executes the command against the local
//! [`unit::GearboxUnit`] and replies with position and brake state. A
//! [`timer::StepTimer`] drives the motor and brake actuator at a fixed
//! cadence, decoupled from the command rate.
//!
//! # Module Structure
//!
//! - [`stepper`] - `Stepper` trait and an acceleration-limited simulation
//! - [`motor`] - `DeskMotor`: travel planning, clamping, skipped-step reconciliation
//! - [`brake`] - `Brake` over a `BrakeActuator` with light-gate feedback
//! - [`unit`] - `GearboxUnit` and the `GearboxHardware` seam used by the protocol
//! - [`protocol`] - Command execution and local deviation safety
//! - [`timer`] - Periodic step scheduling (ticker + due-count + worker)
//! - [`node`] - Protocol plus hardware plus timer, as one addressable node
//! - [`sim`] - In-process `SimulatedBus` routing frames to nodes

pub mod brake;
pub mod motor;
pub mod node;
pub mod protocol;
pub mod sim;
pub mod stepper;
pub mod timer;
pub mod unit;

pub use node::GearboxNode;
pub use protocol::GearboxProtocol;
pub use sim::SimulatedBus;
pub use unit::{GearboxHardware, GearboxUnit, SimGearbox};
