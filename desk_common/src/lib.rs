//! Desk Common Library
//!
//! Shared definitions for the general controller and the two gearbox nodes
//! of the height-adjustable desk.
//!
//! # Module Structure
//!
//! - [`consts`] - Compile-time limits, addresses and timing defaults
//! - [`deviation`] - Left/right deviation and soft-limit correction math
//! - [`protocol`] - Gearbox command/response frames
//! - [`input`] - Panel button identifiers, events and `InputEvent`
//! - [`panel`] - Panel message frame decoding
//! - [`bus`] - `BusTransport` trait and bus errors
//! - [`config`] - TOML configuration types and loader
//! - [`prelude`] - Common re-exports for convenience

pub mod bus;
pub mod config;
pub mod consts;
pub mod deviation;
pub mod input;
pub mod panel;
pub mod prelude;
pub mod protocol;
