//! Controller error types and link fault flags.

use bitflags::bitflags;
use thiserror::Error;

/// Errors during RT setup or cycle execution.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// Panel input source could not be opened.
    #[error("panel input error: {0}")]
    Panel(#[from] std::io::Error),

    /// Cycle body exceeded its budget.
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun {
        /// Actual cycle duration [ns].
        actual_ns: i64,
        /// Configured cycle budget [ns].
        budget_ns: i64,
    },
}

/// Local power switch failure.
#[derive(Debug, Error)]
pub enum PowerError {
    #[error("power switch '{0}' unavailable")]
    Unavailable(&'static str),

    #[error("power switch '{switch}': {source}")]
    Io {
        switch: &'static str,
        #[source]
        source: std::io::Error,
    },
}

bitflags! {
    /// Gearbox link faults seen in the most recent exchange.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LinkFaults: u8 {
        /// Left gearbox did not answer.
        const LEFT_UNREACHABLE  = 0x01;
        /// Right gearbox did not answer.
        const RIGHT_UNREACHABLE = 0x02;
        /// Left reply could not be decoded.
        const LEFT_BAD_REPLY    = 0x04;
        /// Right reply could not be decoded.
        const RIGHT_BAD_REPLY   = 0x08;
        /// A gearbox reports a brake sensor error.
        const BRAKE_SENSOR      = 0x10;
    }
}

impl LinkFaults {
    /// Flags that make the last exchange count as failed.
    pub const EXCHANGE: Self = Self::LEFT_UNREACHABLE
        .union(Self::RIGHT_UNREACHABLE)
        .union(Self::LEFT_BAD_REPLY)
        .union(Self::RIGHT_BAD_REPLY);
}
