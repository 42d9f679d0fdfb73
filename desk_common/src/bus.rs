//! Coordinator-to-gearbox bus abstraction.
//!
//! One transaction is a single command write followed by a fixed-length
//! status read from the addressed node. Implementations must bound the wait
//! with the given timeout.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{RESPONSE_LENGTH, StatusFrame};

/// Bus transport errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// No node answers at the address.
    #[error("no device at address 0x{0:02x}")]
    NoDevice(u8),

    /// Node did not acknowledge or returned fewer bytes than expected.
    #[error("short transfer at 0x{address:02x}: {actual}/{expected} bytes")]
    ShortTransfer {
        address: u8,
        expected: usize,
        actual: usize,
    },

    /// Node did not answer within the timeout.
    #[error("timeout after {0:?} at address 0x{1:02x}")]
    Timeout(Duration, u8),

    /// Underlying OS error.
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request/response channel to the gearbox nodes.
pub trait BusTransport: Send {
    /// Write `request` to `address` and read the status frame back.
    fn transact(
        &mut self,
        address: u8,
        request: &[u8],
        response: &mut StatusFrame,
        timeout: Duration,
    ) -> Result<(), BusError>;
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn transact(
        &mut self,
        address: u8,
        request: &[u8],
        response: &mut StatusFrame,
        timeout: Duration,
    ) -> Result<(), BusError> {
        (**self).transact(address, request, response, timeout)
    }
}

/// Check a read count against the status frame length.
#[inline]
pub fn expect_full_response(address: u8, actual: usize) -> Result<(), BusError> {
    if actual == RESPONSE_LENGTH {
        Ok(())
    } else {
        Err(BusError::ShortTransfer {
            address,
            expected: RESPONSE_LENGTH,
            actual,
        })
    }
}
