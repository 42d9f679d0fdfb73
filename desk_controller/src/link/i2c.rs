//! Linux `i2c-dev` transport.
//!
//! One transaction selects the slave address with `I2C_SLAVE`, writes the
//! command frame and reads the 5-byte status frame. The adapter timeout is
//! set through `I2C_TIMEOUT` (units of 10 ms).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use desk_common::bus::{BusError, BusTransport, expect_full_response};
use desk_common::protocol::StatusFrame;
use tracing::{debug, info};

const I2C_TIMEOUT: libc::c_ulong = 0x0702;
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// Open `/dev/i2c-N` adapter.
pub struct I2cBus {
    file: File,
    path: PathBuf,
    selected: Option<u8>,
    timeout: Option<Duration>,
}

impl I2cBus {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        info!(device = %path.display(), "I2C adapter opened");
        Ok(Self {
            file,
            path,
            selected: None,
            timeout: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ioctl(&self, request: libc::c_ulong, arg: libc::c_ulong) -> io::Result<()> {
        // SAFETY: both requests take an integer argument by value.
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg) };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn select(&mut self, address: u8) -> Result<(), BusError> {
        if self.selected != Some(address) {
            self.ioctl(I2C_SLAVE, libc::c_ulong::from(address))
                .map_err(|_| BusError::NoDevice(address))?;
            self.selected = Some(address);
        }
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), BusError> {
        if self.timeout != Some(timeout) {
            let ticks = timeout.as_millis().div_ceil(10).max(1) as libc::c_ulong;
            self.ioctl(I2C_TIMEOUT, ticks)?;
            self.timeout = Some(timeout);
            debug!(timeout_ms = timeout.as_millis() as u64, "I2C adapter timeout set");
        }
        Ok(())
    }
}

fn map_io(e: io::Error, address: u8, timeout: Duration) -> BusError {
    match e.kind() {
        io::ErrorKind::TimedOut => BusError::Timeout(timeout, address),
        _ => match e.raw_os_error() {
            Some(libc::ENXIO) | Some(libc::EREMOTEIO) => BusError::NoDevice(address),
            _ => BusError::Io(e),
        },
    }
}

impl BusTransport for I2cBus {
    fn transact(
        &mut self,
        address: u8,
        request: &[u8],
        response: &mut StatusFrame,
        timeout: Duration,
    ) -> Result<(), BusError> {
        self.set_timeout(timeout)?;
        self.select(address)?;
        self.file
            .write_all(request)
            .map_err(|e| map_io(e, address, timeout))?;
        let n = self.file.read(response).map_err(|e| map_io(e, address, timeout))?;
        expect_full_response(address, n)
    }
}
