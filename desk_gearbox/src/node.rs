//! One addressable gearbox node.

use std::sync::Arc;
use std::time::Duration;

use desk_common::config::GearboxConfig;
use desk_common::deviation::DeviationLimits;
use desk_common::protocol::StatusFrame;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::protocol::GearboxProtocol;
use crate::timer::StepTimer;
use crate::unit::{GearboxHardware, SimGearbox, StepTarget};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("step timer already running on {0}")]
    AlreadyRunning(&'static str),

    #[error("failed to start step timer: {0}")]
    Timer(#[from] std::io::Error),
}

/// Protocol, hardware and step timer of one gearbox.
pub struct GearboxNode<H: GearboxHardware + StepTarget = SimGearbox> {
    name: &'static str,
    address: u8,
    protocol: GearboxProtocol<H>,
    timer: Option<StepTimer>,
}

impl<H: GearboxHardware + StepTarget + 'static> GearboxNode<H> {
    pub fn new(name: &'static str, address: u8, hardware: H, limits: DeviationLimits) -> Self {
        Self {
            name,
            address,
            protocol: GearboxProtocol::new(Arc::new(Mutex::new(hardware)), limits),
            timer: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[inline]
    pub fn protocol(&self) -> &GearboxProtocol<H> {
        &self.protocol
    }

    #[inline]
    pub fn hardware(&self) -> &Arc<Mutex<H>> {
        self.protocol.hardware()
    }

    /// One bus transaction: receive `request`, produce the reply.
    pub fn transact(&self, request: &[u8]) -> Option<StatusFrame> {
        self.protocol.on_receive(request.iter().copied());
        self.protocol.on_request()
    }

    /// Step the hardware `iterations` times on the calling thread.
    pub fn advance(&self, iterations: u32) {
        let mut hw = self.protocol.hardware().lock();
        for _ in 0..iterations {
            hw.step();
        }
    }

    /// Start the background step timer.
    pub fn start_timer(&mut self, interval: Duration) -> Result<(), NodeError> {
        if self.timer.is_some() {
            return Err(NodeError::AlreadyRunning(self.name));
        }
        let timer = StepTimer::start(self.name, Arc::clone(self.protocol.hardware()), interval)?;
        self.timer = Some(timer);
        Ok(())
    }

    pub fn stop_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }
}

impl GearboxNode<SimGearbox> {
    /// Simulated gearbox resting at `position`.
    pub fn simulated(
        name: &'static str,
        address: u8,
        config: &GearboxConfig,
        limits: DeviationLimits,
        position: u32,
    ) -> Self {
        info!(name, address = format_args!("0x{address:02x}"), position, "Simulated gearbox node");
        Self::new(name, address, SimGearbox::simulated(config, position), limits)
    }
}
