//! In-process bus connecting the coordinator to simulated gearbox nodes.

use std::sync::Arc;
use std::time::Duration;

use desk_common::bus::{BusError, BusTransport};
use desk_common::protocol::StatusFrame;
use tracing::trace;

use crate::node::GearboxNode;

/// Routes transactions by address to [`GearboxNode`]s.
#[derive(Default)]
pub struct SimulatedBus {
    nodes: Vec<Arc<GearboxNode>>,
    offline: Vec<u8>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node at its address.
    pub fn attach(&mut self, node: Arc<GearboxNode>) {
        self.nodes.retain(|n| n.address() != node.address());
        self.nodes.push(node);
    }

    pub fn node(&self, address: u8) -> Option<&Arc<GearboxNode>> {
        self.nodes.iter().find(|n| n.address() == address)
    }

    /// Make `address` stop answering (or answer again).
    pub fn set_offline(&mut self, address: u8, offline: bool) {
        self.offline.retain(|a| *a != address);
        if offline {
            self.offline.push(address);
        }
    }

    /// Step every attached node `iterations` times.
    pub fn advance(&self, iterations: u32) {
        for node in &self.nodes {
            node.advance(iterations);
        }
    }
}

impl BusTransport for SimulatedBus {
    fn transact(
        &mut self,
        address: u8,
        request: &[u8],
        response: &mut StatusFrame,
        _timeout: Duration,
    ) -> Result<(), BusError> {
        if self.offline.contains(&address) {
            return Err(BusError::NoDevice(address));
        }
        let node = self.node(address).ok_or(BusError::NoDevice(address))?;
        trace!(node = node.name(), op = ?request.first().map(|b| *b as char), "Bus transaction");
        let reply = node.transact(request).ok_or(BusError::ShortTransfer {
            address,
            expected: response.len(),
            actual: 0,
        })?;
        *response = reply;
        Ok(())
    }
}
