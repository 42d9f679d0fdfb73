//! Command exchange with the left and right gearbox.
//!
//! Every command goes to the left gearbox first, then the right, each
//! carrying the other side's position from a snapshot taken before either
//! transaction. A failed transaction leaves that side's telemetry as it
//! was and makes the whole command report failure.

use std::time::Duration;

use desk_common::bus::BusTransport;
use desk_common::config::BusConfig;
use desk_common::deviation::deviation;
use desk_common::protocol::{BrakeState, GearboxCommand, GearboxStatus, RESPONSE_LENGTH};
use tracing::{debug, info, trace, warn};

use crate::error::LinkFaults;

/// Last telemetry received from one gearbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GearboxSession {
    pub position: u32,
    pub brake: BrakeState,
    /// At least one valid reply received.
    pub seen: bool,
}

impl GearboxSession {
    fn update(&mut self, status: GearboxStatus) {
        self.position = status.position;
        self.brake = status.brake;
        self.seen = true;
    }
}

/// Telemetry of both gearboxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub left: GearboxSession,
    pub right: GearboxSession,
    /// Both sides answered the most recent command.
    pub fresh: bool,
}

impl Telemetry {
    #[inline]
    pub fn positions(&self) -> (u32, u32) {
        (self.left.position, self.right.position)
    }

    #[inline]
    pub fn deviation(&self) -> u32 {
        deviation(self.left.position, self.right.position)
    }

    /// Both sides have reported at least once.
    #[inline]
    pub fn complete(&self) -> bool {
        self.left.seen && self.right.seen
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    const fn unreachable(self) -> LinkFaults {
        match self {
            Self::Left => LinkFaults::LEFT_UNREACHABLE,
            Self::Right => LinkFaults::RIGHT_UNREACHABLE,
        }
    }

    const fn bad_reply(self) -> LinkFaults {
        match self {
            Self::Left => LinkFaults::LEFT_BAD_REPLY,
            Self::Right => LinkFaults::RIGHT_BAD_REPLY,
        }
    }
}

/// Bus client for the gearbox pair.
pub struct GearboxLink<B: BusTransport> {
    bus: B,
    left_address: u8,
    right_address: u8,
    timeout: Duration,
    faults: LinkFaults,
    exchanges: u64,
    failed_exchanges: u64,
}

impl<B: BusTransport> GearboxLink<B> {
    pub fn new(bus: B, config: &BusConfig) -> Self {
        Self {
            bus,
            left_address: config.left_address,
            right_address: config.right_address,
            timeout: config.timeout(),
            faults: LinkFaults::empty(),
            exchanges: 0,
            failed_exchanges: 0,
        }
    }

    #[inline]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[inline]
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    #[inline]
    pub fn faults(&self) -> LinkFaults {
        self.faults
    }

    /// `(total, failed)` per-side transactions.
    pub fn counters(&self) -> (u64, u64) {
        (self.exchanges, self.failed_exchanges)
    }

    /// Send `command` to both sides with the snapshotted peer positions.
    pub fn send(&mut self, telemetry: &mut Telemetry, command: GearboxCommand) -> bool {
        let (left_pos, right_pos) = telemetry.positions();
        self.send_each(
            telemetry,
            command.with_peer(right_pos),
            command.with_peer(left_pos),
        )
    }

    /// Send a distinct command to each side, left first.
    pub fn send_each(
        &mut self,
        telemetry: &mut Telemetry,
        left: GearboxCommand,
        right: GearboxCommand,
    ) -> bool {
        let mut faults = LinkFaults::empty();
        let left_ok = self.exchange(Side::Left, left, &mut telemetry.left, &mut faults);
        let right_ok = self.exchange(Side::Right, right, &mut telemetry.right, &mut faults);

        if telemetry.left.brake == BrakeState::Error || telemetry.right.brake == BrakeState::Error {
            faults |= LinkFaults::BRAKE_SENSOR;
        }
        self.update_faults(faults);

        telemetry.fresh = left_ok && right_ok;
        telemetry.fresh
    }

    fn exchange(
        &mut self,
        side: Side,
        command: GearboxCommand,
        session: &mut GearboxSession,
        faults: &mut LinkFaults,
    ) -> bool {
        let address = match side {
            Side::Left => self.left_address,
            Side::Right => self.right_address,
        };
        let frame = command.encode();
        let mut response = [0u8; RESPONSE_LENGTH];
        self.exchanges += 1;

        if let Err(e) = self.bus.transact(address, &frame, &mut response, self.timeout) {
            faults.insert(side.unreachable());
            self.failed_exchanges += 1;
            debug!(?side, ?command, error = %e, "Gearbox transaction failed");
            return false;
        }
        match GearboxStatus::decode(&response) {
            Ok(status) => {
                trace!(?side, ?command, position = status.position, brake = ?status.brake, "Gearbox reply");
                session.update(status);
                true
            }
            Err(e) => {
                faults.insert(side.bad_reply());
                self.failed_exchanges += 1;
                debug!(?side, error = %e, "Undecodable gearbox reply");
                false
            }
        }
    }

    fn update_faults(&mut self, next: LinkFaults) {
        let raised = next.difference(self.faults);
        let cleared = self.faults.difference(next);
        if !raised.is_empty() {
            warn!(faults = ?raised, "Gearbox link fault");
        }
        if !cleared.is_empty() {
            info!(faults = ?cleared, "Gearbox link fault cleared");
        }
        self.faults = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_common::bus::BusError;
    use desk_common::protocol::{CMD_GET_POSITION, CMD_MOVE_UP, StatusFrame};

    /// Records requests; answers with fixed positions unless failing.
    #[derive(Default)]
    struct Recorder {
        requests: Vec<(u8, Vec<u8>)>,
        fail: Vec<u8>,
        garbage: Vec<u8>,
    }

    impl BusTransport for Recorder {
        fn transact(
            &mut self,
            address: u8,
            request: &[u8],
            response: &mut StatusFrame,
            _timeout: Duration,
        ) -> Result<(), BusError> {
            self.requests.push((address, request.to_vec()));
            if self.fail.contains(&address) {
                return Err(BusError::NoDevice(address));
            }
            if self.garbage.contains(&address) {
                *response = [0, 0, 0, 0, 9];
                return Ok(());
            }
            let position = u32::from(address) * 100;
            *response = GearboxStatus { position, brake: BrakeState::Unlocked }.encode();
            Ok(())
        }
    }

    fn link() -> GearboxLink<Recorder> {
        GearboxLink::new(Recorder::default(), &BusConfig::default())
    }

    fn peer_of(frame: &[u8]) -> u32 {
        u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]])
    }

    #[test]
    fn left_first_with_snapshot_peers() {
        let mut l = link();
        let mut t = Telemetry::default();
        t.left.position = 1000;
        t.right.position = 2000;

        assert!(l.send(&mut t, GearboxCommand::MoveUp { peer: 0 }));

        let reqs = &l.bus().requests;
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].0, 0x33);
        assert_eq!(reqs[0].1[0], CMD_MOVE_UP);
        assert_eq!(peer_of(&reqs[0].1), 2000);
        // Right sees the left position from before the left reply.
        assert_eq!(reqs[1].0, 0x88);
        assert_eq!(peer_of(&reqs[1].1), 1000);

        assert_eq!(t.positions(), (0x33 * 100, 0x88 * 100));
        assert!(t.fresh && t.complete());
    }

    #[test]
    fn failed_side_keeps_telemetry() {
        let mut l = link();
        l.bus_mut().fail.push(0x88);
        let mut t = Telemetry::default();
        t.right.position = 777;

        assert!(!l.send(&mut t, GearboxCommand::GetPosition { peer: 0 }));
        assert_eq!(t.right.position, 777);
        assert!(!t.right.seen);
        assert_eq!(t.left.position, 0x33 * 100);
        assert!(!t.fresh);
        assert_eq!(l.faults(), LinkFaults::RIGHT_UNREACHABLE);
        assert_eq!(l.counters(), (2, 1));
    }

    #[test]
    fn left_failure_still_reaches_right() {
        let mut l = link();
        l.bus_mut().fail.push(0x33);
        let mut t = Telemetry::default();
        assert!(!l.send(&mut t, GearboxCommand::GetPosition { peer: 0 }));
        assert_eq!(l.bus().requests.len(), 2);
        assert_eq!(l.bus().requests[1].1[0], CMD_GET_POSITION);
        assert!(t.right.seen);
    }

    #[test]
    fn undecodable_reply_is_bad_reply() {
        let mut l = link();
        l.bus_mut().garbage.push(0x33);
        let mut t = Telemetry::default();
        assert!(!l.send(&mut t, GearboxCommand::GetPosition { peer: 0 }));
        assert_eq!(l.faults(), LinkFaults::LEFT_BAD_REPLY);
        assert!(!t.left.seen);
    }

    #[test]
    fn faults_clear_on_recovery() {
        let mut l = link();
        let mut t = Telemetry::default();
        l.bus_mut().fail.push(0x33);
        l.send(&mut t, GearboxCommand::GetPosition { peer: 0 });
        assert!(!l.faults().is_empty());
        l.bus_mut().fail.clear();
        assert!(l.send(&mut t, GearboxCommand::GetPosition { peer: 0 }));
        assert!(l.faults().is_empty());
    }

    #[test]
    fn send_each_uses_given_commands() {
        let mut l = link();
        let mut t = Telemetry::default();
        let cmd = GearboxCommand::MoveTo { peer: 7000, target: 7000 };
        assert!(l.send_each(&mut t, cmd, cmd));
        for (_, frame) in &l.bus().requests {
            assert_eq!(GearboxCommand::decode(frame).unwrap(), cmd);
        }
    }
}
