//! Gearbox side of the bus protocol.
//!
//! A transaction arrives as two callbacks: `on_receive` with the command
//! bytes, then `on_request` asking for the reply. The reply carries the
//! telemetry sampled *before* the command executes.
//!
//! Local safety: every command that carries the peer position is checked
//! against the hard deviation limit. Moves beyond it stop the motor instead.
//! Up/down moves on the leading side beyond the soft limit are shortened by
//! [`DeviationLimits::correction`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use desk_common::deviation::{DeviationLimits, deviation, signed_deviation};
use desk_common::protocol::{GearboxCommand, MAX_COMMAND_LENGTH, ProtocolError, StatusFrame};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::unit::GearboxHardware;

/// Bytes of the last received frame.
#[derive(Debug, Default)]
struct RxFrame {
    data: [u8; MAX_COMMAND_LENGTH],
    len: usize,
    /// Whether the frame has already been executed.
    consumed: bool,
}

/// Outcome of one `on_request`, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Command decoded and executed.
    Executed(GearboxCommand),
    /// Command refused by the hard deviation limit; motor stopped.
    DeviationStop(GearboxCommand),
    /// Frame already executed; telemetry only.
    Repeated,
    /// Frame could not be decoded; telemetry only.
    Invalid(ProtocolError),
}

/// Command handler for one gearbox.
pub struct GearboxProtocol<H: GearboxHardware> {
    hardware: Arc<Mutex<H>>,
    limits: DeviationLimits,
    rx: Mutex<RxFrame>,
    read_all: AtomicBool,
    peer_position: AtomicU32,
    last: Mutex<Option<Execution>>,
}

impl<H: GearboxHardware> GearboxProtocol<H> {
    pub fn new(hardware: Arc<Mutex<H>>, limits: DeviationLimits) -> Self {
        Self {
            hardware,
            limits,
            rx: Mutex::new(RxFrame::default()),
            read_all: AtomicBool::new(true),
            peer_position: AtomicU32::new(0),
            last: Mutex::new(None),
        }
    }

    /// Shared handle to the hardware.
    pub fn hardware(&self) -> &Arc<Mutex<H>> {
        &self.hardware
    }

    /// Last peer position received from the coordinator.
    pub fn peer_position(&self) -> u32 {
        self.peer_position.load(Ordering::Acquire)
    }

    /// Outcome of the most recent `on_request`.
    pub fn last_execution(&self) -> Option<Execution> {
        *self.last.lock()
    }

    /// Receive a command frame byte by byte.
    ///
    /// Bytes past [`MAX_COMMAND_LENGTH`] are dropped.
    pub fn on_receive<I>(&self, bytes: I)
    where
        I: IntoIterator<Item = u8>,
    {
        self.read_all.store(false, Ordering::Release);
        {
            let mut rx = self.rx.lock();
            rx.len = 0;
            rx.consumed = false;
            for byte in bytes {
                if rx.len < MAX_COMMAND_LENGTH {
                    let i = rx.len;
                    rx.data[i] = byte;
                    rx.len += 1;
                }
            }
        }
        self.read_all.store(true, Ordering::Release);
    }

    /// Produce the reply for the last received frame and execute it.
    ///
    /// Returns `None` if the frame is still being received; the request is
    /// ignored in that case.
    pub fn on_request(&self) -> Option<StatusFrame> {
        if !self.read_all.load(Ordering::Acquire) {
            warn!("Request before the command frame was fully read, ignoring");
            return None;
        }

        let mut rx = self.rx.lock();
        let mut hw = self.hardware.lock();
        let reply = hw.status().encode();

        let outcome = if rx.consumed {
            trace!("Repeated request, telemetry only");
            Execution::Repeated
        } else {
            rx.consumed = true;
            match GearboxCommand::decode(&rx.data[..rx.len]) {
                Ok(command) => self.execute(&mut *hw, command),
                Err(e) => {
                    warn!(error = %e, "Unhandled gearbox command");
                    Execution::Invalid(e)
                }
            }
        };
        *self.last.lock() = Some(outcome);
        Some(reply)
    }

    fn execute(&self, hw: &mut H, command: GearboxCommand) -> Execution {
        if let Some(peer) = command.peer() {
            self.peer_position.store(peer, Ordering::Release);
        }
        let current = hw.position();

        match command {
            GearboxCommand::MoveUp { peer } => {
                if self.deviation_stop(hw, current, peer, "MoveUp") {
                    return Execution::DeviationStop(command);
                }
                let ahead = signed_deviation(current, peer);
                let penalty = self.soft_penalty(ahead, "MoveUp");
                hw.start_motor();
                hw.move_up(penalty);
            }
            GearboxCommand::MoveDown { peer } => {
                if self.deviation_stop(hw, current, peer, "MoveDown") {
                    return Execution::DeviationStop(command);
                }
                let ahead = signed_deviation(peer, current);
                let penalty = self.soft_penalty(ahead, "MoveDown");
                hw.start_motor();
                hw.move_down(penalty);
            }
            GearboxCommand::MoveTo { peer, target } => {
                if self.deviation_stop(hw, current, peer, "MoveTo") {
                    return Execution::DeviationStop(command);
                }
                hw.move_to(target);
                hw.start_motor();
            }
            GearboxCommand::EmergencyStop => hw.stop_motor(),
            GearboxCommand::GetPosition { .. } => {}
            GearboxCommand::LoosenBrake { .. } => hw.loosen_brake(),
            GearboxCommand::FastenBrake { .. } => hw.fasten_brake(),
            GearboxCommand::ToggleMotorControl { enable, .. } => hw.set_motor_control(enable),
            GearboxCommand::ToggleMotorControlPower { enable, .. } => {
                hw.set_motor_control_power(enable)
            }
        }
        Execution::Executed(command)
    }

    /// Stop the motor if the deviation to the peer exceeds the hard limit.
    fn deviation_stop(&self, hw: &mut H, current: u32, peer: u32, op: &'static str) -> bool {
        let dev = deviation(current, peer);
        if self.limits.exceeds_hard(dev) {
            hw.stop_motor();
            warn!(op, current, peer, deviation = dev, "Hard deviation limit exceeded, motor stopped");
            true
        } else {
            false
        }
    }

    /// Travel penalty when this side leads by more than the soft limit.
    fn soft_penalty(&self, ahead: i32, op: &'static str) -> u32 {
        if ahead <= 0 {
            return 0;
        }
        let ahead = ahead.unsigned_abs();
        if !self.limits.exceeds_soft(ahead) {
            return 0;
        }
        let correction = self.limits.correction(ahead);
        debug!(op, deviation = ahead, correction, "Soft deviation correction");
        correction
    }
}
