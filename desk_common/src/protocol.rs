//! Gearbox bus protocol.
//!
//! The coordinator writes one command frame and immediately reads a fixed
//! 5-byte status frame back. All multi-byte fields are little-endian.
//!
//! | Opcode | Command                    | Frame                                    |
//! |--------|----------------------------|------------------------------------------|
//! | `u`    | MoveUp                     | op, peer[1..5]                           |
//! | `d`    | MoveDown                   | op, peer[1..5]                           |
//! | `m`    | MoveTo                     | op, peer[1..5], target[5..9]             |
//! | `e`    | EmergencyStop              | op                                       |
//! | `p`    | GetPosition                | op, peer[1..5]                           |
//! | `l`    | LoosenBrake                | op, peer[1..5]                           |
//! | `f`    | FastenBrake                | op, peer[1..5]                           |
//! | `t`    | ToggleMotorControl         | op, peer[1..5], enable[5]                |
//! | `r`    | ToggleMotorControlPower    | op, peer[1..5], enable[5]                |
//!
//! Status frame: `position[0..4]`, `brake[4]` with
//! 0 = Locked, 1 = Intermediate, 2 = Error, 3 = Unlocked.

use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CMD_MOVE_UP: u8 = b'u';
pub const CMD_MOVE_DOWN: u8 = b'd';
pub const CMD_MOVE_TO: u8 = b'm';
pub const CMD_EMERGENCY_STOP: u8 = b'e';
pub const CMD_GET_POSITION: u8 = b'p';
pub const CMD_LOOSEN_BRAKE: u8 = b'l';
pub const CMD_FASTEN_BRAKE: u8 = b'f';
pub const CMD_TOGGLE_MOTOR_CONTROL: u8 = b't';
pub const CMD_TOGGLE_MOTOR_CONTROL_POWER: u8 = b'r';

/// Longest command frame (MoveTo).
pub const MAX_COMMAND_LENGTH: usize = 9;

/// Status frame length.
pub const RESPONSE_LENGTH: usize = 5;

/// Raw command frame buffer.
pub type CommandFrame = Vec<u8, MAX_COMMAND_LENGTH>;

/// Raw status frame.
pub type StatusFrame = [u8; RESPONSE_LENGTH];

/// Protocol decoding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame had no opcode byte.
    #[error("empty command frame")]
    Empty,

    /// Opcode is not part of the protocol.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// Frame shorter than the opcode requires.
    #[error("opcode '{opcode}' needs {expected} bytes, got {actual}")]
    Truncated {
        opcode: char,
        expected: usize,
        actual: usize,
    },

    /// Status frame carried an undefined brake value.
    #[error("invalid brake state byte {0}")]
    InvalidBrakeState(u8),

    /// Status frame had the wrong length.
    #[error("status frame must be {RESPONSE_LENGTH} bytes, got {0}")]
    BadResponseLength(usize),
}

// ─── Brake State ────────────────────────────────────────────────────

/// Brake reading derived from the open/closed light gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum BrakeState {
    /// Closed gate blocked only.
    #[default]
    Locked = 0,
    /// Neither gate blocked, actuator travelling.
    Intermediate = 1,
    /// Both gates blocked: sensor wiring fault.
    Error = 2,
    /// Open gate blocked only.
    Unlocked = 3,
}

impl BrakeState {
    /// Convert from the wire byte. Returns `None` for undefined values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Locked),
            1 => Some(Self::Intermediate),
            2 => Some(Self::Error),
            3 => Some(Self::Unlocked),
            _ => None,
        }
    }

    /// Derive the state from the two light gates.
    #[inline]
    pub const fn from_light_gates(open_blocked: bool, closed_blocked: bool) -> Self {
        match (open_blocked, closed_blocked) {
            (false, false) => Self::Intermediate,
            (true, false) => Self::Unlocked,
            (false, true) => Self::Locked,
            (true, true) => Self::Error,
        }
    }
}

// ─── Status ─────────────────────────────────────────────────────────

/// Telemetry returned by a gearbox for every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GearboxStatus {
    /// Current motor position [steps].
    pub position: u32,
    /// Current brake reading.
    pub brake: BrakeState,
}

impl GearboxStatus {
    /// Encode into the 5-byte status frame.
    pub fn encode(&self) -> StatusFrame {
        let mut frame = [0u8; RESPONSE_LENGTH];
        frame[..4].copy_from_slice(&self.position.to_le_bytes());
        frame[4] = self.brake as u8;
        frame
    }

    /// Decode a status frame.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() != RESPONSE_LENGTH {
            return Err(ProtocolError::BadResponseLength(frame.len()));
        }
        let position = read_u32(frame, 0);
        let brake =
            BrakeState::from_u8(frame[4]).ok_or(ProtocolError::InvalidBrakeState(frame[4]))?;
        Ok(Self { position, brake })
    }
}

// ─── Commands ───────────────────────────────────────────────────────

/// A decoded gearbox command. `peer` is the other gearbox's last known
/// position as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GearboxCommand {
    MoveUp { peer: u32 },
    MoveDown { peer: u32 },
    MoveTo { peer: u32, target: u32 },
    EmergencyStop,
    GetPosition { peer: u32 },
    LoosenBrake { peer: u32 },
    FastenBrake { peer: u32 },
    ToggleMotorControl { peer: u32, enable: bool },
    ToggleMotorControlPower { peer: u32, enable: bool },
}

impl GearboxCommand {
    /// Opcode byte of this command.
    pub const fn opcode(&self) -> u8 {
        match self {
            Self::MoveUp { .. } => CMD_MOVE_UP,
            Self::MoveDown { .. } => CMD_MOVE_DOWN,
            Self::MoveTo { .. } => CMD_MOVE_TO,
            Self::EmergencyStop => CMD_EMERGENCY_STOP,
            Self::GetPosition { .. } => CMD_GET_POSITION,
            Self::LoosenBrake { .. } => CMD_LOOSEN_BRAKE,
            Self::FastenBrake { .. } => CMD_FASTEN_BRAKE,
            Self::ToggleMotorControl { .. } => CMD_TOGGLE_MOTOR_CONTROL,
            Self::ToggleMotorControlPower { .. } => CMD_TOGGLE_MOTOR_CONTROL_POWER,
        }
    }

    /// Peer position carried by the frame, if any.
    pub const fn peer(&self) -> Option<u32> {
        match *self {
            Self::MoveUp { peer }
            | Self::MoveDown { peer }
            | Self::MoveTo { peer, .. }
            | Self::GetPosition { peer }
            | Self::LoosenBrake { peer }
            | Self::FastenBrake { peer }
            | Self::ToggleMotorControl { peer, .. }
            | Self::ToggleMotorControlPower { peer, .. } => Some(peer),
            Self::EmergencyStop => None,
        }
    }

    /// Same command addressed with a different peer position.
    pub const fn with_peer(self, peer: u32) -> Self {
        match self {
            Self::MoveUp { .. } => Self::MoveUp { peer },
            Self::MoveDown { .. } => Self::MoveDown { peer },
            Self::MoveTo { target, .. } => Self::MoveTo { peer, target },
            Self::EmergencyStop => Self::EmergencyStop,
            Self::GetPosition { .. } => Self::GetPosition { peer },
            Self::LoosenBrake { .. } => Self::LoosenBrake { peer },
            Self::FastenBrake { .. } => Self::FastenBrake { peer },
            Self::ToggleMotorControl { enable, .. } => Self::ToggleMotorControl { peer, enable },
            Self::ToggleMotorControlPower { enable, .. } => {
                Self::ToggleMotorControlPower { peer, enable }
            }
        }
    }

    /// Encode into a command frame.
    pub fn encode(&self) -> CommandFrame {
        let mut frame = CommandFrame::new();
        // Capacity is MAX_COMMAND_LENGTH, every layout below fits.
        let _ = frame.push(self.opcode());
        if let Some(peer) = self.peer() {
            let _ = frame.extend_from_slice(&peer.to_le_bytes());
        }
        match *self {
            Self::MoveTo { target, .. } => {
                let _ = frame.extend_from_slice(&target.to_le_bytes());
            }
            Self::ToggleMotorControl { enable, .. }
            | Self::ToggleMotorControlPower { enable, .. } => {
                let _ = frame.push(u8::from(enable));
            }
            _ => {}
        }
        frame
    }

    /// Decode a command frame. Trailing bytes beyond the layout are ignored.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let opcode = *frame.first().ok_or(ProtocolError::Empty)?;
        let expected = match opcode {
            CMD_EMERGENCY_STOP => 1,
            CMD_MOVE_UP | CMD_MOVE_DOWN | CMD_GET_POSITION | CMD_LOOSEN_BRAKE
            | CMD_FASTEN_BRAKE => 5,
            CMD_TOGGLE_MOTOR_CONTROL | CMD_TOGGLE_MOTOR_CONTROL_POWER => 6,
            CMD_MOVE_TO => 9,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        if frame.len() < expected {
            return Err(ProtocolError::Truncated {
                opcode: opcode as char,
                expected,
                actual: frame.len(),
            });
        }

        let peer = || read_u32(frame, 1);
        Ok(match opcode {
            CMD_MOVE_UP => Self::MoveUp { peer: peer() },
            CMD_MOVE_DOWN => Self::MoveDown { peer: peer() },
            CMD_MOVE_TO => Self::MoveTo {
                peer: peer(),
                target: read_u32(frame, 5),
            },
            CMD_GET_POSITION => Self::GetPosition { peer: peer() },
            CMD_LOOSEN_BRAKE => Self::LoosenBrake { peer: peer() },
            CMD_FASTEN_BRAKE => Self::FastenBrake { peer: peer() },
            CMD_TOGGLE_MOTOR_CONTROL => Self::ToggleMotorControl {
                peer: peer(),
                enable: frame[5] != 0,
            },
            CMD_TOGGLE_MOTOR_CONTROL_POWER => Self::ToggleMotorControlPower {
                peer: peer(),
                enable: frame[5] != 0,
            },
            _ => Self::EmergencyStop,
        })
    }
}

#[inline]
fn read_u32(frame: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&frame[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_to_layout_is_peer_then_target() {
        let frame = GearboxCommand::MoveTo {
            peer: 0x0102_0304,
            target: 40_000,
        }
        .encode();
        assert_eq!(frame.len(), 9);
        assert_eq!(frame[0], b'm');
        assert_eq!(&frame[1..5], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&frame[5..9], &40_000u32.to_le_bytes());
    }

    #[test]
    fn toggle_flag_sits_at_byte_five() {
        let frame = GearboxCommand::ToggleMotorControlPower {
            peer: 7,
            enable: true,
        }
        .encode();
        assert_eq!(frame.len(), 6);
        assert_eq!(frame[0], b'r');
        assert_eq!(frame[5], 1);
    }

    #[test]
    fn emergency_stop_is_one_byte_and_tolerates_padding() {
        assert_eq!(GearboxCommand::EmergencyStop.encode().as_slice(), b"e");
        assert_eq!(
            GearboxCommand::decode(&[b'e', 1, 2, 3, 4]),
            Ok(GearboxCommand::EmergencyStop)
        );
    }

    #[test]
    fn decode_rejects_unknown_and_truncated() {
        assert_eq!(
            GearboxCommand::decode(b"z1234"),
            Err(ProtocolError::UnknownOpcode(b'z'))
        );
        assert!(matches!(
            GearboxCommand::decode(&[b'm', 0, 0, 0, 0]),
            Err(ProtocolError::Truncated { expected: 9, .. })
        ));
        assert_eq!(GearboxCommand::decode(&[]), Err(ProtocolError::Empty));
    }

    #[test]
    fn decode_reads_move_up_peer() {
        let mut frame = [0u8; 5];
        frame[0] = b'u';
        frame[1..5].copy_from_slice(&4000u32.to_le_bytes());
        assert_eq!(
            GearboxCommand::decode(&frame),
            Ok(GearboxCommand::MoveUp { peer: 4000 })
        );
    }

    #[test]
    fn with_peer_keeps_payload() {
        let cmd = GearboxCommand::MoveTo { peer: 1, target: 9 }.with_peer(5);
        assert_eq!(cmd, GearboxCommand::MoveTo { peer: 5, target: 9 });
        assert_eq!(GearboxCommand::EmergencyStop.with_peer(5).peer(), None);
    }

    #[test]
    fn status_frame_wire_values() {
        let status = GearboxStatus {
            position: 100_000,
            brake: BrakeState::Unlocked,
        };
        let frame = status.encode();
        assert_eq!(frame[4], 3);
        assert_eq!(GearboxStatus::decode(&frame), Ok(status));
    }

    #[test]
    fn status_rejects_bad_brake_byte() {
        let frame = [0, 0, 0, 0, 9];
        assert_eq!(
            GearboxStatus::decode(&frame),
            Err(ProtocolError::InvalidBrakeState(9))
        );
        assert_eq!(
            GearboxStatus::decode(&frame[..4]),
            Err(ProtocolError::BadResponseLength(4))
        );
    }

    #[test]
    fn light_gates_map_to_brake_state() {
        assert_eq!(BrakeState::from_light_gates(false, false), BrakeState::Intermediate);
        assert_eq!(BrakeState::from_light_gates(true, false), BrakeState::Unlocked);
        assert_eq!(BrakeState::from_light_gates(false, true), BrakeState::Locked);
        assert_eq!(BrakeState::from_light_gates(true, true), BrakeState::Error);
    }
}
