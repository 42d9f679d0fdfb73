//! Control panel message frames.
//!
//! ```text
//! [ N | payload (N-2 bytes) | 0 ]
//! ```
//!
//! Byte 0 is the total frame length including itself and the trailer. The
//! trailer must be zero. The first payload byte is a type tag:
//!
//! - `'B'` button batch: 4-byte records `{tag, button, tag, event}`
//! - `'E'` encoder: `{tag, id, _, state_lo, state_hi}`

use heapless::Vec;
use thiserror::Error;
use tracing::debug;

use crate::input::{ButtonEvent, ButtonId, InputEvent};

pub const TAG_BUTTONS: u8 = b'B';
pub const TAG_ENCODER: u8 = b'E';

/// Smallest meaningful frame: length, tag, trailer.
pub const MIN_FRAME_LENGTH: usize = 3;

/// Records per batch that fit in a 255-byte frame.
pub const MAX_BATCH_EVENTS: usize = 64;

const RECORD_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error("frame length {0} below minimum {MIN_FRAME_LENGTH}")]
    BadLength(usize),

    #[error("frame declares {declared} bytes, {available} available")]
    Incomplete { declared: usize, available: usize },

    #[error("nonzero trailer byte 0x{0:02x}")]
    NonZeroTrailer(u8),

    #[error("unknown message tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("encoder message too short ({0} payload bytes)")]
    ShortEncoder(usize),
}

/// A decoded panel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelMessage {
    /// Button events in record order, `NoEvent` slots removed.
    Buttons(Vec<InputEvent, MAX_BATCH_EVENTS>),
    /// Rotary encoder state.
    Encoder { id: u8, state: u16 },
}

/// Decode one complete frame.
///
/// `frame` must start at the length byte; bytes past the declared length
/// are ignored.
pub fn decode_frame(frame: &[u8]) -> Result<PanelMessage, PanelError> {
    let declared = *frame.first().ok_or(PanelError::BadLength(0))? as usize;
    if declared < MIN_FRAME_LENGTH {
        return Err(PanelError::BadLength(declared));
    }
    if frame.len() < declared {
        return Err(PanelError::Incomplete {
            declared,
            available: frame.len(),
        });
    }
    let trailer = frame[declared - 1];
    if trailer != 0 {
        return Err(PanelError::NonZeroTrailer(trailer));
    }
    decode_payload(&frame[1..declared - 1])
}

/// Decode a payload (tag byte first).
pub fn decode_payload(payload: &[u8]) -> Result<PanelMessage, PanelError> {
    match payload.first().copied() {
        Some(TAG_BUTTONS) => Ok(PanelMessage::Buttons(decode_buttons(payload))),
        Some(TAG_ENCODER) => {
            if payload.len() < 5 {
                return Err(PanelError::ShortEncoder(payload.len()));
            }
            Ok(PanelMessage::Encoder {
                id: payload[1],
                state: u16::from_le_bytes([payload[3], payload[4]]),
            })
        }
        Some(other) => Err(PanelError::UnknownTag(other)),
        None => Err(PanelError::BadLength(2)),
    }
}

fn decode_buttons(payload: &[u8]) -> Vec<InputEvent, MAX_BATCH_EVENTS> {
    let mut events = Vec::new();
    for record in payload.chunks_exact(RECORD_LENGTH) {
        let (Some(button), Some(event)) =
            (ButtonId::from_u8(record[1]), ButtonEvent::from_u8(record[3]))
        else {
            debug!(
                button = record[1],
                event = record[3],
                "Skipping undecodable button record"
            );
            continue;
        };
        if event == ButtonEvent::NoEvent {
            continue;
        }
        if events.push(InputEvent::new(button, event)).is_err() {
            break;
        }
    }
    events
}
