//! Control panel input types.
//!
//! Button identifiers and gesture events as reported by the panel
//! firmware. Numeric values match the panel's wire encoding.

use serde::{Deserialize, Serialize};

/// Physical panel button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ButtonId {
    Main = 0,
    MoveUp = 1,
    MoveDown = 2,
    Shortcut1 = 3,
    Shortcut2 = 4,
}

impl ButtonId {
    /// Convert from the wire byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Main),
            1 => Some(Self::MoveUp),
            2 => Some(Self::MoveDown),
            3 => Some(Self::Shortcut1),
            4 => Some(Self::Shortcut2),
            _ => None,
        }
    }
}

/// Gesture reported for a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ButtonEvent {
    SingleClick = 0,
    DoubleClick = 1,
    LongClick = 2,
    StartDoubleHold = 3,
    EndDoubleHold = 4,
    /// Placeholder slot in a batch; never forwarded.
    NoEvent = 5,
    Pressed = 6,
    Released = 7,
}

impl ButtonEvent {
    /// Convert from the wire byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SingleClick),
            1 => Some(Self::DoubleClick),
            2 => Some(Self::LongClick),
            3 => Some(Self::StartDoubleHold),
            4 => Some(Self::EndDoubleHold),
            5 => Some(Self::NoEvent),
            6 => Some(Self::Pressed),
            7 => Some(Self::Released),
            _ => None,
        }
    }
}

/// One decoded panel input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub button: ButtonId,
    pub event: ButtonEvent,
}

impl InputEvent {
    #[inline]
    pub const fn new(button: ButtonId, event: ButtonEvent) -> Self {
        Self { button, event }
    }
}

impl core::fmt::Display for InputEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}/{:?}", self.button, self.event)
    }
}
