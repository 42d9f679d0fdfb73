//! UiState transitions.
//!
//! Idle → DriveControl → MoveUp/MoveDown/MoveTo, driven only by panel
//! input events, one at a time in arrival order.

use desk_common::input::{ButtonEvent, ButtonId, InputEvent};

/// Operator intent as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum UiState {
    #[default]
    Idle = 0,
    DriveControl = 1,
    MoveUp = 2,
    MoveDown = 3,
    MoveTo = 4,
}

impl UiState {
    /// Any state in which the drives must be powered.
    #[inline]
    pub const fn is_moving(self) -> bool {
        !self.is_stationary()
    }

    #[inline]
    pub const fn is_stationary(self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Result of feeding one event to the UI machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiTransition {
    /// State changed.
    Ok(UiState),
    /// Event has no effect in the current state.
    Ignored,
}

/// UI sub-machine.
#[derive(Debug, Clone, Default)]
pub struct UiStateMachine {
    state: UiState,
}

impl UiStateMachine {
    pub const fn new() -> Self {
        Self { state: UiState::Idle }
    }

    #[inline]
    pub fn state(&self) -> UiState {
        self.state
    }

    /// Apply one input event.
    pub fn handle_event(&mut self, input: InputEvent) -> UiTransition {
        match next_state(self.state, input) {
            Some(next) if next != self.state => {
                self.state = next;
                UiTransition::Ok(next)
            }
            _ => UiTransition::Ignored,
        }
    }
}

/// Transition table.
fn next_state(state: UiState, input: InputEvent) -> Option<UiState> {
    use ButtonEvent::*;
    use ButtonId::*;

    let InputEvent { button, event } = input;
    match state {
        UiState::Idle => match (button, event) {
            (Main, SingleClick) => Some(UiState::DriveControl),
            _ => None,
        },
        UiState::DriveControl => match (button, event) {
            (Main, SingleClick) => Some(UiState::Idle),
            (MoveUp, Pressed) => Some(UiState::MoveUp),
            (MoveDown, Pressed) => Some(UiState::MoveDown),
            (Shortcut2, SingleClick) => Some(UiState::MoveTo),
            _ => None,
        },
        UiState::MoveUp => match (button, event) {
            (Main, SingleClick) => Some(UiState::Idle),
            (MoveUp, Released) | (MoveDown, Pressed) => Some(UiState::DriveControl),
            _ => None,
        },
        UiState::MoveDown => match (button, event) {
            (Main, SingleClick) => Some(UiState::Idle),
            (MoveDown, Released) | (MoveUp, Pressed) => Some(UiState::DriveControl),
            _ => None,
        },
        UiState::MoveTo => Some(UiState::DriveControl),
    }
}
