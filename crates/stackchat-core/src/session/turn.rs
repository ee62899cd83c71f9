//! Per-turn state machine.

use serde::{Deserialize, Serialize};

/// Progress of the current chat turn.
///
/// `Idle -> AwaitingResponse -> {Completed, Failed}`. A new turn may start
/// from any state except `AwaitingResponse`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    #[default]
    Idle,
    /// The user message is appended and the completion request is in flight.
    AwaitingResponse,
    Completed,
    Failed,
}

impl TurnState {
    pub fn can_begin(&self) -> bool {
        !matches!(self, TurnState::AwaitingResponse)
    }
}
