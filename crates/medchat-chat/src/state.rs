//! Session states and the transitions allowed between them.
//!
//! - Idle -> AwaitingFirstByte (turn sent)
//! - AwaitingFirstByte -> Streaming (first chunk arrived)
//! - AwaitingFirstByte -> Finalizing (stream ended without chunks)
//! - Streaming -> Finalizing (stream ended)
//! - Finalizing -> Idle (reply committed)
//! - any busy state -> Idle (failure or cancel)

use std::fmt;

/// Lifecycle state of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Ready to accept a turn.
    Idle,
    /// Request sent, no chunk received yet.
    AwaitingFirstByte,
    /// At least one chunk received.
    Streaming,
    /// Stream ended; the reply is being committed.
    Finalizing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::AwaitingFirstByte => write!(f, "AwaitingFirstByte"),
            SessionState::Streaming => write!(f, "Streaming"),
            SessionState::Finalizing => write!(f, "Finalizing"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::AwaitingFirstByte)
                | (SessionState::AwaitingFirstByte, SessionState::Streaming)
                | (SessionState::AwaitingFirstByte, SessionState::Finalizing)
                | (SessionState::Streaming, SessionState::Finalizing)
                | (SessionState::Finalizing, SessionState::Idle)
                // Failure and cancel
                | (SessionState::AwaitingFirstByte, SessionState::Idle)
                | (SessionState::Streaming, SessionState::Idle)
        )
    }

    /// Whether a turn is in flight.
    pub fn is_busy(&self) -> bool {
        *self != SessionState::Idle
    }
}

// =============================================================================
// Tests
// =============================================================================
