use medchat_core::types::Turn;

use crate::state::SessionState;

/// Notification sent to every session subscriber.
///
/// Subscribers receive events in the order the controller produced them, so
/// replaying `PartialUpdated` values reproduces every intermediate buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session moved between states.
    StateChanged { from: SessionState, to: SessionState },

    /// A chunk was appended. Carries the full buffer after the append.
    PartialUpdated { buffer: String },

    /// A turn was appended to the transcript. Covers the user message, the
    /// assistant reply, and the apology that replaces a failed reply.
    TurnCommitted(Turn),

    /// The in-flight reply failed and its partial buffer was discarded.
    TurnFailed { reason: String },

    /// The transcript was emptied.
    HistoryCleared,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The reply streamed to completion and was committed.
    Completed(Turn),
    /// The reply failed; the committed apology turn.
    Failed(Turn),
    /// The turn was abandoned before it finished.
    Cancelled,
}

impl TurnOutcome {
    /// The assistant turn this outcome committed, if any.
    pub fn turn(&self) -> Option<&Turn> {
        match self {
            TurnOutcome::Completed(turn) | TurnOutcome::Failed(turn) => Some(turn),
            TurnOutcome::Cancelled => None,
        }
    }
}
