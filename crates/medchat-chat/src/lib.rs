//! Streaming chat session for the medical assistant.
//!
//! Owns the conversation transcript, drives one streamed reply at a time
//! through a `ChatTransport`, and notifies subscribers of every state change
//! and partial-buffer update.

pub mod controller;
pub mod error;
pub mod events;
pub mod state;

pub use controller::{SessionController, TurnHandle};
pub use error::ChatError;
pub use events::{SessionEvent, TurnOutcome};
pub use state::SessionState;
