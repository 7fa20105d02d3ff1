//! Durable transcript persistence.
//!
//! Provides a WAL-mode SQLite database holding named slots, and the
//! `TranscriptStore` seam the session controller persists through.

pub mod db;
pub mod migrations;
pub mod transcript;

pub use db::Database;
pub use transcript::{MemoryTranscriptStore, SqliteTranscriptStore, TranscriptStore};
