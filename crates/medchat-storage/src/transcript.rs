//! Transcript persistence behind a named slot.
//!
//! The transcript is stored as one JSON array of `{role, content, timestamp}`
//! records. A write replaces the whole slot in a single statement, so a
//! subsequent load observes either the previous or the new transcript.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use medchat_core::error::MedchatError;
use medchat_core::types::{Transcript, Turn};

use crate::db::Database;

/// Durable storage for the ordered conversation.
///
/// The session controller calls `save` and `clear` while holding its session
/// lock, so the stored transcript never lags behind an announced commit.
/// Implementations must return quickly and must not block on the network.
pub trait TranscriptStore: Send + Sync {
    /// Returns the stored transcript, or an empty one when nothing was saved
    /// yet. Malformed stored data is discarded rather than reported.
    fn load(&self) -> Result<Transcript, MedchatError>;

    /// Replaces the stored transcript.
    fn save(&self, turns: &[Turn]) -> Result<(), MedchatError>;

    /// Removes the stored transcript.
    fn clear(&self) -> Result<(), MedchatError>;
}

fn decode(slot: &str, raw: &str) -> Transcript {
    match serde_json::from_str::<Transcript>(raw) {
        Ok(turns) => turns,
        Err(e) => {
            warn!(slot = %slot, error = %e, "Discarding malformed transcript");
            Vec::new()
        }
    }
}

// =============================================================================
// SQLite
// =============================================================================

/// Transcript store backed by a row in the `slots` table.
#[derive(Debug, Clone)]
pub struct SqliteTranscriptStore {
    db: Arc<Database>,
    slot: String,
}

impl SqliteTranscriptStore {
    pub fn new(db: Arc<Database>, slot: impl Into<String>) -> Self {
        Self {
            db,
            slot: slot.into(),
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl TranscriptStore for SqliteTranscriptStore {
    fn load(&self) -> Result<Transcript, MedchatError> {
        let raw: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM slots WHERE name = ?1",
                params![self.slot],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| MedchatError::Storage(format!("Failed to read slot: {}", e)))
        })?;

        Ok(raw.map(|raw| decode(&self.slot, &raw)).unwrap_or_default())
    }

    fn save(&self, turns: &[Turn]) -> Result<(), MedchatError> {
        let value = serde_json::to_string(turns)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO slots (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![self.slot, value, Utc::now().timestamp()],
            )
            .map_err(|e| MedchatError::Storage(format!("Failed to write slot: {}", e)))
        })?;
        debug!(slot = %self.slot, turns = turns.len(), "Transcript saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), MedchatError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM slots WHERE name = ?1", params![self.slot])
                .map_err(|e| MedchatError::Storage(format!("Failed to clear slot: {}", e)))
        })?;
        debug!(slot = %self.slot, "Transcript cleared");
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local store. Keeps the serialized form so it shares the encode and
/// decode path with the durable store.
#[derive(Debug, Default)]
pub struct MemoryTranscriptStore {
    raw: Mutex<Option<String>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with raw contents, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// Raw slot contents, if any.
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().ok().and_then(|raw| raw.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, MedchatError> {
        self.raw
            .lock()
            .map_err(|e| MedchatError::Storage(format!("Store lock poisoned: {}", e)))
    }
}

impl TranscriptStore for MemoryTranscriptStore {
    fn load(&self) -> Result<Transcript, MedchatError> {
        let raw = self.lock()?;
        Ok(raw
            .as_deref()
            .map(|raw| decode("memory", raw))
            .unwrap_or_default())
    }

    fn save(&self, turns: &[Turn]) -> Result<(), MedchatError> {
        let value = serde_json::to_string(turns)?;
        *self.lock()? = Some(value);
        Ok(())
    }

    fn clear(&self) -> Result<(), MedchatError> {
        *self.lock()? = None;
        Ok(())
    }
}
