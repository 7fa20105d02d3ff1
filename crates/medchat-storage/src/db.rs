//! SQLite connection holding the persisted chat slots.
//!
//! One connection behind a mutex, opened in WAL mode so a reader never sees
//! a half-written slot.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use medchat_core::error::MedchatError;

use crate::migrations;

/// Shared handle to the medchat database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and run pending
    /// migrations.
    pub fn new(path: &Path) -> Result<Self, MedchatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| MedchatError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| MedchatError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, MedchatError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MedchatError::Storage(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` against the connection while holding the lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, MedchatError>
    where
        F: FnOnce(&Connection) -> Result<T, MedchatError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MedchatError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
