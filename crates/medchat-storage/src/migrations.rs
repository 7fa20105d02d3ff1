//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use medchat_core::error::MedchatError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), MedchatError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MedchatError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MedchatError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: slots");
    }

    Ok(())
}

/// Version 1: named key-value slots.
fn apply_v1(conn: &Connection) -> Result<(), MedchatError> {
    conn.execute_batch(
        "
        BEGIN;
        CREATE TABLE IF NOT EXISTS slots (
            name        TEXT PRIMARY KEY NOT NULL,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL
        );
        INSERT INTO schema_migrations (version, name) VALUES (1, 'slots');
        COMMIT;
        ",
    )
    .map_err(|e| MedchatError::Storage(format!("Migration v1 failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_slots_name_is_unique() {
        let conn = open_test_conn();
        conn.execute(
            "INSERT INTO slots (name, value, updated_at) VALUES ('a', '[]', 0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO slots (name, value, updated_at) VALUES ('a', '[]', 1)",
            [],
        );
        assert!(dup.is_err());
    }
}
