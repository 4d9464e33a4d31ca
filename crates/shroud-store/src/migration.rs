//! Database schema migrations for SQLite.
//!
//! Each migration transforms the schema from version N to N+1 and is
//! recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: running it on an up-to-date database does nothing.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated registry schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per identity ever written; cleared records stay as present = 0
        CREATE TABLE records (
            identity BLOB PRIMARY KEY,        -- 32 bytes, Ed25519 public key
            present INTEGER NOT NULL,         -- 0 or 1
            display_name TEXT NOT NULL,
            attribute_handle BLOB NOT NULL,   -- 32 bytes, zero handle when absent
            updated_at INTEGER NOT NULL       -- local time of last write (Unix ms)
        );

        -- Decryption policy per handle
        CREATE TABLE bindings (
            handle BLOB PRIMARY KEY,          -- 32 bytes
            owner BLOB NOT NULL,              -- 32 bytes
            policy INTEGER NOT NULL,          -- AccessPolicy discriminant
            lineage INTEGER NOT NULL,         -- BindingId of the bind event
            bound_at INTEGER NOT NULL
        );

        -- Singleton registry state
        CREATE TABLE registry_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            administrator BLOB,               -- 32 bytes, NULL until initialized
            next_binding_id INTEGER NOT NULL
        );

        INSERT INTO registry_meta (id, administrator, next_binding_id) VALUES (1, NULL, 1);

        -- Append-only event log
        CREATE TABLE events (
            seq INTEGER PRIMARY KEY,          -- starts at 1
            kind TEXT NOT NULL,
            subject BLOB,                     -- 32 bytes, NULL for role events
            payload BLOB NOT NULL,            -- CBOR-encoded RegistryEvent
            committed_at INTEGER NOT NULL
        );

        CREATE INDEX idx_records_present ON records(present);
        CREATE INDEX idx_bindings_owner ON bindings(owner);
        CREATE INDEX idx_events_subject ON events(subject);
        "#,
    )?;

    Ok(())
}

/// Current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in ["records", "bindings", "registry_meta", "events", "schema_migrations"] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);

        let meta_rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM registry_meta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(meta_rows, 1);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
