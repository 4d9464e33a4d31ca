//! SQLite implementation of the RecordStore trait.
//!
//! This is the persistent storage backend for the registry. It uses rusqlite
//! with bundled SQLite. Every commit runs inside one transaction.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use shroud_core::{
    AccessPolicy, BindingId, CiphertextHandle, EventRecord, Identity, PolicyBinding, Record,
    RegistryEvent,
};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{Changeset, RecordStore};

/// SQLite-based store implementation.
///
/// Thread-safe via an internal Mutex around the single connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("mutex poisoned: {}", e)))?;
        f(&conn)
    }

    fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("mutex poisoned: {}", e)))?;
        f(&mut conn)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn blob32(row: &rusqlite::Row<'_>, idx: usize, column: &str) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(idx, column.into(), Type::Blob))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn decode_policy(raw: i64) -> Result<AccessPolicy> {
    u8::try_from(raw)
        .ok()
        .and_then(AccessPolicy::from_u8)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown policy discriminant {}", raw)))
}

fn decode_event(seq: i64, payload: &[u8]) -> Result<EventRecord> {
    let event = RegistryEvent::from_bytes(payload)
        .map_err(|e| StoreError::Serialization(format!("event {}: {}", seq, e)))?;
    Ok(EventRecord {
        seq: seq as u64,
        event,
    })
}

fn last_seq(conn: &Connection) -> Result<u64> {
    let seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM events", [], |row| {
        row.get(0)
    })?;
    Ok(seq as u64)
}

fn write_changeset(tx: &Transaction<'_>, changeset: Changeset) -> Result<Vec<EventRecord>> {
    let now = now_millis();

    for (identity, record) in &changeset.records {
        tx.execute(
            "INSERT INTO records (identity, present, display_name, attribute_handle, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(identity) DO UPDATE SET
                present = excluded.present,
                display_name = excluded.display_name,
                attribute_handle = excluded.attribute_handle,
                updated_at = excluded.updated_at",
            params![
                identity.as_bytes().as_slice(),
                record.present,
                record.display_name,
                record.attribute_handle.as_bytes().as_slice(),
                now,
            ],
        )?;
    }

    for binding in &changeset.bindings {
        tx.execute(
            "INSERT INTO bindings (handle, owner, policy, lineage, bound_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(handle) DO UPDATE SET
                owner = excluded.owner,
                policy = excluded.policy,
                lineage = excluded.lineage,
                bound_at = excluded.bound_at",
            params![
                binding.handle.as_bytes().as_slice(),
                binding.owner.as_bytes().as_slice(),
                binding.policy.to_u8(),
                to_sql_int(binding.lineage.get()),
                now,
            ],
        )?;
    }

    if let Some(administrator) = &changeset.administrator {
        tx.execute(
            "UPDATE registry_meta SET administrator = ?1 WHERE id = 1",
            params![administrator.as_bytes().as_slice()],
        )?;
    }

    let mut seq = last_seq(tx)?;
    let mut committed = Vec::with_capacity(changeset.events.len());
    for event in changeset.events {
        seq += 1;
        tx.execute(
            "INSERT INTO events (seq, kind, subject, payload, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                to_sql_int(seq),
                event.kind(),
                event.subject().map(|id| id.as_bytes().to_vec()),
                event.to_bytes(),
                now,
            ],
        )?;
        committed.push(EventRecord { seq, event });
    }

    Ok(committed)
}

impl RecordStore for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────

    fn get_record(&self, identity: &Identity) -> Result<Record> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    "SELECT present, display_name, attribute_handle
                     FROM records WHERE identity = ?1",
                    params![identity.as_bytes().as_slice()],
                    |row| {
                        Ok(Record {
                            present: row.get(0)?,
                            display_name: row.get(1)?,
                            attribute_handle: CiphertextHandle::from_bytes(blob32(
                                row,
                                2,
                                "attribute_handle",
                            )?),
                        })
                    },
                )
                .optional()?;
            Ok(record.unwrap_or_default())
        })
    }

    fn list_registered(&self) -> Result<Vec<Identity>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT identity FROM records WHERE present = 1 ORDER BY identity",
            )?;
            let ids = stmt
                .query_map([], |row| Ok(Identity::from_bytes(blob32(row, 0, "identity")?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Policy bindings
    // ─────────────────────────────────────────────────────────────────────────

    fn get_binding(&self, handle: &CiphertextHandle) -> Result<Option<PolicyBinding>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT owner, policy, lineage FROM bindings WHERE handle = ?1",
                    params![handle.as_bytes().as_slice()],
                    |row| {
                        Ok((
                            blob32(row, 0, "owner")?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                None => Ok(None),
                Some((owner, policy, lineage)) => Ok(Some(PolicyBinding {
                    handle: *handle,
                    owner: Identity::from_bytes(owner),
                    policy: decode_policy(policy)?,
                    lineage: BindingId(lineage as u64),
                })),
            }
        })
    }

    fn next_binding_id(&self) -> Result<BindingId> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let next: i64 = tx.query_row(
                "SELECT next_binding_id FROM registry_meta WHERE id = 1",
                [],
                |row| row.get(0),
            )?;
            tx.execute(
                "UPDATE registry_meta SET next_binding_id = ?1 WHERE id = 1",
                params![next + 1],
            )?;
            tx.commit()?;
            Ok(BindingId(next as u64))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Role
    // ─────────────────────────────────────────────────────────────────────────

    fn administrator(&self) -> Result<Option<Identity>> {
        self.with_conn(|conn| {
            let bytes: Option<Vec<u8>> = conn.query_row(
                "SELECT administrator FROM registry_meta WHERE id = 1",
                [],
                |row| row.get(0),
            )?;
            bytes
                .map(|b| {
                    <[u8; 32]>::try_from(b.as_slice())
                        .map(Identity::from_bytes)
                        .map_err(|_| StoreError::InvalidData("administrator is not 32 bytes".into()))
                })
                .transpose()
        })
    }

    fn initialize_administrator(&self, administrator: &Identity) -> Result<Identity> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE registry_meta SET administrator = ?1
                 WHERE id = 1 AND administrator IS NULL",
                params![administrator.as_bytes().as_slice()],
            )?;
            let persisted = tx.query_row(
                "SELECT administrator FROM registry_meta WHERE id = 1",
                [],
                |row| blob32(row, 0, "administrator"),
            )?;
            tx.commit()?;
            Ok(Identity::from_bytes(persisted))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commit and event log
    // ─────────────────────────────────────────────────────────────────────────

    fn commit(&self, changeset: Changeset) -> Result<Vec<EventRecord>> {
        if changeset.is_empty() {
            return Ok(Vec::new());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            // Dropping the transaction on error rolls everything back.
            let committed = write_changeset(&tx, changeset)?;
            tx.commit()?;
            Ok(committed)
        })
    }

    fn events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, payload FROM events WHERE seq > ?1 ORDER BY seq LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(
                    params![
                        to_sql_int(after_seq),
                        i64::try_from(limit).unwrap_or(i64::MAX)
                    ],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.iter()
                .map(|(seq, payload)| decode_event(*seq, payload))
                .collect()
        })
    }

    fn last_event_seq(&self) -> Result<u64> {
        self.with_conn(last_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RecordStoreExt;

    fn id(byte: u8) -> Identity {
        Identity::from_bytes([byte; 32])
    }

    fn handle(byte: u8) -> CiphertextHandle {
        CiphertextHandle::from_bytes([byte; 32])
    }

    #[test]
    fn test_record_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.get_record(&id(1)).unwrap(), Record::absent());

        let record = Record::registered("alice", handle(7));
        store.put_record(&id(1), &record).unwrap();
        assert_eq!(store.get_record(&id(1)).unwrap(), record);

        store.put_record(&id(1), &Record::absent()).unwrap();
        assert_eq!(store.get_record(&id(1)).unwrap(), Record::absent());
        assert!(store.list_registered().unwrap().is_empty());
    }

    #[test]
    fn test_binding_overwrite() {
        let store = SqliteStore::open_memory().unwrap();
        let mut binding = PolicyBinding {
            handle: handle(3),
            owner: id(1),
            policy: AccessPolicy::OwnerAndRegistry,
            lineage: store.next_binding_id().unwrap(),
        };
        store.put_binding(&binding).unwrap();

        binding.policy = AccessPolicy::Public;
        store.put_binding(&binding).unwrap();

        assert_eq!(store.get_binding(&handle(3)).unwrap(), Some(binding));
        assert_eq!(store.get_binding(&handle(4)).unwrap(), None);
    }

    #[test]
    fn test_commit_writes_everything() {
        let store = SqliteStore::open_memory().unwrap();
        store.initialize_administrator(&id(9)).unwrap();

        let lineage = store.next_binding_id().unwrap();
        let committed = store
            .commit(
                Changeset::new()
                    .put_record(id(1), Record::registered("alice", handle(1)))
                    .put_binding(PolicyBinding {
                        handle: handle(1),
                        owner: id(1),
                        policy: AccessPolicy::OwnerAndRegistry,
                        lineage,
                    })
                    .set_administrator(id(8))
                    .emit(RegistryEvent::Registered {
                        identity: id(1),
                        display_name: "alice".into(),
                        handle: handle(1),
                    })
                    .emit(RegistryEvent::AdministratorTransferred {
                        previous: id(9),
                        current: id(8),
                    }),
            )
            .unwrap();

        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].seq, 1);
        assert_eq!(store.list_registered().unwrap(), vec![id(1)]);
        assert_eq!(store.administrator().unwrap(), Some(id(8)));
        assert_eq!(store.events_since(0, 100).unwrap(), committed);
        assert_eq!(store.events_since(1, 100).unwrap(), committed[1..].to_vec());
        assert_eq!(store.events_since(0, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_binding_ids_are_monotonic() {
        let store = SqliteStore::open_memory().unwrap();
        let ids: Vec<BindingId> = (0..5).map(|_| store.next_binding_id().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_administrator_initialized_once() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.administrator().unwrap(), None);
        assert_eq!(store.initialize_administrator(&id(1)).unwrap(), id(1));
        assert_eq!(store.initialize_administrator(&id(2)).unwrap(), id(1));
    }

    #[test]
    fn test_reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.initialize_administrator(&id(9)).unwrap();
            store
                .commit(
                    Changeset::new()
                        .put_record(id(1), Record::registered("alice", handle(1)))
                        .emit(RegistryEvent::Cleared {
                            identity: id(2),
                            lineage: BindingId(1),
                        }),
                )
                .unwrap();
            store.next_binding_id().unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_record(&id(1)).unwrap(), Record::registered("alice", handle(1)));
        assert_eq!(store.administrator().unwrap(), Some(id(9)));
        assert_eq!(store.last_event_seq().unwrap(), 1);
        assert_eq!(store.next_binding_id().unwrap(), BindingId(2));
    }

    #[test]
    fn test_corrupt_event_payload_reported() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO events (seq, kind, subject, payload, committed_at)
                     VALUES (1, 'cleared', NULL, X'FF', 0)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            store.events_since(0, 10),
            Err(StoreError::Serialization(_))
        ));
    }
}
