//! In-memory implementation of the RecordStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use shroud_core::{
    BindingId, CiphertextHandle, EventRecord, Identity, PolicyBinding, Record,
};

use crate::error::{Result, StoreError};
use crate::traits::{Changeset, RecordStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; a
/// commit holds the write lock for its whole changeset, which is what makes
/// it atomic.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Records indexed by identity.
    records: HashMap<Identity, Record>,

    /// Bindings indexed by handle.
    bindings: HashMap<CiphertextHandle, PolicyBinding>,

    /// Current administrator.
    administrator: Option<Identity>,

    /// Last allocated binding ID.
    last_binding_id: u64,

    /// Event log, seq = index + 1.
    events: Vec<EventRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn get_record(&self, identity: &Identity) -> Result<Record> {
        let inner = self.read()?;
        Ok(inner.records.get(identity).cloned().unwrap_or_default())
    }

    fn list_registered(&self) -> Result<Vec<Identity>> {
        let inner = self.read()?;
        let mut ids: Vec<Identity> = inner
            .records
            .iter()
            .filter(|(_, r)| r.present)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn get_binding(&self, handle: &CiphertextHandle) -> Result<Option<PolicyBinding>> {
        let inner = self.read()?;
        Ok(inner.bindings.get(handle).cloned())
    }

    fn next_binding_id(&self) -> Result<BindingId> {
        let mut inner = self.write()?;
        inner.last_binding_id += 1;
        Ok(BindingId(inner.last_binding_id))
    }

    fn administrator(&self) -> Result<Option<Identity>> {
        Ok(self.read()?.administrator)
    }

    fn initialize_administrator(&self, administrator: &Identity) -> Result<Identity> {
        let mut inner = self.write()?;
        Ok(*inner.administrator.get_or_insert(*administrator))
    }

    fn commit(&self, changeset: Changeset) -> Result<Vec<EventRecord>> {
        let mut inner = self.write()?;

        // Nothing below can fail, so the changeset lands whole.
        for (identity, record) in changeset.records {
            inner.records.insert(identity, record);
        }
        for binding in changeset.bindings {
            inner.bindings.insert(binding.handle, binding);
        }
        if let Some(administrator) = changeset.administrator {
            inner.administrator = Some(administrator);
        }

        let mut committed = Vec::with_capacity(changeset.events.len());
        for event in changeset.events {
            let record = EventRecord {
                seq: inner.events.len() as u64 + 1,
                event,
            };
            inner.events.push(record.clone());
            committed.push(record);
        }

        Ok(committed)
    }

    fn events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>> {
        let inner = self.read()?;
        let start = usize::try_from(after_seq)
            .unwrap_or(usize::MAX)
            .min(inner.events.len());
        Ok(inner.events[start..].iter().take(limit).cloned().collect())
    }

    fn last_event_seq(&self) -> Result<u64> {
        Ok(self.read()?.events.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RecordStoreExt;
    use proptest::prelude::*;
    use shroud_core::{AccessPolicy, RegistryEvent};

    fn id(byte: u8) -> Identity {
        Identity::from_bytes([byte; 32])
    }

    fn cleared(byte: u8) -> RegistryEvent {
        RegistryEvent::Cleared {
            identity: id(byte),
            lineage: BindingId(u64::from(byte)),
        }
    }

    #[test]
    fn test_get_is_total() {
        let store = MemoryStore::new();
        assert_eq!(store.get_record(&id(1)).unwrap(), Record::absent());
        assert!(!store.is_registered(&id(1)).unwrap());
    }

    #[test]
    fn test_put_overwrites() {
        let store = MemoryStore::new();
        let h1 = CiphertextHandle::from_bytes([1; 32]);
        let h2 = CiphertextHandle::from_bytes([2; 32]);

        store.put_record(&id(1), &Record::registered("alice", h1)).unwrap();
        store.put_record(&id(1), &Record::registered("alicia", h2)).unwrap();

        assert_eq!(store.get_record(&id(1)).unwrap(), Record::registered("alicia", h2));
        assert_eq!(store.get_record(&id(2)).unwrap(), Record::absent());
    }

    #[test]
    fn test_commit_assigns_event_seqs() {
        let store = MemoryStore::new();
        let committed = store
            .commit(
                Changeset::new()
                    .emit(cleared(1))
                    .emit(cleared(2)),
            )
            .unwrap();

        assert_eq!(committed.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.last_event_seq().unwrap(), 2);
        assert_eq!(store.events_since(1, 10).unwrap().len(), 1);
        assert!(store.events_since(5, 10).unwrap().is_empty());
    }

    #[test]
    fn test_binding_ids_increase() {
        let store = MemoryStore::new();
        let a = store.next_binding_id().unwrap();
        let b = store.next_binding_id().unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_binding_roundtrip() {
        let store = MemoryStore::new();
        let binding = PolicyBinding {
            handle: CiphertextHandle::from_bytes([5; 32]),
            owner: id(1),
            policy: AccessPolicy::OwnerAndRegistry,
            lineage: BindingId(1),
        };
        store.put_binding(&binding).unwrap();
        assert_eq!(store.get_binding(&binding.handle).unwrap(), Some(binding));
    }

    #[test]
    fn test_initialize_administrator_keeps_first() {
        let store = MemoryStore::new();
        assert_eq!(store.initialize_administrator(&id(1)).unwrap(), id(1));
        assert_eq!(store.initialize_administrator(&id(2)).unwrap(), id(1));
        assert_eq!(store.administrator().unwrap(), Some(id(1)));
    }

    proptest! {
        #[test]
        fn test_event_log_is_contiguous(batches in prop::collection::vec(0usize..4, 1..12)) {
            let store = MemoryStore::new();
            let mut total = 0u64;
            for size in batches {
                let changeset = (0..size).fold(Changeset::new(), |cs, n| {
                    cs.emit(cleared(n as u8 + 1))
                });
                let committed = store.commit(changeset).unwrap();
                for record in &committed {
                    total += 1;
                    prop_assert_eq!(record.seq, total);
                }
            }
            let log = store.events_since(0, usize::MAX).unwrap();
            prop_assert_eq!(log.len() as u64, total);
            prop_assert_eq!(store.last_event_seq().unwrap(), total);
        }
    }
}
