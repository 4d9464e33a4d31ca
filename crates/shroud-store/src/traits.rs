//! RecordStore trait: the abstract interface for registry persistence.
//!
//! This trait allows the registry to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use shroud_core::{
    BindingId, CiphertextHandle, EventRecord, Identity, PolicyBinding, Record, RegistryEvent,
};

use crate::error::Result;

/// The staged writes of a single registry operation.
///
/// A changeset is applied by [`RecordStore::commit`] as one unit: either
/// every write lands, or none does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    /// Records to overwrite.
    pub records: Vec<(Identity, Record)>,
    /// Policy bindings to insert or overwrite (keyed by handle).
    pub bindings: Vec<PolicyBinding>,
    /// New administrator, if the role moves.
    pub administrator: Option<Identity>,
    /// Events to append, in order.
    pub events: Vec<RegistryEvent>,
}

impl Changeset {
    /// An empty changeset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a record write.
    pub fn put_record(mut self, identity: Identity, record: Record) -> Self {
        self.records.push((identity, record));
        self
    }

    /// Stage a binding write.
    pub fn put_binding(mut self, binding: PolicyBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Stage an administrator change.
    pub fn set_administrator(mut self, administrator: Identity) -> Self {
        self.administrator = Some(administrator);
        self
    }

    /// Stage an event.
    pub fn emit(mut self, event: RegistryEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
            && self.bindings.is_empty()
            && self.administrator.is_none()
            && self.events.is_empty()
    }
}

/// The RecordStore trait: synchronous interface for registry persistence.
///
/// Registry operations are bounded and never suspend, so the store is
/// synchronous. Implementations must be safe to share across threads.
///
/// # Design Notes
///
/// - **Total reads**: `get_record` returns [`Record::absent`] for unknown
///   identities. Errors only report back-end failures.
/// - **Atomic commits**: `commit` applies a [`Changeset`] all-or-nothing and
///   assigns event sequence numbers.
/// - **Binding IDs**: `next_binding_id` hands out strictly increasing IDs.
///   An ID allocated by an operation that later fails is simply skipped.
pub trait RecordStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the record for an identity.
    fn get_record(&self, identity: &Identity) -> Result<Record>;

    /// List identities whose record is currently present.
    fn list_registered(&self) -> Result<Vec<Identity>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Policy bindings
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the binding for a handle, if the handle was ever bound.
    fn get_binding(&self, handle: &CiphertextHandle) -> Result<Option<PolicyBinding>>;

    /// Allocate the ID for a new bind event.
    fn next_binding_id(&self) -> Result<BindingId>;

    // ─────────────────────────────────────────────────────────────────────────
    // Role
    // ─────────────────────────────────────────────────────────────────────────

    /// The current administrator, if one was ever set.
    fn administrator(&self) -> Result<Option<Identity>>;

    /// Set the administrator if none is set yet, returning the persisted one.
    fn initialize_administrator(&self, administrator: &Identity) -> Result<Identity>;

    // ─────────────────────────────────────────────────────────────────────────
    // Commit and event log
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a changeset atomically and return the committed events.
    fn commit(&self, changeset: Changeset) -> Result<Vec<EventRecord>>;

    /// Events with `seq > after_seq`, ordered by seq, at most `limit`.
    fn events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>>;

    /// Sequence number of the last committed event (0 if none).
    fn last_event_seq(&self) -> Result<u64>;
}

/// Extension trait for common store patterns.
pub trait RecordStoreExt: RecordStore {
    /// Overwrite a single record unconditionally.
    fn put_record(&self, identity: &Identity, record: &Record) -> Result<()> {
        self.commit(Changeset::new().put_record(*identity, record.clone()))
            .map(|_| ())
    }

    /// Insert or overwrite a single binding.
    fn put_binding(&self, binding: &PolicyBinding) -> Result<()> {
        self.commit(Changeset::new().put_binding(binding.clone()))
            .map(|_| ())
    }

    /// Whether an identity's record is present.
    fn is_registered(&self, identity: &Identity) -> Result<bool> {
        Ok(self.get_record(identity)?.present)
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn get_record(&self, identity: &Identity) -> Result<Record> {
        (**self).get_record(identity)
    }

    fn list_registered(&self) -> Result<Vec<Identity>> {
        (**self).list_registered()
    }

    fn get_binding(&self, handle: &CiphertextHandle) -> Result<Option<PolicyBinding>> {
        (**self).get_binding(handle)
    }

    fn next_binding_id(&self) -> Result<BindingId> {
        (**self).next_binding_id()
    }

    fn administrator(&self) -> Result<Option<Identity>> {
        (**self).administrator()
    }

    fn initialize_administrator(&self, administrator: &Identity) -> Result<Identity> {
        (**self).initialize_administrator(administrator)
    }

    fn commit(&self, changeset: Changeset) -> Result<Vec<EventRecord>> {
        (**self).commit(changeset)
    }

    fn events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>> {
        (**self).events_since(after_seq, limit)
    }

    fn last_event_seq(&self) -> Result<u64> {
        (**self).last_event_seq()
    }
}
