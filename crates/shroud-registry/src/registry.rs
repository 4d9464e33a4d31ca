//! The Registry: per-identity confidential records and the administrator role.
//!
//! Every mutating operation validates its input and takes its locks before
//! touching the encryption service. Store writes go through a single
//! [`Changeset`] commit, after which its events are published in sequence
//! order. A failure anywhere before the commit leaves the store untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;

use shroud_core::{
    validate_display_name, validate_identity, validate_plain_value, validate_proof, AccessPolicy,
    CiphertextHandle, EventRecord, Identity, PolicyBinding, Record, RegistryEvent, RegistryId,
};
use shroud_perms::{AccessControl, CiphertextService, Disclosure, ExternalCiphertext, InputProof};
use shroud_store::{Changeset, RecordStore, RecordStoreExt, StoreError};

use crate::error::{RegistryError, Result};

/// Configuration for a registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Identifier the collaborator knows this registry by.
    pub registry_id: RegistryId,
    /// Largest value accepted by `register_with_plain_value`.
    pub max_plain_value: u64,
    /// Longest display name, in bytes.
    pub max_name_len: usize,
    /// Buffered events per live subscriber.
    pub event_channel_capacity: usize,
}

impl RegistryConfig {
    /// Default limits for the given registry.
    pub fn for_registry(registry_id: RegistryId) -> Self {
        Self {
            registry_id,
            ..Self::default()
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_id: RegistryId::ZERO,
            max_plain_value: 255,
            max_name_len: 64,
            event_channel_capacity: 256,
        }
    }
}

/// The registry state machine.
///
/// Operations on one identity are serialized; distinct identities proceed
/// independently. Administrator-gated operations also hold the role lock,
/// shared for ordinary admin actions and exclusive for a transfer. The
/// role lock is always taken before an identity lock.
///
/// An identity's lock lives in the table only while some operation on that
/// identity is in flight.
pub struct Registry<S: RecordStore, C: CiphertextService> {
    store: S,
    service: C,
    config: RegistryConfig,
    identity_locks: Mutex<HashMap<Identity, Arc<Mutex<()>>>>,
    role: RwLock<()>,
    publish: Mutex<()>,
    events: broadcast::Sender<EventRecord>,
}

impl<S: RecordStore, C: CiphertextService> Registry<S, C> {
    /// Open a registry over `store`.
    ///
    /// On a fresh store `deployer` becomes the administrator and the
    /// collaborator's zero handle is bound as public. On a store that
    /// already has an administrator, it is kept and `deployer` is ignored.
    pub fn open(store: S, service: C, config: RegistryConfig, deployer: &Identity) -> Result<Self> {
        validate_identity(deployer)?;

        let administrator = store.initialize_administrator(deployer)?;
        service.set_registry_operator(&config.registry_id, &administrator)?;

        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));

        let registry = Self {
            store,
            service,
            config,
            identity_locks: Mutex::new(HashMap::new()),
            role: RwLock::new(()),
            publish: Mutex::new(()),
            events,
        };
        registry.bind_canonical_zero()?;
        let last_seq = registry.store.last_event_seq()?;

        tracing::debug!(
            registry = %registry.config.registry_id,
            %administrator,
            last_seq,
            "registry opened"
        );

        Ok(registry)
    }

    /// The registry's identifier.
    pub fn registry_id(&self) -> &RegistryId {
        &self.config.registry_id
    }

    /// The registry's configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the encryption service reference.
    pub fn service(&self) -> &C {
        &self.service
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register `caller` with an externally encrypted attribute.
    ///
    /// Re-registering an identity overwrites its record and binds a new handle.
    pub fn register_with_ciphertext(
        &self,
        caller: &Identity,
        display_name: &str,
        external: &ExternalCiphertext,
        proof: &InputProof,
    ) -> Result<CiphertextHandle> {
        validate_identity(caller)?;
        validate_display_name(display_name, self.config.max_name_len)?;
        validate_proof(external.as_bytes(), proof.as_bytes())?;

        self.with_identity(caller, || {
            let handle = self
                .service
                .import_external(external, proof, caller, &self.config.registry_id)?;
            self.store_registration(caller, display_name, handle)?;
            Ok(handle)
        })
    }

    /// Register `caller` with a plaintext value the collaborator encrypts.
    pub fn register_with_plain_value(
        &self,
        caller: &Identity,
        display_name: &str,
        value: u64,
    ) -> Result<CiphertextHandle> {
        validate_identity(caller)?;
        validate_display_name(display_name, self.config.max_name_len)?;
        validate_plain_value(value, self.config.max_plain_value)?;

        self.with_identity(caller, || {
            let handle = self.service.encrypt(value)?;
            self.store_registration(caller, display_name, handle)?;
            Ok(handle)
        })
    }

    /// Replace the caller's display name. The attribute handle is untouched.
    pub fn update_display_name(&self, caller: &Identity, display_name: &str) -> Result<()> {
        validate_display_name(display_name, self.config.max_name_len)?;

        self.with_identity(caller, || {
            let record = self.require_registered(caller)?;
            let changeset = Changeset::new()
                .put_record(*caller, record.with_display_name(display_name))
                .emit(RegistryEvent::DisplayNameUpdated {
                    identity: *caller,
                    display_name: display_name.to_string(),
                });
            self.commit(changeset)?;

            tracing::debug!(identity = %caller, "display name updated");
            Ok(())
        })
    }

    /// Replace the caller's attribute with a new external ciphertext.
    ///
    /// The new handle starts at `OwnerAndRegistry` even if the old one was
    /// public.
    pub fn update_attribute(
        &self,
        caller: &Identity,
        external: &ExternalCiphertext,
        proof: &InputProof,
    ) -> Result<CiphertextHandle> {
        validate_proof(external.as_bytes(), proof.as_bytes())?;

        self.with_identity(caller, || {
            let record = self.require_registered(caller)?;
            let handle = self
                .service
                .import_external(external, proof, caller, &self.config.registry_id)?;
            let binding = self.bind(caller, handle)?;

            let record = record.with_handle(handle);
            let changeset = Changeset::new()
                .put_binding(binding)
                .emit(RegistryEvent::Registered {
                    identity: *caller,
                    display_name: record.display_name.clone(),
                    handle,
                })
                .put_record(*caller, record);
            self.commit(changeset)?;

            tracing::debug!(identity = %caller, %handle, "attribute updated");
            Ok(handle)
        })
    }

    /// Make the caller's current handle publicly decryptable.
    ///
    /// Disclosing an already public handle succeeds without effect.
    pub fn disclose_own(&self, caller: &Identity) -> Result<()> {
        self.with_identity(caller, || {
            let record = self.require_registered(caller)?;
            self.disclose_current(caller, &record)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Administrator Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Make `target`'s current handle publicly decryptable.
    pub fn disclose_for(&self, caller: &Identity, target: &Identity) -> Result<()> {
        let _role = self.role.read().unwrap_or_else(PoisonError::into_inner);
        self.require_administrator(caller, "disclose another record")?;

        self.with_identity(target, || {
            let record = self.require_registered(target)?;
            self.disclose_current(target, &record)
        })
    }

    /// Reset `target` to the empty record.
    ///
    /// The record points at the canonical zero handle. The bind event gets
    /// its own lineage, carried by the `Cleared` event; the shared zero
    /// binding is left as it is.
    pub fn clear(&self, caller: &Identity, target: &Identity) -> Result<()> {
        let _role = self.role.read().unwrap_or_else(PoisonError::into_inner);
        self.require_administrator(caller, "clear a record")?;

        self.with_identity(target, || {
            self.require_registered(target)?;
            let lineage = self.store.next_binding_id()?;

            let changeset = Changeset::new()
                .put_record(*target, Record::absent())
                .emit(RegistryEvent::Cleared {
                    identity: *target,
                    lineage,
                });
            self.commit(changeset)?;

            tracing::debug!(identity = %target, %lineage, "record cleared");
            Ok(())
        })
    }

    /// Hand the administrator role to `new_administrator`.
    pub fn transfer_administrator(&self, caller: &Identity, new_administrator: &Identity) -> Result<()> {
        let _role = self.role.write().unwrap_or_else(PoisonError::into_inner);
        self.require_administrator(caller, "transfer the administrator role")?;
        validate_identity(new_administrator)?;

        self.service
            .set_registry_operator(&self.config.registry_id, new_administrator)?;

        let changeset = Changeset::new()
            .set_administrator(*new_administrator)
            .emit(RegistryEvent::AdministratorTransferred {
                previous: *caller,
                current: *new_administrator,
            });
        if let Err(err) = self.commit(changeset) {
            // Point the collaborator back at the administrator still on record.
            if let Err(revert) = self
                .service
                .set_registry_operator(&self.config.registry_id, caller)
            {
                tracing::warn!(error = %revert, "failed to restore registry operator");
            }
            return Err(err);
        }

        tracing::debug!(previous = %caller, current = %new_administrator, "administrator transferred");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `identity` has a present record.
    pub fn is_registered(&self, identity: &Identity) -> Result<bool> {
        Ok(self.store.is_registered(identity)?)
    }

    /// `(present, display_name, opaque handle bytes)` for `identity`.
    ///
    /// Unknown identities yield `(false, "", zero handle)`.
    pub fn get_record(&self, identity: &Identity) -> Result<(bool, String, [u8; 32])> {
        let record = self.store.get_record(identity)?;
        let reference = self.service.to_opaque_reference(&record.attribute_handle);
        Ok((record.present, record.display_name, reference))
    }

    /// The full record for `identity`.
    pub fn record(&self, identity: &Identity) -> Result<Record> {
        Ok(self.store.get_record(identity)?)
    }

    /// The caller's current attribute handle.
    pub fn get_own_attribute_handle(&self, caller: &Identity) -> Result<CiphertextHandle> {
        Ok(self.require_registered(caller)?.attribute_handle)
    }

    /// Identities with a present record.
    pub fn registered_identities(&self) -> Result<Vec<Identity>> {
        Ok(self.store.list_registered()?)
    }

    /// The current administrator.
    pub fn administrator(&self) -> Result<Identity> {
        self.store
            .administrator()?
            .ok_or_else(|| StoreError::InvalidData("registry has no administrator".into()).into())
    }

    /// The policy bound to `handle`, if it was ever bound here.
    pub fn policy_of(&self, handle: &CiphertextHandle) -> Result<Option<AccessPolicy>> {
        Ok(self.store.get_binding(handle)?.map(|binding| binding.policy))
    }

    /// The binding of `handle`, if it was ever bound here.
    pub fn binding_of(&self, handle: &CiphertextHandle) -> Result<Option<PolicyBinding>> {
        Ok(self.store.get_binding(handle)?)
    }

    /// Whether `requester` may decrypt `handle`, given an owner and role flag.
    pub fn authorize_decrypt(
        &self,
        handle: &CiphertextHandle,
        requester: &Identity,
        owner: &Identity,
        is_administrator: bool,
    ) -> Result<bool> {
        let binding = self.store.get_binding(handle)?;
        Ok(AccessControl::authorize_decrypt(
            binding.as_ref(),
            requester,
            owner,
            is_administrator,
        ))
    }

    /// Whether `requester` may decrypt `handle`, judged from current state.
    pub fn can_decrypt(&self, handle: &CiphertextHandle, requester: &Identity) -> Result<bool> {
        let Some(binding) = self.store.get_binding(handle)? else {
            return Ok(false);
        };
        let is_administrator = self.store.administrator()?.as_ref() == Some(requester);
        Ok(AccessControl::authorize_decrypt(
            Some(&binding),
            requester,
            &binding.owner,
            is_administrator,
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Committed events after `after_seq`, at most `limit`.
    pub fn events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>> {
        Ok(self.store.events_since(after_seq, limit)?)
    }

    /// Sequence number of the last committed event (0 if none).
    pub fn last_event_seq(&self) -> Result<u64> {
        Ok(self.store.last_event_seq()?)
    }

    /// Subscribe to events committed from now on.
    ///
    /// Events arrive in sequence order across all identities. A subscriber
    /// that lags past the channel capacity should catch up with
    /// [`events_since`](Self::events_since).
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Run `op` holding `identity`'s lock.
    fn with_identity<T>(&self, identity: &Identity, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.identity_lock(identity);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            op()
        };
        self.release_identity_lock(identity, lock);
        result
    }

    fn identity_lock(&self, identity: &Identity) -> Arc<Mutex<()>> {
        let mut table = self
            .identity_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(table.entry(*identity).or_default())
    }

    fn release_identity_lock(&self, identity: &Identity, lock: Arc<Mutex<()>>) {
        let mut table = self
            .identity_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Clones are only taken under the table lock, so a count of two
        // means the table and this caller are the last holders.
        if Arc::strong_count(&lock) == 2 {
            table.remove(identity);
        }
    }

    fn require_registered(&self, identity: &Identity) -> Result<Record> {
        let record = self.store.get_record(identity)?;
        if !record.present {
            return Err(RegistryError::NotRegistered(*identity));
        }
        Ok(record)
    }

    fn require_administrator(&self, caller: &Identity, operation: &'static str) -> Result<()> {
        if self.store.administrator()?.as_ref() != Some(caller) {
            return Err(RegistryError::NotAuthorized {
                caller: *caller,
                operation,
            });
        }
        Ok(())
    }

    fn bind_canonical_zero(&self) -> Result<()> {
        let zero = self.service.zero_value_handle();
        if self.store.get_binding(&zero)?.is_some() {
            return Ok(());
        }

        let lineage = self.store.next_binding_id()?;
        self.commit(Changeset::new().put_binding(AccessControl::canonical_zero(zero, lineage)))?;

        tracing::debug!(handle = %zero, %lineage, "zero handle bound");
        Ok(())
    }

    /// Bind `handle` to `owner` and issue the grants the binding implies.
    fn bind(&self, owner: &Identity, handle: CiphertextHandle) -> Result<PolicyBinding> {
        let lineage = self.store.next_binding_id()?;
        let binding = AccessControl::bind(handle, *owner, lineage);
        for grant in AccessControl::grants(&binding, &self.config.registry_id) {
            self.service.apply(&grant)?;
        }
        Ok(binding)
    }

    fn store_registration(
        &self,
        caller: &Identity,
        display_name: &str,
        handle: CiphertextHandle,
    ) -> Result<()> {
        let binding = self.bind(caller, handle)?;
        let changeset = Changeset::new()
            .put_record(*caller, Record::registered(display_name, handle))
            .put_binding(binding)
            .emit(RegistryEvent::Registered {
                identity: *caller,
                display_name: display_name.to_string(),
                handle,
            });
        self.commit(changeset)?;

        tracing::debug!(identity = %caller, %handle, "identity registered");
        Ok(())
    }

    fn disclose_current(&self, owner: &Identity, record: &Record) -> Result<()> {
        let handle = record.attribute_handle;
        let binding = self.store.get_binding(&handle)?.ok_or_else(|| {
            StoreError::InvalidData(format!("record of {} points at unbound handle {}", owner, handle))
        })?;

        match AccessControl::disclose(&binding) {
            Disclosure::AlreadyPublic => {
                tracing::debug!(identity = %owner, %handle, "handle already public");
                Ok(())
            }
            Disclosure::Changed(binding) => {
                self.service.make_public(&handle)?;
                let changeset = Changeset::new()
                    .put_binding(binding)
                    .emit(RegistryEvent::Disclosed {
                        identity: *owner,
                        handle,
                    });
                self.commit(changeset)?;

                tracing::debug!(identity = %owner, %handle, "handle disclosed");
                Ok(())
            }
        }
    }

    fn commit(&self, changeset: Changeset) -> Result<()> {
        // Held across commit and send so subscribers see sequence order.
        let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        for record in self.store.commit(changeset)? {
            // Having no live subscribers is not an error.
            let _ = self.events.send(record);
        }
        Ok(())
    }
}
