//! Records and registry events.
//!
//! A record pairs a plaintext display name with the handle of an encrypted
//! attribute. Records are never physically removed; clearing one resets it
//! to the canonical empty record.

use serde::{Deserialize, Serialize};

use crate::crypto::Identity;
use crate::types::{BindingId, CiphertextHandle};

/// The per-identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Whether the identity is currently registered.
    pub present: bool,

    /// Plaintext display name. Empty when not present.
    pub display_name: String,

    /// Handle of the encrypted attribute. The zero handle when not present.
    pub attribute_handle: CiphertextHandle,
}

impl Record {
    /// The canonical empty record, returned for identities that were never
    /// registered or have been cleared.
    pub fn absent() -> Self {
        Self {
            present: false,
            display_name: String::new(),
            attribute_handle: CiphertextHandle::ZERO,
        }
    }

    /// A registered record.
    pub fn registered(display_name: impl Into<String>, attribute_handle: CiphertextHandle) -> Self {
        Self {
            present: true,
            display_name: display_name.into(),
            attribute_handle,
        }
    }

    /// Replace the display name, keeping the handle.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Replace the attribute handle, keeping the name.
    pub fn with_handle(mut self, attribute_handle: CiphertextHandle) -> Self {
        self.attribute_handle = attribute_handle;
        self
    }

}

impl Default for Record {
    fn default() -> Self {
        Self::absent()
    }
}

/// An entry in the registry's append-only event log.
///
/// Observers follow `Registered` events to learn the current handle to
/// target for decryption without re-querying the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A record was created, re-registered, or given a new attribute handle.
    Registered {
        identity: Identity,
        display_name: String,
        handle: CiphertextHandle,
    },

    /// A record's display name changed. The handle is untouched.
    DisplayNameUpdated {
        identity: Identity,
        display_name: String,
    },

    /// A handle was made publicly decryptable.
    Disclosed {
        identity: Identity,
        handle: CiphertextHandle,
    },

    /// A record was cleared by the administrator.
    ///
    /// `lineage` is the bind event that pointed the record at the canonical
    /// zero handle.
    Cleared { identity: Identity, lineage: BindingId },

    /// The administrator role moved to another identity.
    AdministratorTransferred { previous: Identity, current: Identity },
}

impl RegistryEvent {
    /// The identity whose record this event concerns, if any.
    pub fn subject(&self) -> Option<&Identity> {
        match self {
            RegistryEvent::Registered { identity, .. }
            | RegistryEvent::DisplayNameUpdated { identity, .. }
            | RegistryEvent::Disclosed { identity, .. }
            | RegistryEvent::Cleared { identity, .. } => Some(identity),
            RegistryEvent::AdministratorTransferred { .. } => None,
        }
    }

    /// Short name used for storage and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::Registered { .. } => "registered",
            RegistryEvent::DisplayNameUpdated { .. } => "display_name_updated",
            RegistryEvent::Disclosed { .. } => "disclosed",
            RegistryEvent::Cleared { .. } => "cleared",
            RegistryEvent::AdministratorTransferred { .. } => "administrator_transferred",
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ciborium::de::Error<std::io::Error>> {
        ciborium::from_reader(bytes)
    }
}

/// A committed event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1.
    pub seq: u64,

    /// The event.
    pub event: RegistryEvent,
}
