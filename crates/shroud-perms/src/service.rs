//! The ciphertext collaborator interface.
//!
//! The registry never sees plaintext attributes. It mints handles, issues
//! capability grants, and marks handles public through this trait; the
//! decryption gateway reads values back through it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use shroud_core::{CiphertextHandle, Identity, RegistryId};

use crate::access::Grant;
use crate::error::Result;

/// A ciphertext produced outside the registry, e.g. by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCiphertext(pub Vec<u8>);

impl ExternalCiphertext {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Proof that an external ciphertext was produced for a given importer and
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof(pub Vec<u8>);

impl InputProof {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The encryption collaborator.
///
/// Every method is synchronous and bounded. Implementations must be safe to
/// share across threads.
pub trait CiphertextService: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Minting
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt a plaintext value under a fresh handle.
    fn encrypt(&self, value: u64) -> Result<CiphertextHandle>;

    /// Import an external ciphertext under a fresh handle.
    ///
    /// Fails with `InvalidCiphertext` if the proof does not bind the
    /// ciphertext to `importer` and `registry`.
    fn import_external(
        &self,
        external: &ExternalCiphertext,
        proof: &InputProof,
        importer: &Identity,
        registry: &RegistryId,
    ) -> Result<CiphertextHandle>;

    // ─────────────────────────────────────────────────────────────────────────
    // Capabilities
    // ─────────────────────────────────────────────────────────────────────────

    /// Let `identity` decrypt `handle`.
    fn grant_capability(&self, handle: &CiphertextHandle, identity: &Identity) -> Result<()>;

    /// Let the registry itself operate on `handle`.
    fn grant_self_capability(&self, handle: &CiphertextHandle, registry: &RegistryId)
        -> Result<()>;

    /// Name the identity that exercises `registry`'s self-capability.
    fn set_registry_operator(&self, registry: &RegistryId, operator: &Identity) -> Result<()>;

    /// Let anyone decrypt `handle`. Irreversible.
    fn make_public(&self, handle: &CiphertextHandle) -> Result<()>;

    /// Whether `identity` may decrypt `handle`.
    fn is_allowed(&self, handle: &CiphertextHandle, identity: &Identity) -> Result<bool>;

    /// Whether `handle` is publicly decryptable.
    fn is_public(&self, handle: &CiphertextHandle) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Values
    // ─────────────────────────────────────────────────────────────────────────

    /// Decrypt a handle. Only the decryption gateway calls this, after its
    /// own authorization checks.
    fn decrypt(&self, handle: &CiphertextHandle) -> Result<u64>;

    /// The opaque 32-byte reference exposed on the read surface.
    fn to_opaque_reference(&self, handle: &CiphertextHandle) -> [u8; 32] {
        *handle.as_bytes()
    }

    /// The canonical handle for an encrypted zero.
    fn zero_value_handle(&self) -> CiphertextHandle {
        CiphertextHandle::ZERO
    }

    /// Issue one grant computed by the access control manager.
    fn apply(&self, grant: &Grant) -> Result<()> {
        match grant {
            Grant::Owner { handle, owner } => self.grant_capability(handle, owner),
            Grant::Registry { handle, registry } => self.grant_self_capability(handle, registry),
            Grant::Public { handle } => self.make_public(handle),
        }
    }
}

impl<C: CiphertextService + ?Sized> CiphertextService for Arc<C> {
    fn encrypt(&self, value: u64) -> Result<CiphertextHandle> {
        (**self).encrypt(value)
    }

    fn import_external(
        &self,
        external: &ExternalCiphertext,
        proof: &InputProof,
        importer: &Identity,
        registry: &RegistryId,
    ) -> Result<CiphertextHandle> {
        (**self).import_external(external, proof, importer, registry)
    }

    fn grant_capability(&self, handle: &CiphertextHandle, identity: &Identity) -> Result<()> {
        (**self).grant_capability(handle, identity)
    }

    fn grant_self_capability(
        &self,
        handle: &CiphertextHandle,
        registry: &RegistryId,
    ) -> Result<()> {
        (**self).grant_self_capability(handle, registry)
    }

    fn set_registry_operator(&self, registry: &RegistryId, operator: &Identity) -> Result<()> {
        (**self).set_registry_operator(registry, operator)
    }

    fn make_public(&self, handle: &CiphertextHandle) -> Result<()> {
        (**self).make_public(handle)
    }

    fn is_allowed(&self, handle: &CiphertextHandle, identity: &Identity) -> Result<bool> {
        (**self).is_allowed(handle, identity)
    }

    fn is_public(&self, handle: &CiphertextHandle) -> Result<bool> {
        (**self).is_public(handle)
    }

    fn decrypt(&self, handle: &CiphertextHandle) -> Result<u64> {
        (**self).decrypt(handle)
    }

    fn to_opaque_reference(&self, handle: &CiphertextHandle) -> [u8; 32] {
        (**self).to_opaque_reference(handle)
    }

    fn zero_value_handle(&self) -> CiphertextHandle {
        (**self).zero_value_handle()
    }
}
