//! Reference collaborator.
//!
//! [`LocalCiphertextService`] keeps values as ChaCha20-Poly1305 envelopes
//! under a service key, tracks a capability list per handle, and accepts
//! external ciphertexts only with a MAC-bound input proof. It performs no
//! homomorphic computation.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::RngCore;

use shroud_core::{CiphertextHandle, Identity, RegistryId};

use crate::crypto::EncryptionKey;
use crate::envelope::EncryptedPayload;
use crate::error::{PermsError, Result};
use crate::service::{CiphertextService, ExternalCiphertext, InputProof};

const SERVICE_KEY_CONTEXT: &str = "shroud-local-v0-service-key";
const HANDLE_SALT_CONTEXT: &str = "shroud-local-v0-handle-salt";
const HANDLE_CONTEXT: &str = "shroud-local-v0-handle";
const PROOF_KEY_PURPOSE: &str = "shroud-local-v0-input-proof";
const PROOF_DOMAIN: &[u8] = b"shroud-input-proof-v0:";

/// Who holds a capability on a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Grantee {
    Identity(Identity),
    Registry(RegistryId),
}

#[derive(Default)]
struct LocalState {
    values: HashMap<CiphertextHandle, EncryptedPayload>,
    grants: HashMap<CiphertextHandle, HashSet<Grantee>>,
    public: HashSet<CiphertextHandle>,
    operators: HashMap<RegistryId, Identity>,
    minted: u64,
}

/// In-process collaborator for tests and single-node deployments.
///
/// The zero handle always decrypts to 0 and is readable by anyone.
pub struct LocalCiphertextService {
    key: EncryptionKey,
    proof_key: [u8; 32],
    handle_salt: [u8; 32],
    state: RwLock<LocalState>,
}

impl LocalCiphertextService {
    /// A service with a random key.
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// A service whose keys and handle sequence derive from `seed`.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let key = EncryptionKey::from_bytes(blake3::derive_key(SERVICE_KEY_CONTEXT, &seed));
        let proof_key = key.derive_subkey(PROOF_KEY_PURPOSE);
        Self {
            key,
            proof_key,
            handle_salt: blake3::derive_key(HANDLE_SALT_CONTEXT, &seed),
            state: RwLock::new(LocalState::default()),
        }
    }

    /// Produce an external ciphertext and proof, as a client would before
    /// calling `register_with_ciphertext` or `update_attribute`.
    pub fn encrypt_input(
        &self,
        value: u64,
        importer: &Identity,
        registry: &RegistryId,
    ) -> Result<(ExternalCiphertext, InputProof)> {
        let ciphertext = EncryptedPayload::encrypt_value(value, &self.key)?.to_bytes();
        let proof = self.input_mac(&ciphertext, importer, registry);
        Ok((
            ExternalCiphertext(ciphertext),
            InputProof(proof.as_bytes().to_vec()),
        ))
    }

    /// Number of handles minted so far.
    pub fn minted(&self) -> Result<u64> {
        Ok(self.read()?.minted)
    }

    fn input_mac(&self, ciphertext: &[u8], importer: &Identity, registry: &RegistryId) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(PROOF_DOMAIN);
        hasher.update(registry.as_bytes());
        hasher.update(importer.as_bytes());
        hasher.update(ciphertext);
        hasher.finalize()
    }

    fn mint(&self, payload: EncryptedPayload) -> Result<CiphertextHandle> {
        let mut state = self.write()?;
        state.minted += 1;

        let mut hasher = blake3::Hasher::new_derive_key(HANDLE_CONTEXT);
        hasher.update(&self.handle_salt);
        hasher.update(&state.minted.to_le_bytes());
        let handle = CiphertextHandle::from_bytes(*hasher.finalize().as_bytes());

        state.values.insert(handle, payload);
        tracing::debug!(%handle, "minted ciphertext handle");
        Ok(handle)
    }

    fn ensure_known(state: &LocalState, handle: &CiphertextHandle) -> Result<()> {
        if handle.is_zero() || state.values.contains_key(handle) {
            Ok(())
        } else {
            Err(PermsError::UnknownHandle(*handle))
        }
    }

    fn grant(&self, handle: &CiphertextHandle, grantee: Grantee) -> Result<()> {
        let mut state = self.write()?;
        Self::ensure_known(&state, handle)?;
        state.grants.entry(*handle).or_default().insert(grantee);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LocalState>> {
        self.state
            .read()
            .map_err(|e| PermsError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LocalState>> {
        self.state
            .write()
            .map_err(|e| PermsError::Poisoned(e.to_string()))
    }
}

impl Default for LocalCiphertextService {
    fn default() -> Self {
        Self::new()
    }
}

impl CiphertextService for LocalCiphertextService {
    fn encrypt(&self, value: u64) -> Result<CiphertextHandle> {
        let payload = EncryptedPayload::encrypt_value(value, &self.key)?;
        self.mint(payload)
    }

    fn import_external(
        &self,
        external: &ExternalCiphertext,
        proof: &InputProof,
        importer: &Identity,
        registry: &RegistryId,
    ) -> Result<CiphertextHandle> {
        let claimed: [u8; 32] = proof
            .as_bytes()
            .try_into()
            .map_err(|_| PermsError::InvalidCiphertext("malformed input proof".into()))?;

        // blake3::Hash compares in constant time.
        let expected = self.input_mac(external.as_bytes(), importer, registry);
        if expected != blake3::Hash::from(claimed) {
            return Err(PermsError::InvalidCiphertext(
                "input proof does not match ciphertext, importer, and registry".into(),
            ));
        }

        let payload = EncryptedPayload::from_bytes(external.as_bytes())
            .map_err(|e| PermsError::InvalidCiphertext(e.to_string()))?;
        payload
            .decrypt_value(&self.key)
            .map_err(|e| PermsError::InvalidCiphertext(e.to_string()))?;

        self.mint(payload)
    }

    fn grant_capability(&self, handle: &CiphertextHandle, identity: &Identity) -> Result<()> {
        self.grant(handle, Grantee::Identity(*identity))
    }

    fn grant_self_capability(
        &self,
        handle: &CiphertextHandle,
        registry: &RegistryId,
    ) -> Result<()> {
        self.grant(handle, Grantee::Registry(*registry))
    }

    fn set_registry_operator(&self, registry: &RegistryId, operator: &Identity) -> Result<()> {
        self.write()?.operators.insert(*registry, *operator);
        Ok(())
    }

    fn make_public(&self, handle: &CiphertextHandle) -> Result<()> {
        let mut state = self.write()?;
        Self::ensure_known(&state, handle)?;
        if state.public.insert(*handle) {
            tracing::debug!(%handle, "handle made public");
        }
        Ok(())
    }

    fn is_allowed(&self, handle: &CiphertextHandle, identity: &Identity) -> Result<bool> {
        if handle.is_zero() {
            return Ok(true);
        }

        let state = self.read()?;
        if state.public.contains(handle) {
            return Ok(true);
        }

        let Some(grantees) = state.grants.get(handle) else {
            return Ok(false);
        };

        Ok(grantees.iter().any(|grantee| match grantee {
            Grantee::Identity(holder) => holder == identity,
            Grantee::Registry(registry) => state.operators.get(registry) == Some(identity),
        }))
    }

    fn is_public(&self, handle: &CiphertextHandle) -> Result<bool> {
        Ok(handle.is_zero() || self.read()?.public.contains(handle))
    }

    fn decrypt(&self, handle: &CiphertextHandle) -> Result<u64> {
        if handle.is_zero() {
            return Ok(0);
        }
        let state = self.read()?;
        let payload = state
            .values
            .get(handle)
            .ok_or(PermsError::UnknownHandle(*handle))?;
        payload.decrypt_value(&self.key)
    }
}
