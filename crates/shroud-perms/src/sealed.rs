//! Values sealed to a decryption session's key.
//!
//! The collaborator never returns a plaintext in the clear. Each value is
//! encrypted to the holder's session key with X25519 from a fresh sender key,
//! and the derived key is bound to the handle the value belongs to.

use serde::{Deserialize, Serialize};

use shroud_core::CiphertextHandle;

use crate::crypto::{EncryptionNonce, EphemeralKeyPair, X25519PublicKey, X25519StaticSecret};
use crate::envelope::decode_value;
use crate::error::{PermsError, Result};

/// One attribute value, readable only by the holder of the session secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    /// The handle this value was decrypted from.
    pub handle: CiphertextHandle,

    /// Sender's one-shot X25519 public key.
    pub sender_public: X25519PublicKey,

    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,

    /// The sealed little-endian value, with tag.
    pub ciphertext: Vec<u8>,
}

impl SealedValue {
    /// Seal a value for the holder of `recipient_public`.
    pub fn seal(
        handle: CiphertextHandle,
        value: u64,
        recipient_public: &X25519PublicKey,
    ) -> Result<Self> {
        let sender = EphemeralKeyPair::generate();
        let sender_public = sender.public_key();

        let key = sender
            .diffie_hellman(recipient_public)
            .derive_encryption_key(handle.as_bytes());

        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(&value.to_le_bytes(), &nonce)?;

        Ok(Self {
            handle,
            sender_public,
            nonce,
            ciphertext,
        })
    }

    /// Open the value with the session secret.
    ///
    /// Fails if the secret is wrong or if the value was re-labelled with a
    /// different handle.
    pub fn open(&self, recipient_secret: &X25519StaticSecret) -> Result<u64> {
        let key = recipient_secret
            .diffie_hellman(&self.sender_public)
            .derive_encryption_key(self.handle.as_bytes());

        let plaintext = key.decrypt(&self.ciphertext, &self.nonce)?;
        decode_value(&plaintext)
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PermsError::SerializationError(e.to_string()))
    }
}
