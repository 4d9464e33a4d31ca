//! Encrypted value envelope.
//!
//! The reference collaborator keeps every attribute value, and every
//! externally submitted ciphertext, as an [`EncryptedPayload`] under its
//! service key.

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{PermsError, Result};

/// Format identifier for encrypted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// An encrypted payload envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt plaintext with the given key.
    pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Encrypt an attribute value (little-endian u64).
    pub fn encrypt_value(value: u64, key: &EncryptionKey) -> Result<Self> {
        Self::encrypt(&value.to_le_bytes(), key)
    }

    /// Decrypt with the given key.
    pub fn decrypt(&self, key: &EncryptionKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    /// Decrypt an attribute value.
    pub fn decrypt_value(&self, key: &EncryptionKey) -> Result<u64> {
        decode_value(&self.decrypt(key)?)
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

/// Decode an attribute value from its little-endian plaintext.
pub(crate) fn decode_value(plaintext: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = plaintext.try_into().map_err(|_| {
        PermsError::DecryptionError(format!(
            "invalid value length: expected 8, got {}",
            plaintext.len()
        ))
    })?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_roundtrip() {
        let key = EncryptionKey::generate();
        let envelope = EncryptedPayload::encrypt_value(30, &key).unwrap();
        assert_eq!(envelope.decrypt_value(&key).unwrap(), 30);
    }

    #[test]
    fn test_same_value_encrypts_differently() {
        let key = EncryptionKey::generate();
        let a = EncryptedPayload::encrypt_value(7, &key).unwrap();
        let b = EncryptedPayload::encrypt_value(7, &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_envelope_survives_cbor() {
        let key = EncryptionKey::generate();
        let envelope = EncryptedPayload::encrypt_value(255, &key).unwrap();
        let recovered = EncryptedPayload::from_bytes(&envelope.to_bytes()).unwrap();
        assert_eq!(recovered.decrypt_value(&key).unwrap(), 255);
    }

    #[test]
    fn test_wrong_length_plaintext_rejected() {
        let key = EncryptionKey::generate();
        let envelope = EncryptedPayload::encrypt(b"abc", &key).unwrap();
        assert!(matches!(
            envelope.decrypt_value(&key),
            Err(PermsError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            EncryptedPayload::from_bytes(&[0xff, 0x00]),
            Err(PermsError::SerializationError(_))
        ));
    }
}
