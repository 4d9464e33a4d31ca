//! Strong type definitions for Shroud.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Identity;

/// A 32-byte opaque reference to a ciphertext held by the encryption service.
///
/// The registry never inspects these bytes. Two handles are equal iff they
/// name the same ciphertext.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CiphertextHandle(pub [u8; 32]);

impl CiphertextHandle {
    /// The canonical zero handle.
    ///
    /// Every encryption service maps this handle to an encryption of zero.
    /// Absent and cleared records carry it.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a handle from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the canonical zero handle.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl AsRef<[u8]> for CiphertextHandle {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for CiphertextHandle {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for CiphertextHandle {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// A 32-byte registry identifier.
///
/// Derived from Blake3(deployer || name). Bound into delegation payloads and
/// input proofs so that neither can be replayed against another registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryId(pub [u8; 32]);

impl RegistryId {
    /// Derive a registry ID from the deploying identity and a registry name.
    pub fn derive(deployer: &Identity, name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"shroud-registry-v0:");
        hasher.update(deployer.as_bytes());
        hasher.update(b":");
        hasher.update(name.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The zero registry ID (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistryId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Identifier of a single bind event.
///
/// Allocated monotonically by the store. Gaps are allowed (an operation may
/// allocate an ID and then fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingId(pub u64);

impl BindingId {
    /// Get the raw value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bind#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_handle_hex_roundtrip() {
        let handle = CiphertextHandle::from_bytes([0x42; 32]);
        let recovered = CiphertextHandle::from_hex(&handle.to_hex()).unwrap();
        assert_eq!(handle, recovered);
    }

    #[test]
    fn test_handle_debug_is_truncated() {
        let handle = CiphertextHandle::from_bytes([0xab; 32]);
        assert_eq!(format!("{:?}", handle), "Handle(abababababababab)");
    }

    #[test]
    fn test_zero_handle() {
        assert!(CiphertextHandle::ZERO.is_zero());
        assert!(!CiphertextHandle::from_bytes([1; 32]).is_zero());
    }

    #[test]
    fn test_registry_id_derivation() {
        let deployer = Keypair::from_seed(&[7; 32]).identity();
        let a = RegistryId::derive(&deployer, "players");
        let b = RegistryId::derive(&deployer, "players");
        let c = RegistryId::derive(&deployer, "guilds");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
