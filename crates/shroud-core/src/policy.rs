//! Decryption policy data.
//!
//! Policies attach to handles, not identities. A replaced handle gets a
//! fresh binding; it never inherits the policy of the handle it replaced.
//! The transition logic lives in `shroud-perms`; this module only defines
//! the persisted shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Identity;
use crate::types::{BindingId, CiphertextHandle};

/// Who may obtain a decrypted view of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccessPolicy {
    /// Only the owning identity.
    OwnerOnly = 0,

    /// The owning identity and the registry (and so its administrator).
    OwnerAndRegistry = 1,

    /// Anyone.
    Public = 2,
}

impl AccessPolicy {
    /// Convert to the storage discriminant.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a storage discriminant.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AccessPolicy::OwnerOnly),
            1 => Some(AccessPolicy::OwnerAndRegistry),
            2 => Some(AccessPolicy::Public),
            _ => None,
        }
    }

    /// Whether anyone may decrypt.
    pub fn is_public(self) -> bool {
        matches!(self, AccessPolicy::Public)
    }
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessPolicy::OwnerOnly => "owner-only",
            AccessPolicy::OwnerAndRegistry => "owner+registry",
            AccessPolicy::Public => "public",
        };
        f.write_str(s)
    }
}

/// The persisted association of a handle with its owner and policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBinding {
    /// The bound handle.
    pub handle: CiphertextHandle,

    /// The identity whose record the handle was bound for.
    pub owner: Identity,

    /// Current policy.
    pub policy: AccessPolicy,

    /// The bind event that created this binding.
    pub lineage: BindingId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_discriminant_roundtrip() {
        for policy in [
            AccessPolicy::OwnerOnly,
            AccessPolicy::OwnerAndRegistry,
            AccessPolicy::Public,
        ] {
            assert_eq!(AccessPolicy::from_u8(policy.to_u8()), Some(policy));
        }
        assert_eq!(AccessPolicy::from_u8(9), None);
    }

    #[test]
    fn test_only_public_is_public() {
        assert!(AccessPolicy::Public.is_public());
        assert!(!AccessPolicy::OwnerAndRegistry.is_public());
        assert!(!AccessPolicy::OwnerOnly.is_public());
    }
}
