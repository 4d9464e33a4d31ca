//! Input validation for registry operations.
//!
//! These checks run before any state is touched, so a failure never leaves
//! a partial effect behind.

use crate::crypto::Identity;
use crate::error::ValidationError;

/// Validate a display name: non-empty after trimming, at most `max_len` bytes.
pub fn validate_display_name(name: &str, max_len: usize) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > max_len {
        return Err(ValidationError::NameTooLong {
            len: name.len(),
            max: max_len,
        });
    }
    Ok(())
}

/// Validate an externally produced ciphertext and its input proof.
///
/// Only emptiness is checked here. Whether the proof actually binds the
/// ciphertext is the encryption service's call.
pub fn validate_proof(external_ciphertext: &[u8], proof: &[u8]) -> Result<(), ValidationError> {
    if external_ciphertext.is_empty() {
        return Err(ValidationError::EmptyCiphertext);
    }
    if proof.is_empty() {
        return Err(ValidationError::EmptyProof);
    }
    Ok(())
}

/// Validate that a plaintext value is within the attribute domain `0..=max`.
pub fn validate_plain_value(value: u64, max: u64) -> Result<(), ValidationError> {
    if value > max {
        return Err(ValidationError::ValueOutOfDomain { value, max });
    }
    Ok(())
}

/// Validate that an identity is not the null identity.
pub fn validate_identity(identity: &Identity) -> Result<(), ValidationError> {
    if identity.is_zero() {
        return Err(ValidationError::NullIdentity);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_name_rules() {
        assert_eq!(validate_display_name("", 64), Err(ValidationError::EmptyName));
        assert_eq!(validate_display_name("   ", 64), Err(ValidationError::EmptyName));
        assert!(validate_display_name("alice", 64).is_ok());
        assert_eq!(
            validate_display_name("abcdef", 5),
            Err(ValidationError::NameTooLong { len: 6, max: 5 })
        );
    }

    #[test]
    fn test_proof_rules() {
        assert_eq!(validate_proof(b"ct", b""), Err(ValidationError::EmptyProof));
        assert_eq!(validate_proof(b"", b"p"), Err(ValidationError::EmptyCiphertext));
        assert!(validate_proof(b"ct", b"p").is_ok());
    }

    #[test]
    fn test_null_identity_rejected() {
        assert_eq!(
            validate_identity(&Identity::ZERO),
            Err(ValidationError::NullIdentity)
        );
        assert!(validate_identity(&Identity::from_bytes([1; 32])).is_ok());
    }

    proptest! {
        #[test]
        fn test_plain_value_domain(value in any::<u64>()) {
            let result = validate_plain_value(value, 255);
            prop_assert_eq!(result.is_ok(), value <= 255);
        }
    }
}
