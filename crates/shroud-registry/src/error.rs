//! Error types for the registry.

use shroud_core::{Identity, ValidationError};
use shroud_perms::PermsError;
use shroud_store::StoreError;
use thiserror::Error;

/// Errors that can occur during registry operations.
///
/// Every error aborts the whole operation. The first four variants are
/// caller errors and are deterministic for the same state and input.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed input: empty name, empty proof, value out of domain.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// The caller or target has no record.
    #[error("not registered: {0}")]
    NotRegistered(Identity),

    /// The caller does not hold the administrator role.
    #[error("not authorized: {caller} may not {operation}")]
    NotAuthorized {
        caller: Identity,
        operation: &'static str,
    },

    /// The encryption service rejected an external ciphertext or its proof.
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The encryption service failed.
    #[error("collaborator error: {0}")]
    Collaborator(PermsError),
}

impl From<PermsError> for RegistryError {
    fn from(err: PermsError) -> Self {
        match err {
            PermsError::InvalidCiphertext(reason) => RegistryError::InvalidCiphertext(reason),
            other => RegistryError::Collaborator(other),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perms_errors_split() {
        let err: RegistryError = PermsError::InvalidCiphertext("bad proof".into()).into();
        assert!(matches!(err, RegistryError::InvalidCiphertext(ref r) if r == "bad proof"));

        let err: RegistryError = PermsError::Poisoned("state".into()).into();
        assert!(matches!(err, RegistryError::Collaborator(PermsError::Poisoned(_))));
    }
}
