//! Error types for the permissions module.

use thiserror::Error;

use shroud_core::CiphertextHandle;

/// Errors that can occur during policy and collaborator operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// An external ciphertext or its input proof was rejected.
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// The collaborator holds no ciphertext under this handle.
    #[error("unknown handle: {0}")]
    UnknownHandle(CiphertextHandle),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Collaborator state lock was poisoned.
    #[error("collaborator lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
