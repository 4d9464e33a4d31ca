//! Error types for Shroud Core.

use thiserror::Error;

/// Core errors from cryptographic and encoding operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Input validation errors.
///
/// Every variant is a caller error: resubmitting with corrected input
/// succeeds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("display name must not be empty")]
    EmptyName,

    #[error("display name is {len} bytes, maximum is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("input proof must not be empty")]
    EmptyProof,

    #[error("external ciphertext must not be empty")]
    EmptyCiphertext,

    #[error("value {value} is outside the attribute domain 0..={max}")]
    ValueOutOfDomain { value: u64, max: u64 },

    #[error("identity must not be the null identity")]
    NullIdentity,
}
