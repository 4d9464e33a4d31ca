//! Error types for the delegated decryption protocol.

use thiserror::Error;

use crate::messages::GatewayErrorCode;

/// Errors that can occur while requesting or serving a decryption.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request is malformed or exceeds limits.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The credential names a different registry.
    #[error("wrong registry: {0}")]
    WrongRegistry(String),

    /// The credential signature does not verify against its subject.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The credential is outside its validity window.
    #[error("credential expired: {0}")]
    Expired(String),

    /// The subject may not decrypt one of the requested handles.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The gateway failed for a reason unrelated to the request.
    #[error("gateway error ({code:?}): {message}")]
    Remote {
        code: GatewayErrorCode,
        message: String,
    },

    /// The peer answered with something other than what was asked.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Timeout waiting for the gateway.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Message encoding error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Collaborator or sealing error.
    #[error("perms error: {0}")]
    Perms(#[from] shroud_perms::PermsError),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] shroud_core::CoreError),
}

impl GatewayError {
    /// The wire code reported for this error.
    pub fn code(&self) -> GatewayErrorCode {
        match self {
            GatewayError::InvalidRequest(_) | GatewayError::SerializationError(_) => {
                GatewayErrorCode::InvalidRequest
            }
            GatewayError::WrongRegistry(_) => GatewayErrorCode::WrongRegistry,
            GatewayError::InvalidSignature(_) => GatewayErrorCode::InvalidSignature,
            GatewayError::Expired(_) => GatewayErrorCode::Expired,
            GatewayError::Unauthorized(_) => GatewayErrorCode::Unauthorized,
            GatewayError::Remote { code, .. } => *code,
            _ => GatewayErrorCode::Internal,
        }
    }

    /// Rebuild a typed error from a wire error.
    pub fn from_remote(code: GatewayErrorCode, message: String) -> Self {
        match code {
            GatewayErrorCode::InvalidRequest => GatewayError::InvalidRequest(message),
            GatewayErrorCode::WrongRegistry => GatewayError::WrongRegistry(message),
            GatewayErrorCode::InvalidSignature => GatewayError::InvalidSignature(message),
            GatewayErrorCode::Expired => GatewayError::Expired(message),
            GatewayErrorCode::Unauthorized => GatewayError::Unauthorized(message),
            GatewayErrorCode::Unknown | GatewayErrorCode::Internal => {
                GatewayError::Remote { code, message }
            }
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
