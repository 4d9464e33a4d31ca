//! Delegated decryption message types.

use serde::{Deserialize, Serialize};

use shroud_perms::SealedValue;

use crate::credential::DelegationCredential;
use crate::error::{GatewayError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Message size limits.
pub mod limits {
    /// Default max handles in one decrypt request.
    pub const MAX_HANDLES_PER_REQUEST: usize = 16;
    /// Max encoded message size.
    pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;
}

/// Gateway protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayMessage {
    /// Ask for the values named by a credential.
    DecryptRequest {
        /// Correlates the response.
        request_id: u64,
        /// Protocol version for compatibility checking.
        protocol_version: u8,
        /// The signed request.
        credential: DelegationCredential,
    },

    /// Values sealed to the credential's session key.
    DecryptResponse {
        request_id: u64,
        values: Vec<SealedValue>,
    },

    /// The request was rejected.
    Error {
        request_id: u64,
        /// Error code for programmatic handling.
        code: GatewayErrorCode,
        /// Human-readable description.
        message: String,
    },
}

impl GatewayMessage {
    /// The request this message belongs to.
    pub fn request_id(&self) -> u64 {
        match self {
            GatewayMessage::DecryptRequest { request_id, .. }
            | GatewayMessage::DecryptResponse { request_id, .. }
            | GatewayMessage::Error { request_id, .. } => *request_id,
        }
    }

    /// An error reply for `request_id`.
    pub fn error(request_id: u64, error: &GatewayError) -> Self {
        GatewayMessage::Error {
            request_id,
            code: error.code(),
            message: error.to_string(),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes, rejecting oversized input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > limits::MAX_MESSAGE_BYTES {
            return Err(GatewayError::InvalidRequest(format!(
                "message of {} bytes exceeds {}",
                bytes.len(),
                limits::MAX_MESSAGE_BYTES
            )));
        }
        ciborium::from_reader(bytes).map_err(|e| GatewayError::SerializationError(e.to_string()))
    }
}

/// Error codes for the gateway protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum GatewayErrorCode {
    /// Unknown/unspecified error.
    Unknown = 0,
    /// Malformed request or limits exceeded.
    InvalidRequest = 1,
    /// Credential is for another registry.
    WrongRegistry = 2,
    /// Signature does not verify.
    InvalidSignature = 3,
    /// Outside the validity window.
    Expired = 4,
    /// Subject lacks a capability.
    Unauthorized = 5,
    /// Internal error on the gateway.
    Internal = 6,
}
