//! The collaborator-side decryption endpoint.
//!
//! The gateway re-validates every request on its own: it trusts nothing the
//! holder claims beyond what the signature covers, and asks the collaborator
//! directly whether the subject holds a capability on each handle.

use std::time::Duration;

use shroud_core::RegistryId;
use shroud_perms::{CiphertextService, SealedValue};

use crate::credential::{DelegationCredential, MAX_VALIDITY_SECS};
use crate::error::{GatewayError, Result};
use crate::messages::{limits, GatewayMessage, PROTOCOL_VERSION};

/// Configuration for the decryption protocol.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a client waits for a response.
    pub request_timeout: Duration,
    /// Maximum handles in one credential.
    pub max_handles_per_request: usize,
    /// Longest validity window accepted.
    pub max_validity_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_handles_per_request: limits::MAX_HANDLES_PER_REQUEST,
            max_validity_secs: MAX_VALIDITY_SECS,
        }
    }
}

/// Serves decryption requests for one registry.
pub struct Gateway<C: CiphertextService> {
    service: C,
    registry_id: RegistryId,
    config: GatewayConfig,
}

impl<C: CiphertextService> Gateway<C> {
    /// Create a gateway for `registry_id`.
    pub fn new(service: C, registry_id: RegistryId, config: GatewayConfig) -> Self {
        Self {
            service,
            registry_id,
            config,
        }
    }

    /// The registry this gateway serves.
    pub fn registry_id(&self) -> &RegistryId {
        &self.registry_id
    }

    /// Validate a credential and seal every requested value.
    ///
    /// Checks run in a fixed order: registry, limits, signature, window,
    /// then per-handle capability. Any failure rejects the whole request.
    pub fn decrypt(&self, credential: &DelegationCredential, now: u64) -> Result<Vec<SealedValue>> {
        let payload = &credential.payload;

        if payload.registry_id != self.registry_id {
            return Err(GatewayError::WrongRegistry(format!(
                "credential is for {}, this gateway serves {}",
                payload.registry_id, self.registry_id
            )));
        }

        payload.check_limits(
            self.config.max_handles_per_request,
            self.config.max_validity_secs,
        )?;

        credential.verify()?;

        if !payload.is_valid_at(now) {
            return Err(GatewayError::Expired(format!(
                "now={} outside [{}, {})",
                now,
                payload.valid_from,
                payload.valid_until()
            )));
        }

        let handles = payload.handle_set();
        for handle in &handles {
            if !self.service.is_allowed(handle, &credential.subject)? {
                return Err(GatewayError::Unauthorized(format!(
                    "{} may not decrypt {}",
                    credential.subject, handle
                )));
            }
        }

        handles
            .into_iter()
            .map(|handle| -> Result<SealedValue> {
                let value = self.service.decrypt(&handle)?;
                Ok(SealedValue::seal(handle, value, &payload.ephemeral_public)?)
            })
            .collect()
    }

    /// Answer one protocol message.
    pub fn handle(&self, message: GatewayMessage, now: u64) -> GatewayMessage {
        let (request_id, protocol_version, credential) = match message {
            GatewayMessage::DecryptRequest {
                request_id,
                protocol_version,
                credential,
            } => (request_id, protocol_version, credential),
            other => {
                let err = GatewayError::InvalidRequest("expected DecryptRequest".into());
                return GatewayMessage::error(other.request_id(), &err);
            }
        };

        if protocol_version != PROTOCOL_VERSION {
            let err = GatewayError::InvalidRequest(format!(
                "protocol version {} not supported",
                protocol_version
            ));
            return GatewayMessage::error(request_id, &err);
        }

        match self.decrypt(&credential, now) {
            Ok(values) => {
                tracing::debug!(
                    request_id,
                    subject = %credential.subject,
                    count = values.len(),
                    "decryption request served"
                );
                GatewayMessage::DecryptResponse { request_id, values }
            }
            Err(err) => {
                tracing::warn!(
                    request_id,
                    subject = %credential.subject,
                    error = %err,
                    "decryption request rejected"
                );
                GatewayMessage::error(request_id, &err)
            }
        }
    }

    /// Answer one encoded message.
    pub fn handle_bytes(&self, bytes: &[u8], now: u64) -> Vec<u8> {
        let reply = match GatewayMessage::from_bytes(bytes) {
            Ok(message) => self.handle(message, now),
            Err(err) => {
                tracing::warn!(error = %err, "undecodable gateway message");
                GatewayMessage::error(0, &err)
            }
        };
        reply.to_bytes()
    }
}
