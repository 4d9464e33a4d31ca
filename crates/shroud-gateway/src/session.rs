//! Holder-side decryption session.
//!
//! Drives the protocol for one identity: generate a session key, sign a
//! credential for the requested handles, submit it, and open the sealed
//! values locally. Plaintexts stay on the holder's side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use shroud_core::{CiphertextHandle, Keypair, RegistryId};
use shroud_perms::X25519StaticSecret;

use crate::credential::{unix_now, DelegationCredential, DelegationPayload};
use crate::error::{GatewayError, Result};
use crate::gateway::GatewayConfig;
use crate::messages::{GatewayMessage, PROTOCOL_VERSION};
use crate::transport::Transport;

/// Validity window requested by [`DecryptionSession::decrypt_now`].
pub const DEFAULT_VALIDITY_SECS: u64 = 10 * 60;

/// A client of one gateway.
pub struct DecryptionSession<T: Transport> {
    transport: T,
    config: GatewayConfig,
    registry_id: RegistryId,
    next_request_id: AtomicU64,
}

impl<T: Transport> DecryptionSession<T> {
    /// Create a session against the gateway of `registry_id`.
    pub fn new(transport: T, registry_id: RegistryId, config: GatewayConfig) -> Self {
        Self {
            transport,
            config,
            registry_id,
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Decrypt `handles` with a credential valid from now for
    /// [`DEFAULT_VALIDITY_SECS`].
    pub async fn decrypt_now(
        &self,
        keypair: &Keypair,
        handles: &[CiphertextHandle],
    ) -> Result<Vec<(CiphertextHandle, u64)>> {
        self.decrypt(keypair, handles, unix_now(), DEFAULT_VALIDITY_SECS)
            .await
    }

    /// Decrypt `handles` with a credential for the given window.
    ///
    /// Results come back in the order of `handles`.
    pub async fn decrypt(
        &self,
        keypair: &Keypair,
        handles: &[CiphertextHandle],
        valid_from: u64,
        valid_duration: u64,
    ) -> Result<Vec<(CiphertextHandle, u64)>> {
        let session_secret = X25519StaticSecret::generate();
        let payload = DelegationPayload::new(
            self.registry_id,
            session_secret.public_key(),
            handles.iter().copied(),
            valid_from,
            valid_duration,
        );
        let credential = DelegationCredential::sign(keypair, payload)?;

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = GatewayMessage::DecryptRequest {
            request_id,
            protocol_version: PROTOCOL_VERSION,
            credential,
        };

        let response = tokio::time::timeout(self.config.request_timeout, self.transport.request(request))
            .await
            .map_err(|_| GatewayError::Timeout(format!("waiting for response {}", request_id)))??;

        match response {
            GatewayMessage::DecryptResponse {
                request_id: got,
                values,
            } if got == request_id => {
                let mut opened = HashMap::with_capacity(values.len());
                for sealed in &values {
                    opened.insert(sealed.handle, sealed.open(&session_secret)?);
                }

                handles
                    .iter()
                    .map(|handle| {
                        opened.get(handle).map(|value| (*handle, *value)).ok_or_else(|| {
                            GatewayError::UnexpectedResponse(format!("no value for {}", handle))
                        })
                    })
                    .collect()
            }
            GatewayMessage::Error {
                request_id: got,
                code,
                message,
            } if got == request_id => Err(GatewayError::from_remote(code, message)),
            other => Err(GatewayError::UnexpectedResponse(format!(
                "expected reply to {}, got reply to {}",
                request_id,
                other.request_id()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use shroud_core::Identity;
    use shroud_perms::{CiphertextService, LocalCiphertextService};

    use crate::gateway::Gateway;
    use crate::transport::memory::MemoryTransport;

    /// Answers every request with a reply to a different request.
    struct Confused;

    #[async_trait]
    impl Transport for Confused {
        async fn request(&self, message: GatewayMessage) -> Result<GatewayMessage> {
            Ok(GatewayMessage::DecryptResponse {
                request_id: message.request_id() + 100,
                values: vec![],
            })
        }
    }

    /// Never answers.
    struct Silent;

    #[async_trait]
    impl Transport for Silent {
        async fn request(&self, _message: GatewayMessage) -> Result<GatewayMessage> {
            std::future::pending().await
        }
    }

    fn registry() -> RegistryId {
        RegistryId::derive(&Identity::from_bytes([1; 32]), "session-test")
    }

    #[tokio::test]
    async fn test_decrypt_in_request_order() {
        let service = Arc::new(LocalCiphertextService::new());
        let holder = Keypair::generate();
        let a = service.encrypt(10).unwrap();
        let b = service.encrypt(20).unwrap();
        service.grant_capability(&a, &holder.identity()).unwrap();
        service.grant_capability(&b, &holder.identity()).unwrap();

        let gateway = Arc::new(Gateway::new(service, registry(), GatewayConfig::default()));
        let (transport, _task) = MemoryTransport::serve(gateway, 8);
        let session = DecryptionSession::new(transport, registry(), GatewayConfig::default());

        let values = session.decrypt_now(&holder, &[b, a]).await.unwrap();
        assert_eq!(values, vec![(b, 20), (a, 10)]);
    }

    #[tokio::test]
    async fn test_mismatched_reply_rejected() {
        let session = DecryptionSession::new(Confused, registry(), GatewayConfig::default());
        let result = session
            .decrypt_now(&Keypair::generate(), &[CiphertextHandle::ZERO])
            .await;
        assert!(matches!(result, Err(GatewayError::UnexpectedResponse(_))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let config = GatewayConfig {
            request_timeout: std::time::Duration::from_millis(20),
            ..GatewayConfig::default()
        };
        let session = DecryptionSession::new(Silent, registry(), config);
        let result = session
            .decrypt_now(&Keypair::generate(), &[CiphertextHandle::ZERO])
            .await;
        assert!(matches!(result, Err(GatewayError::Timeout(_))));
    }
}
