//! Transport abstraction for the decryption protocol.
//!
//! A transport carries one request to a gateway and brings back its answer.
//! Implementations may use HTTP, a relayer, or anything else.

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::GatewayMessage;

/// Request/response transport to a gateway.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the matching response.
    async fn request(&self, message: GatewayMessage) -> Result<GatewayMessage>;
}

/// An in-memory transport for testing.
///
/// Serves a [`Gateway`](crate::Gateway) on a tokio task. Messages cross the
/// channel CBOR-encoded, as they would on a real wire.
pub mod memory {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::{mpsc, oneshot};
    use tokio::task::JoinHandle;

    use shroud_perms::CiphertextService;

    use crate::credential::unix_now;
    use crate::error::GatewayError;
    use crate::gateway::Gateway;

    struct Envelope {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Vec<u8>>,
    }

    /// Client end of an in-memory gateway.
    #[derive(Clone)]
    pub struct MemoryTransport {
        sender: mpsc::Sender<Envelope>,
    }

    impl MemoryTransport {
        /// Spawn `gateway` on the current runtime and connect to it.
        ///
        /// The serving task ends when every transport clone is dropped.
        pub fn serve<C>(gateway: Arc<Gateway<C>>, buffer: usize) -> (Self, JoinHandle<()>)
        where
            C: CiphertextService + 'static,
        {
            let (sender, mut receiver) = mpsc::channel::<Envelope>(buffer);

            let task = tokio::spawn(async move {
                while let Some(envelope) = receiver.recv().await {
                    let reply = gateway.handle_bytes(&envelope.bytes, unix_now());
                    // The requester may have timed out and gone away.
                    let _ = envelope.reply.send(reply);
                }
                tracing::debug!("memory gateway stopped");
            });

            (Self { sender }, task)
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn request(&self, message: GatewayMessage) -> Result<GatewayMessage> {
            let (reply, response) = oneshot::channel();
            self.sender
                .send(Envelope {
                    bytes: message.to_bytes(),
                    reply,
                })
                .await
                .map_err(|_| GatewayError::TransportError("gateway stopped".into()))?;

            let bytes = response
                .await
                .map_err(|_| GatewayError::TransportError("gateway dropped request".into()))?;
            GatewayMessage::from_bytes(&bytes)
        }
    }
}
