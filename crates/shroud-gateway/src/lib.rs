//! # Shroud Gateway
//!
//! Delegated decryption: how an identity gets the plaintext of a handle
//! without the registry ever seeing it.
//!
//! ## Overview
//!
//! The registry only hands out handles and policy state. To read a value, a
//! holder signs a short-lived [`DelegationCredential`] naming the handles,
//! the registry, a fresh session key, and a validity window. The
//! [`Gateway`] checks the credential and the collaborator's capabilities,
//! then returns each value sealed to the session key.
//!
//! ## Key Properties
//!
//! - **Bound**: the signature covers handles, registry, session key, and window
//! - **Short-lived**: credentials outside their window are rejected
//! - **Independent**: the gateway re-checks capabilities with the collaborator
//! - **Private**: plaintexts are opened only by the session key holder
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shroud_core::{Keypair, RegistryId};
//! use shroud_gateway::{DecryptionSession, Gateway, GatewayConfig, MemoryTransport};
//! use shroud_perms::LocalCiphertextService;
//!
//! async fn example(registry_id: RegistryId, holder: Keypair) {
//!     let service = Arc::new(LocalCiphertextService::new());
//!     let gateway = Arc::new(Gateway::new(service, registry_id, GatewayConfig::default()));
//!     let (transport, _task) = MemoryTransport::serve(gateway, 64);
//!
//!     let session = DecryptionSession::new(transport, registry_id, GatewayConfig::default());
//!     // let values = session.decrypt_now(&holder, &[handle]).await?;
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Holder                              Gateway
//!   |-- DecryptRequest(credential) --->|  registry, limits, signature,
//!   |                                  |  window, capabilities
//!   |<-- DecryptResponse(sealed) ------|
//!   |          or                      |
//!   |<-- Error(code, message) ---------|
//! ```

pub mod credential;
pub mod error;
pub mod gateway;
pub mod messages;
pub mod session;
pub mod transport;

pub use credential::{
    unix_now, DelegationCredential, DelegationPayload, Scope, DELEGATION_DOMAIN,
    MAX_VALIDITY_SECS,
};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayConfig};
pub use messages::{limits, GatewayErrorCode, GatewayMessage, PROTOCOL_VERSION};
pub use session::{DecryptionSession, DEFAULT_VALIDITY_SECS};
pub use transport::{memory::MemoryTransport, Transport};
