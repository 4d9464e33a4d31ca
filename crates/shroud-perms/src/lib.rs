//! # Shroud Permissions
//!
//! Decryption policy and the boundary to the encryption collaborator.
//!
//! ## Overview
//!
//! Policy attaches to ciphertext handles. [`AccessControl`] computes the
//! initial binding of a handle, the one-way move to `Public`, and the
//! decryption decision; the registry persists the resulting
//! [`PolicyBinding`](shroud_core::PolicyBinding)s. Each binding implies a set
//! of [`Grant`]s that the registry issues through a [`CiphertextService`], so
//! the collaborator's view always matches the registry's.
//!
//! ## Sealing
//!
//! Decrypted values never travel in the clear:
//!
//! 1. The holder generates an X25519 session key
//! 2. The collaborator seals each value to it with a one-shot sender key
//! 3. The key is derived per handle, so a value cannot be re-labelled
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shroud_core::Identity;
//! use shroud_perms::{CiphertextService, LocalCiphertextService, SealedValue, X25519StaticSecret};
//!
//! let service = LocalCiphertextService::new();
//! let alice = Identity::from_bytes([1; 32]);
//!
//! let handle = service.encrypt(30).unwrap();
//! service.grant_capability(&handle, &alice).unwrap();
//!
//! let session = X25519StaticSecret::generate();
//! let sealed = SealedValue::seal(handle, service.decrypt(&handle).unwrap(), &session.public_key()).unwrap();
//! assert_eq!(sealed.open(&session).unwrap(), 30);
//! ```

pub mod access;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod local;
pub mod sealed;
pub mod service;

pub use access::{AccessControl, Disclosure, Grant};
pub use crypto::{EncryptionKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey, X25519StaticSecret};
pub use envelope::{EncryptedPayload, EncryptionFormat};
pub use error::{PermsError, Result};
pub use local::LocalCiphertextService;
pub use sealed::SealedValue;
pub use service::{CiphertextService, ExternalCiphertext, InputProof};
