//! # Shroud Core
//!
//! Pure primitives for Shroud: identities, ciphertext handles, records,
//! registry events, and canonical encoding.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the data model shared by the registry, the store, and
//! the delegated decryption protocol.
//!
//! ## Key Types
//!
//! - [`Identity`] - A principal, named by its Ed25519 public key
//! - [`CiphertextHandle`] - Opaque 32-byte reference to an encrypted value
//! - [`RegistryId`] - Identifier of one registry instance
//! - [`Record`] - The per-identity record `{present, display_name, attribute_handle}`
//! - [`RegistryEvent`] - Entries of the append-only event log
//! - [`AccessPolicy`] / [`PolicyBinding`] - Per-handle decryption policy
//!
//! ## Canonicalization
//!
//! Anything that gets signed is encoded with deterministic CBOR. See the
//! [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod policy;
pub mod record;
pub mod types;
pub mod validation;

pub use canonical::{canonical_value_bytes, map_get, value_to_array32};
pub use crypto::{Blake3Hash, Identity, IdentitySignature, Keypair};
pub use error::{CoreError, ValidationError};
pub use policy::{AccessPolicy, PolicyBinding};
pub use record::{EventRecord, Record, RegistryEvent};
pub use types::{BindingId, CiphertextHandle, RegistryId};
pub use validation::{validate_display_name, validate_identity, validate_plain_value, validate_proof};
