//! # Shroud Registry
//!
//! Per-identity records pairing a display name with an encrypted attribute,
//! and the rules for who may decrypt that attribute.
//!
//! ## Overview
//!
//! Each identity owns at most one record: a plaintext display name and a
//! ciphertext handle minted by the encryption service. The registry never
//! sees plaintext attributes. It tracks, per handle, which policy applies:
//!
//! - **OwnerAndRegistry**: every freshly bound handle. The owner and the
//!   current administrator may decrypt.
//! - **Public**: after disclosure. Anyone may decrypt. One-way.
//!
//! Replacing or clearing an attribute binds a new handle, so a disclosure
//! never carries over to a later value.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shroud_registry::{Registry, RegistryConfig};
//! use shroud_registry::core::{Keypair, RegistryId};
//! use shroud_registry::perms::LocalCiphertextService;
//! use shroud_registry::store::SqliteStore;
//!
//! let deployer = Keypair::generate().identity();
//! let store = SqliteStore::open("registry.db").unwrap();
//! let service = Arc::new(LocalCiphertextService::new());
//! let config = RegistryConfig::for_registry(RegistryId::derive(&deployer, "profiles"));
//!
//! let registry = Registry::open(store, service, config, &deployer).unwrap();
//!
//! let alice = Keypair::generate().identity();
//! let handle = registry.register_with_plain_value(&alice, "alice", 30).unwrap();
//! registry.disclose_own(&alice).unwrap();
//! assert!(registry.can_decrypt(&handle, &deployer).unwrap());
//! ```
//!
//! ## Re-exports
//!
//! - `shroud_registry::core` - Identities, handles, records, events
//! - `shroud_registry::store` - Storage abstraction and SQLite
//! - `shroud_registry::perms` - Policy logic and the encryption service

pub mod error;
pub mod registry;

pub use shroud_core as core;
pub use shroud_perms as perms;
pub use shroud_store as store;

pub use error::{RegistryError, Result};
pub use registry::{Registry, RegistryConfig};

// Convenience re-exports
pub use shroud_core::{AccessPolicy, CiphertextHandle, EventRecord, Identity, Record, RegistryEvent, RegistryId};
pub use shroud_perms::{CiphertextService, ExternalCiphertext, InputProof, LocalCiphertextService};
pub use shroud_store::{MemoryStore, RecordStore, SqliteStore};
