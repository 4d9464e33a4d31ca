//! # Shroud Store
//!
//! Storage abstraction for the Shroud registry. Provides a trait-based
//! interface for record, policy binding, role, and event persistence with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts persistence behind the [`RecordStore`] trait, so the
//! registry is storage-agnostic. The persistent implementation is
//! [`SqliteStore`], with [`MemoryStore`] for tests.
//!
//! ## Key Types
//!
//! - [`RecordStore`] - The trait for all storage operations
//! - [`Changeset`] - One operation's staged writes, committed all-or-nothing
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shroud_store::{Changeset, RecordStore, RecordStoreExt, SqliteStore};
//! use shroud_core::{Identity, Record};
//!
//! let store = SqliteStore::open("registry.db").unwrap();
//! let alice = Identity::from_bytes([1; 32]);
//!
//! // Reads are total: unknown identities yield the empty record.
//! assert_eq!(store.get_record(&alice).unwrap(), Record::absent());
//! assert!(!store.is_registered(&alice).unwrap());
//! ```
//!
//! ## Design Notes
//!
//! - **Total reads**: `get_record` never reports "not found"; absence is the
//!   canonical empty record.
//! - **Atomic commits**: a [`Changeset`] applies every record, binding,
//!   role, and event write or none of them.
//! - **Append-only events**: events get sequence numbers at commit time and
//!   are never rewritten.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Changeset, RecordStore, RecordStoreExt};
