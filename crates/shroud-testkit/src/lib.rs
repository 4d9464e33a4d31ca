//! # Shroud Testkit
//!
//! Testing utilities for Shroud.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a registry wired to an in-process encryption service,
//!   with an administrator and named participants
//! - **Generators**: Proptest strategies for names, values, identities, and
//!   registry operation sequences
//! - **Delegation vectors**: pinned signing bytes for delegation payloads
//!
//! ## Test Fixtures
//!
//! ```rust
//! use shroud_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let alice = fixture.participant("alice");
//! let handle = fixture.register(&alice, "alice", 30);
//! assert!(fixture.registry.can_decrypt(&handle, &alice.identity()).unwrap());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use shroud_testkit::generators::{display_name, plain_value};
//!
//! proptest! {
//!     #[test]
//!     fn registration_is_readable(name in display_name(), value in plain_value()) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Delegation Vectors
//!
//! ```rust
//! use shroud_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{} produced {}", name, hex);
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, FixtureRegistry, TestFixture};
pub use generators::{RegistryOp, RegistryOpParams};
pub use vectors::{all_vectors, payload_from_vector, vectors_json, verify_all_vectors, DelegationVector};
