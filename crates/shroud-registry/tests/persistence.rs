//! Registry state survives a restart on SQLite.

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use shroud_registry::core::{AccessPolicy, Keypair, RegistryId};
use shroud_registry::perms::{CiphertextService, LocalCiphertextService};
use shroud_registry::store::SqliteStore;
use shroud_registry::{Registry, RegistryConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn registry_reopens_with_state() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let path = dir.path().join("registry.db");

    let admin = Keypair::from_seed(&[0xAD; 32]).identity();
    let alice = Keypair::from_seed(&[0xA1; 32]).identity();
    let config = RegistryConfig::for_registry(RegistryId::derive(&admin, "persistence"));
    let service = Arc::new(LocalCiphertextService::from_seed([7; 32]));

    let (h1, h2) = {
        let registry = Registry::open(SqliteStore::open(&path)?, Arc::clone(&service), config.clone(), &admin)?;
        let h1 = registry.register_with_plain_value(&alice, "alice", 30)?;
        registry.disclose_own(&alice)?;
        let (ciphertext, proof) = service.encrypt_input(31, &alice, registry.registry_id())?;
        let h2 = registry.update_attribute(&alice, &ciphertext, &proof)?;
        (h1, h2)
    };

    // A different deployer on reopen does not displace the administrator.
    let someone_else = Keypair::from_seed(&[0x55; 32]).identity();
    let registry = Registry::open(SqliteStore::open(&path)?, Arc::clone(&service), config, &someone_else)?;

    assert_eq!(registry.administrator()?, admin);
    assert_eq!(registry.get_record(&alice)?, (true, "alice".into(), *h2.as_bytes()));
    assert_eq!(registry.policy_of(&h1)?, Some(AccessPolicy::Public));
    assert_eq!(registry.policy_of(&h2)?, Some(AccessPolicy::OwnerAndRegistry));
    assert_eq!(registry.events_since(0, 100)?.len(), 3);

    // The persisted administrator is the collaborator's operator again.
    assert!(service.is_allowed(&h2, &admin)?);
    assert!(!service.is_allowed(&h2, &someone_else)?);

    registry.clear(&admin, &alice)?;
    assert!(!registry.is_registered(&alice)?);
    assert_eq!(registry.events_since(3, 100)?.len(), 1);

    Ok(())
}

#[test]
fn transfer_persists() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("registry.db");

    let admin = Keypair::from_seed(&[0xAD; 32]).identity();
    let next = Keypair::from_seed(&[0xBE; 32]).identity();
    let service = Arc::new(LocalCiphertextService::new());

    {
        let registry = Registry::open(SqliteStore::open(&path)?, Arc::clone(&service), RegistryConfig::default(), &admin)?;
        registry.transfer_administrator(&admin, &next)?;
    }

    let registry = Registry::open(SqliteStore::open(&path)?, service, RegistryConfig::default(), &admin)?;
    assert_eq!(registry.administrator()?, next);
    Ok(())
}
