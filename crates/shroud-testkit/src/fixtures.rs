//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use shroud_core::{Blake3Hash, CiphertextHandle, Identity, Keypair, RegistryId};
use shroud_gateway::{DecryptionSession, Gateway, GatewayConfig, MemoryTransport};
use shroud_perms::{ExternalCiphertext, InputProof, LocalCiphertextService};
use shroud_registry::{Registry, RegistryConfig};
use shroud_store::MemoryStore;

/// The registry type every fixture builds.
pub type FixtureRegistry = Registry<Arc<MemoryStore>, Arc<LocalCiphertextService>>;

/// A registry with its store, encryption service, and administrator.
pub struct TestFixture {
    pub admin: Keypair,
    pub registry_id: RegistryId,
    pub store: Arc<MemoryStore>,
    pub service: Arc<LocalCiphertextService>,
    pub registry: FixtureRegistry,
}

impl TestFixture {
    /// Create a new test fixture with a random administrator and service key.
    pub fn new() -> Self {
        Self::build(Keypair::generate(), LocalCiphertextService::new())
    }

    /// Create with a deterministic administrator and service key from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::build(Keypair::from_seed(&seed), LocalCiphertextService::from_seed(seed))
    }

    fn build(admin: Keypair, service: LocalCiphertextService) -> Self {
        let registry_id = RegistryId::derive(&admin.identity(), "testkit");
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(service);
        let registry = Registry::open(
            Arc::clone(&store),
            Arc::clone(&service),
            RegistryConfig::for_registry(registry_id),
            &admin.identity(),
        )
        .expect("fixture registry should open");

        Self {
            admin,
            registry_id,
            store,
            service,
            registry,
        }
    }

    /// The administrator's identity.
    pub fn admin_identity(&self) -> Identity {
        self.admin.identity()
    }

    /// A participant whose key is derived from `name`.
    ///
    /// The same name always yields the same keypair.
    pub fn participant(&self, name: &str) -> Keypair {
        Keypair::from_seed(Blake3Hash::hash(name.as_bytes()).as_bytes())
    }

    /// `count` distinct participants.
    pub fn participants(&self, count: usize) -> Vec<Keypair> {
        (0..count)
            .map(|i| self.participant(&format!("participant-{}", i)))
            .collect()
    }

    /// A fresh identity with no relationship to anything in the registry.
    pub fn stranger(&self) -> Keypair {
        Keypair::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Register `who` with a plaintext value.
    pub fn register(&self, who: &Keypair, name: &str, value: u64) -> CiphertextHandle {
        self.registry
            .register_with_plain_value(&who.identity(), name, value)
            .expect("fixture registration should succeed")
    }

    /// An external ciphertext and proof for `who`, as a client would produce.
    pub fn external(&self, who: &Keypair, value: u64) -> (ExternalCiphertext, InputProof) {
        self.service
            .encrypt_input(value, &who.identity(), &self.registry_id)
            .expect("fixture input encryption should succeed")
    }

    /// Replace `who`'s attribute with `value`.
    pub fn update(&self, who: &Keypair, value: u64) -> CiphertextHandle {
        let (ciphertext, proof) = self.external(who, value);
        self.registry
            .update_attribute(&who.identity(), &ciphertext, &proof)
            .expect("fixture update should succeed")
    }

    /// A gateway for this registry, sharing the encryption service.
    pub fn gateway(&self) -> Gateway<Arc<LocalCiphertextService>> {
        Gateway::new(
            Arc::clone(&self.service),
            self.registry_id,
            GatewayConfig::default(),
        )
    }

    /// A client session connected to a freshly spawned gateway.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn session(&self) -> DecryptionSession<MemoryTransport> {
        let (transport, _task) = MemoryTransport::serve(Arc::new(self.gateway()), 64);
        DecryptionSession::new(transport, self.registry_id, GatewayConfig::default())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple independent registries for cross-registry tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[31] = 0xAD;
            TestFixture::with_seed(seed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_perms::CiphertextService;

    #[test]
    fn test_fixture_registers() {
        let fixture = TestFixture::new();
        let alice = fixture.participant("alice");

        let handle = fixture.register(&alice, "alice", 30);

        assert!(fixture.registry.is_registered(&alice.identity()).unwrap());
        assert_eq!(fixture.service.decrypt(&handle).unwrap(), 30);
        assert_eq!(fixture.registry.administrator().unwrap(), fixture.admin_identity());
    }

    #[test]
    fn test_participants_are_stable() {
        let fixture = TestFixture::new();
        assert_eq!(
            fixture.participant("bob").identity(),
            fixture.participant("bob").identity()
        );

        let parties = fixture.participants(3);
        assert_ne!(parties[0].identity(), parties[1].identity());
        assert_ne!(parties[1].identity(), parties[2].identity());
    }

    #[test]
    fn test_multi_party() {
        let fixtures = multi_party_fixtures(3);
        let ids: Vec<_> = fixtures.iter().map(|f| f.registry_id).collect();
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    #[tokio::test]
    async fn test_fixture_session_decrypts() {
        let fixture = TestFixture::new();
        let alice = fixture.participant("alice");
        let handle = fixture.register(&alice, "alice", 7);

        let values = fixture.session().decrypt_now(&alice, &[handle]).await.unwrap();
        assert_eq!(values, vec![(handle, 7)]);
    }
}
