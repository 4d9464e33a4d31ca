//! Registry scenarios: record lifecycle, disclosure, clearing, and the
//! administrator role, exercised through the public API.

use shroud_registry::core::{AccessPolicy, CiphertextHandle, Identity, RegistryEvent};
use shroud_registry::perms::CiphertextService;
use shroud_registry::RegistryError;
use shroud_testkit::TestFixture;

#[test]
fn never_registered_identity_reads_empty() {
    let fixture = TestFixture::new();
    for who in fixture.participants(5) {
        let who = who.identity();
        assert!(!fixture.registry.is_registered(&who).unwrap());
        assert_eq!(
            fixture.registry.get_record(&who).unwrap(),
            (false, String::new(), *CiphertextHandle::ZERO.as_bytes())
        );
    }
}

#[test]
fn end_to_end_record_lifecycle() {
    let fixture = TestFixture::new();
    let registry = &fixture.registry;
    let alice = fixture.participant("alice");
    let a = alice.identity();
    let admin = fixture.admin_identity();

    let h1 = fixture.register(&alice, "alice", 30);
    assert_eq!(registry.get_record(&a).unwrap(), (true, "alice".into(), *h1.as_bytes()));

    registry.update_display_name(&a, "alicia").unwrap();
    assert_eq!(registry.get_record(&a).unwrap(), (true, "alicia".into(), *h1.as_bytes()));

    let h2 = fixture.update(&alice, 31);
    assert_ne!(h2, h1);
    assert_eq!(registry.get_record(&a).unwrap(), (true, "alicia".into(), *h2.as_bytes()));

    registry.disclose_for(&admin, &a).unwrap();
    let anyone = fixture.stranger().identity();
    assert!(registry.authorize_decrypt(&h2, &anyone, &a, false).unwrap());

    registry.clear(&admin, &a).unwrap();
    assert_eq!(
        registry.get_record(&a).unwrap(),
        (false, String::new(), *CiphertextHandle::ZERO.as_bytes())
    );

    let kinds: Vec<_> = registry
        .events_since(0, 100)
        .unwrap()
        .iter()
        .map(|e| e.event.kind())
        .collect();
    assert_eq!(
        kinds,
        ["registered", "display_name_updated", "registered", "disclosed", "cleared"]
    );
}

#[test]
fn update_event_carries_current_name_and_new_handle() {
    let fixture = TestFixture::new();
    let alice = fixture.participant("alice");
    fixture.register(&alice, "alice", 30);
    fixture.registry.update_display_name(&alice.identity(), "alicia").unwrap();

    let h2 = fixture.update(&alice, 12);

    let last = fixture.registry.events_since(0, 100).unwrap().pop().unwrap();
    assert_eq!(
        last.event,
        RegistryEvent::Registered {
            identity: alice.identity(),
            display_name: "alicia".into(),
            handle: h2,
        }
    );
}

#[test]
fn disclose_twice_stays_public() {
    let fixture = TestFixture::new();
    let alice = fixture.participant("alice");
    let handle = fixture.register(&alice, "alice", 30);

    fixture.registry.disclose_own(&alice.identity()).unwrap();
    fixture.registry.disclose_own(&alice.identity()).unwrap();

    assert_eq!(fixture.registry.policy_of(&handle).unwrap(), Some(AccessPolicy::Public));
    assert!(fixture.service.is_public(&handle).unwrap());
}

#[test]
fn disclose_requires_registration() {
    let fixture = TestFixture::new();
    let nobody = fixture.participant("nobody").identity();
    assert!(matches!(
        fixture.registry.disclose_own(&nobody),
        Err(RegistryError::NotRegistered(who)) if who == nobody
    ));
}

#[test]
fn update_does_not_inherit_disclosure() {
    let fixture = TestFixture::new();
    let alice = fixture.participant("alice");
    fixture.register(&alice, "alice", 30);
    fixture.registry.disclose_own(&alice.identity()).unwrap();

    let fresh = fixture.update(&alice, 40);

    assert_eq!(
        fixture.registry.policy_of(&fresh).unwrap(),
        Some(AccessPolicy::OwnerAndRegistry)
    );
    assert!(!fixture.service.is_public(&fresh).unwrap());
}

#[test]
fn public_handle_authorizes_any_requester() {
    let fixture = TestFixture::new();
    let alice = fixture.participant("alice");
    let handle = fixture.register(&alice, "alice", 30);
    fixture.registry.disclose_own(&alice.identity()).unwrap();

    for requester in fixture.participants(8) {
        assert!(fixture
            .registry
            .authorize_decrypt(&handle, &requester.identity(), &alice.identity(), false)
            .unwrap());
    }
    assert!(fixture.registry.can_decrypt(&handle, &Identity::ZERO).unwrap());
}

#[test]
fn zero_value_registration_is_freshly_bound() {
    let fixture = TestFixture::new();
    let bob = fixture.participant("bob");
    fixture.register(&bob, "bob", 1);
    fixture.registry.clear(&fixture.admin_identity(), &bob.identity()).unwrap();
    let zero = fixture.registry.binding_of(&CiphertextHandle::ZERO).unwrap().unwrap();

    let alice = fixture.participant("alice");
    let handle = fixture.register(&alice, "alice", 0);
    let binding = fixture.registry.binding_of(&handle).unwrap().unwrap();

    assert!(binding.lineage > zero.lineage);
    assert_eq!(binding.owner, alice.identity());
    assert_eq!(fixture.service.decrypt(&handle).unwrap(), 0);
}

#[test]
fn clear_then_reregister_is_unrelated() {
    let fixture = TestFixture::new();
    let alice = fixture.participant("alice");
    let before = fixture.register(&alice, "alice", 30);
    fixture.registry.disclose_own(&alice.identity()).unwrap();

    fixture.registry.clear(&fixture.admin_identity(), &alice.identity()).unwrap();
    assert!(!fixture.registry.is_registered(&alice.identity()).unwrap());

    let after = fixture.register(&alice, "alice", 30);
    assert_ne!(after, before);

    let old = fixture.registry.binding_of(&before).unwrap().unwrap();
    let new = fixture.registry.binding_of(&after).unwrap().unwrap();
    assert_ne!(old.lineage, new.lineage);
    assert_eq!(old.policy, AccessPolicy::Public);
    assert_eq!(new.policy, AccessPolicy::OwnerAndRegistry);
}

#[test]
fn role_transfer_moves_privileges() {
    let fixture = TestFixture::new();
    let registry = &fixture.registry;
    let old_admin = fixture.admin_identity();
    let new_admin = fixture.participant("new-admin").identity();
    let alice = fixture.participant("alice");
    let bob = fixture.participant("bob");
    fixture.register(&alice, "alice", 30);
    fixture.register(&bob, "bob", 40);

    registry.transfer_administrator(&old_admin, &new_admin).unwrap();

    assert!(matches!(
        registry.disclose_for(&old_admin, &alice.identity()),
        Err(RegistryError::NotAuthorized { .. })
    ));
    assert!(matches!(
        registry.clear(&old_admin, &bob.identity()),
        Err(RegistryError::NotAuthorized { .. })
    ));
    assert!(matches!(
        registry.transfer_administrator(&old_admin, &old_admin),
        Err(RegistryError::NotAuthorized { .. })
    ));

    registry.disclose_for(&new_admin, &alice.identity()).unwrap();
    registry.clear(&new_admin, &bob.identity()).unwrap();

    let transfer = registry
        .events_since(0, 100)
        .unwrap()
        .into_iter()
        .find(|e| matches!(e.event, RegistryEvent::AdministratorTransferred { .. }))
        .unwrap();
    assert_eq!(
        transfer.event,
        RegistryEvent::AdministratorTransferred {
            previous: old_admin,
            current: new_admin,
        }
    );
}

#[test]
fn failed_operations_change_nothing() {
    let fixture = TestFixture::new();
    let alice = fixture.participant("alice");
    let handle = fixture.register(&alice, "alice", 30);
    let seq = fixture.registry.events_since(0, 100).unwrap().len();

    let (ciphertext, _) = fixture.external(&alice, 50);
    let (_, wrong_proof) = fixture.external(&fixture.participant("mallory"), 50);
    assert!(matches!(
        fixture.registry.update_attribute(&alice.identity(), &ciphertext, &wrong_proof),
        Err(RegistryError::InvalidCiphertext(_))
    ));
    assert!(matches!(
        fixture.registry.update_display_name(&alice.identity(), &"x".repeat(65)),
        Err(RegistryError::InvalidInput(_))
    ));
    assert!(matches!(
        fixture.registry.register_with_plain_value(&alice.identity(), "alice", 1_000),
        Err(RegistryError::InvalidInput(_))
    ));

    assert_eq!(
        fixture.registry.get_record(&alice.identity()).unwrap(),
        (true, "alice".into(), *handle.as_bytes())
    );
    assert_eq!(fixture.registry.events_since(0, 100).unwrap().len(), seq);
}

#[tokio::test]
async fn subscribers_see_committed_events() {
    let fixture = TestFixture::new();
    let mut feed = fixture.registry.subscribe();
    let alice = fixture.participant("alice");

    let handle = fixture.register(&alice, "alice", 30);
    fixture.registry.disclose_own(&alice.identity()).unwrap();

    let first = feed.recv().await.unwrap();
    assert_eq!(first.seq, 1);
    assert!(matches!(first.event, RegistryEvent::Registered { handle: h, .. } if h == handle));

    let second = feed.recv().await.unwrap();
    assert_eq!(second.seq, 2);
    assert!(matches!(second.event, RegistryEvent::Disclosed { handle: h, .. } if h == handle));
}
