//! Proptest generators for property-based testing.

use proptest::prelude::*;

use shroud_core::{CiphertextHandle, Identity, Keypair, RegistryId};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate the identity of a random keypair.
pub fn identity() -> impl Strategy<Value = Identity> {
    keypair().prop_map(|kp| kp.identity())
}

/// Generate a random, non-zero CiphertextHandle.
pub fn handle() -> impl Strategy<Value = CiphertextHandle> {
    any::<[u8; 32]>()
        .prop_filter("zero handle", |bytes| bytes != &[0u8; 32])
        .prop_map(CiphertextHandle::from_bytes)
}

/// Generate a random RegistryId.
pub fn registry_id() -> impl Strategy<Value = RegistryId> {
    any::<[u8; 32]>().prop_map(RegistryId::from_bytes)
}

/// Generate a display name accepted by the default registry limits.
pub fn display_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 _.-]{0,31}".prop_map(String::from)
}

/// Generate a display name the default registry limits reject.
pub fn invalid_display_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ \t]{1,8}".prop_map(String::from),
        "[a-z]{65,96}".prop_map(String::from),
    ]
}

/// Generate a value inside the default attribute domain.
pub fn plain_value() -> impl Strategy<Value = u64> {
    0u64..=255
}

/// Generate a value outside the default attribute domain.
pub fn out_of_domain_value() -> impl Strategy<Value = u64> {
    256u64..=u64::MAX
}

/// One registry operation, naming participants by index.
#[derive(Debug, Clone)]
pub enum RegistryOp {
    Register { who: usize, name: String, value: u64 },
    UpdateName { who: usize, name: String },
    UpdateAttribute { who: usize, value: u64 },
    DiscloseOwn { who: usize },
    DiscloseFor { target: usize },
    Clear { target: usize },
}

impl RegistryOp {
    /// The participant index the operation concerns.
    pub fn participant(&self) -> usize {
        match self {
            RegistryOp::Register { who, .. }
            | RegistryOp::UpdateName { who, .. }
            | RegistryOp::UpdateAttribute { who, .. }
            | RegistryOp::DiscloseOwn { who } => *who,
            RegistryOp::DiscloseFor { target } | RegistryOp::Clear { target } => *target,
        }
    }
}

/// Generate an operation over `participants` participants.
pub fn registry_op(participants: usize) -> impl Strategy<Value = RegistryOp> {
    let who = 0..participants.max(1);
    prop_oneof![
        3 => (who.clone(), display_name(), plain_value())
            .prop_map(|(who, name, value)| RegistryOp::Register { who, name, value }),
        1 => (who.clone(), display_name()).prop_map(|(who, name)| RegistryOp::UpdateName { who, name }),
        2 => (who.clone(), plain_value()).prop_map(|(who, value)| RegistryOp::UpdateAttribute { who, value }),
        1 => who.clone().prop_map(|who| RegistryOp::DiscloseOwn { who }),
        1 => who.clone().prop_map(|target| RegistryOp::DiscloseFor { target }),
        1 => who.prop_map(|target| RegistryOp::Clear { target }),
    ]
}

/// Parameters for a random registry history.
#[derive(Debug, Clone)]
pub struct RegistryOpParams {
    pub participants: usize,
    pub ops: Vec<RegistryOp>,
}

impl Arbitrary for RegistryOpParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (1usize..=4)
            .prop_flat_map(|participants| {
                prop::collection::vec(registry_op(participants), 1..=24)
                    .prop_map(move |ops| RegistryOpParams { participants, ops })
            })
            .boxed()
    }
}
