//! The access control manager.
//!
//! Computes policy transitions and decryption decisions. It holds no state:
//! bindings are owned and persisted by the registry, and passed in here.

use serde::{Deserialize, Serialize};

use shroud_core::{AccessPolicy, BindingId, CiphertextHandle, Identity, PolicyBinding, RegistryId};

/// Result of a disclosure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disclosure {
    /// The binding moved to `Public`; persist the returned binding.
    Changed(PolicyBinding),

    /// The binding was already public. Nothing to do.
    AlreadyPublic,
}

/// A collaborator capability implied by a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grant {
    /// Decryption capability for the owning identity.
    Owner {
        handle: CiphertextHandle,
        owner: Identity,
    },

    /// The registry's own capability, exercised by its administrator.
    Registry {
        handle: CiphertextHandle,
        registry: RegistryId,
    },

    /// Decryption by anyone.
    Public { handle: CiphertextHandle },
}

/// Stateless policy logic.
pub struct AccessControl;

impl AccessControl {
    /// Bind a freshly minted or replaced handle.
    ///
    /// Every bind starts at `OwnerAndRegistry`, whatever policy the handle's
    /// predecessor had.
    pub fn bind(handle: CiphertextHandle, owner: Identity, lineage: BindingId) -> PolicyBinding {
        PolicyBinding {
            handle,
            owner,
            policy: AccessPolicy::OwnerAndRegistry,
            lineage,
        }
    }

    /// The binding of the collaborator's canonical zero handle.
    ///
    /// The zero handle is pre-authorized: anyone may read it and no
    /// identity owns it. It implies no grants beyond what the collaborator
    /// already holds, and clearing a record never rebinds it.
    pub fn canonical_zero(handle: CiphertextHandle, lineage: BindingId) -> PolicyBinding {
        PolicyBinding {
            handle,
            owner: Identity::ZERO,
            policy: AccessPolicy::Public,
            lineage,
        }
    }

    /// Make a binding public.
    pub fn disclose(binding: &PolicyBinding) -> Disclosure {
        if binding.policy.is_public() {
            return Disclosure::AlreadyPublic;
        }
        Disclosure::Changed(PolicyBinding {
            policy: AccessPolicy::Public,
            ..binding.clone()
        })
    }

    /// Whether `requester` may obtain a decrypted view of the bound handle.
    ///
    /// An unbound handle authorizes nobody. `OwnerOnly` ignores the
    /// administrator flag.
    pub fn authorize_decrypt(
        binding: Option<&PolicyBinding>,
        requester: &Identity,
        owner: &Identity,
        is_administrator: bool,
    ) -> bool {
        let Some(binding) = binding else {
            return false;
        };

        match binding.policy {
            AccessPolicy::Public => true,
            AccessPolicy::OwnerAndRegistry => requester == owner || is_administrator,
            AccessPolicy::OwnerOnly => requester == owner,
        }
    }

    /// The collaborator grants a binding implies.
    ///
    /// These are exactly the capabilities `authorize_decrypt` assumes: the
    /// owner always, the registry unless `OwnerOnly`, everyone if `Public`.
    pub fn grants(binding: &PolicyBinding, registry: &RegistryId) -> Vec<Grant> {
        let mut grants = vec![Grant::Owner {
            handle: binding.handle,
            owner: binding.owner,
        }];

        if binding.policy != AccessPolicy::OwnerOnly {
            grants.push(Grant::Registry {
                handle: binding.handle,
                registry: *registry,
            });
        }

        if binding.policy.is_public() {
            grants.push(Grant::Public {
                handle: binding.handle,
            });
        }

        grants
    }
}
