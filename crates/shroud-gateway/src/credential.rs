//! Delegation credentials.
//!
//! A credential is a short-lived statement, signed by an identity's
//! long-lived key, that names the handles it wants decrypted, the registry
//! they belong to, the session key to seal results to, and a validity
//! window. The signature covers the canonical CBOR encoding of exactly that
//! tuple, so nothing in it can be swapped after signing.

use ciborium::value::{Integer, Value};
use serde::{Deserialize, Serialize};

use shroud_core::{
    canonical_value_bytes, map_get, value_to_array32, CiphertextHandle, Identity,
    IdentitySignature, Keypair, RegistryId,
};
use shroud_perms::X25519PublicKey;

use crate::error::{GatewayError, Result};

/// Domain prefix of the signed bytes.
pub const DELEGATION_DOMAIN: &[u8] = b"shroud-delegation-v0:";

/// Longest validity window a credential may claim (365 days).
pub const MAX_VALIDITY_SECS: u64 = 365 * 24 * 60 * 60;

/// Payload map keys.
mod keys {
    pub const REGISTRY_ID: u64 = 0;
    pub const EPHEMERAL_PUBLIC: u64 = 1;
    pub const HANDLES: u64 = 2;
    pub const VALID_FROM: u64 = 3;
    pub const VALID_DURATION: u64 = 4;
}

/// What a credential entitles its holder to do with a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Scope {
    /// Obtain the sealed plaintext.
    Decrypt = 0,
}

impl Scope {
    /// Convert to the wire discriminant.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire discriminant.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Scope::Decrypt),
            _ => None,
        }
    }
}

/// The signed part of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPayload {
    /// Registry the handles belong to.
    pub registry_id: RegistryId,

    /// Session key results are sealed to.
    pub ephemeral_public: X25519PublicKey,

    /// Requested handles, sorted and deduplicated.
    pub handles: Vec<(CiphertextHandle, Scope)>,

    /// Start of the validity window (Unix seconds).
    pub valid_from: u64,

    /// Length of the validity window in seconds.
    pub valid_duration: u64,
}

impl DelegationPayload {
    /// Build a payload requesting decryption of `handles`.
    pub fn new(
        registry_id: RegistryId,
        ephemeral_public: X25519PublicKey,
        handles: impl IntoIterator<Item = CiphertextHandle>,
        valid_from: u64,
        valid_duration: u64,
    ) -> Self {
        let mut handles: Vec<(CiphertextHandle, Scope)> =
            handles.into_iter().map(|h| (h, Scope::Decrypt)).collect();
        handles.sort();
        handles.dedup();

        Self {
            registry_id,
            ephemeral_public,
            handles,
            valid_from,
            valid_duration,
        }
    }

    /// First second after the window.
    pub fn valid_until(&self) -> u64 {
        self.valid_from.saturating_add(self.valid_duration)
    }

    /// Whether `now` falls in `valid_from .. valid_from + valid_duration`.
    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.valid_from && now < self.valid_until()
    }

    /// The requested handles, in canonical order.
    pub fn handle_set(&self) -> Vec<CiphertextHandle> {
        self.handles.iter().map(|(h, _)| *h).collect()
    }

    /// Check size and window limits.
    pub fn check_limits(&self, max_handles: usize, max_validity_secs: u64) -> Result<()> {
        if self.handles.is_empty() {
            return Err(GatewayError::InvalidRequest("no handles requested".into()));
        }
        if self.handles.len() > max_handles {
            return Err(GatewayError::InvalidRequest(format!(
                "{} handles requested, limit is {}",
                self.handles.len(),
                max_handles
            )));
        }
        if self.valid_duration == 0 || self.valid_duration > max_validity_secs {
            return Err(GatewayError::InvalidRequest(format!(
                "validity of {}s outside 1..={}s",
                self.valid_duration, max_validity_secs
            )));
        }
        Ok(())
    }

    /// Convert to the CBOR value that gets signed.
    ///
    /// Handles are re-sorted here, so the encoding does not depend on how
    /// the payload was assembled.
    pub fn to_cbor_value(&self) -> Value {
        let mut handles = self.handles.clone();
        handles.sort();
        handles.dedup();

        let handles = handles
            .iter()
            .map(|(handle, scope)| {
                Value::Array(vec![
                    Value::Bytes(handle.as_bytes().to_vec()),
                    Value::Integer(scope.to_u8().into()),
                ])
            })
            .collect();

        Value::Map(vec![
            (
                Value::Integer(keys::REGISTRY_ID.into()),
                Value::Bytes(self.registry_id.as_bytes().to_vec()),
            ),
            (
                Value::Integer(keys::EPHEMERAL_PUBLIC.into()),
                Value::Bytes(self.ephemeral_public.as_bytes().to_vec()),
            ),
            (Value::Integer(keys::HANDLES.into()), Value::Array(handles)),
            (
                Value::Integer(keys::VALID_FROM.into()),
                Value::Integer(self.valid_from.into()),
            ),
            (
                Value::Integer(keys::VALID_DURATION.into()),
                Value::Integer(self.valid_duration.into()),
            ),
        ])
    }

    /// Parse a payload from its CBOR value.
    pub fn from_cbor_value(value: &Value) -> Result<Self> {
        let Value::Map(entries) = value else {
            return Err(malformed("payload is not a map"));
        };

        let registry_id = map_get(entries, keys::REGISTRY_ID)
            .and_then(value_to_array32)
            .map(RegistryId::from_bytes)
            .ok_or_else(|| malformed("missing registry id"))?;
        let ephemeral_public = map_get(entries, keys::EPHEMERAL_PUBLIC)
            .and_then(value_to_array32)
            .map(X25519PublicKey::from_bytes)
            .ok_or_else(|| malformed("missing ephemeral public key"))?;

        let Some(Value::Array(raw_handles)) = map_get(entries, keys::HANDLES) else {
            return Err(malformed("missing handles"));
        };
        let handles = raw_handles
            .iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 => {
                    let handle = value_to_array32(&pair[0])
                        .map(CiphertextHandle::from_bytes)
                        .ok_or_else(|| malformed("bad handle"))?;
                    let scope = integer_u64(&pair[1])
                        .and_then(|s| u8::try_from(s).ok())
                        .and_then(Scope::from_u8)
                        .ok_or_else(|| malformed("bad scope"))?;
                    Ok((handle, scope))
                }
                _ => Err(malformed("bad handle entry")),
            })
            .collect::<Result<Vec<_>>>()?;

        let valid_from = map_get(entries, keys::VALID_FROM)
            .and_then(integer_u64)
            .ok_or_else(|| malformed("missing valid_from"))?;
        let valid_duration = map_get(entries, keys::VALID_DURATION)
            .and_then(integer_u64)
            .ok_or_else(|| malformed("missing valid_duration"))?;

        Ok(Self {
            registry_id,
            ephemeral_public,
            handles,
            valid_from,
            valid_duration,
        })
    }

    /// The exact bytes covered by the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = DELEGATION_DOMAIN.to_vec();
        bytes.extend(canonical_value_bytes(&self.to_cbor_value())?);
        Ok(bytes)
    }
}

fn integer_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}

fn malformed(what: &str) -> GatewayError {
    GatewayError::InvalidRequest(format!("malformed delegation payload: {}", what))
}

/// A payload together with its subject and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationCredential {
    /// The identity the credential speaks for.
    pub subject: Identity,

    /// What is being requested.
    pub payload: DelegationPayload,

    /// Signature by `subject` over `payload.signing_bytes()`.
    pub signature: IdentitySignature,
}

impl DelegationCredential {
    /// Sign a payload with an identity's long-lived key.
    pub fn sign(keypair: &Keypair, payload: DelegationPayload) -> Result<Self> {
        let signature = keypair.sign(&payload.signing_bytes()?);
        Ok(Self {
            subject: keypair.identity(),
            payload,
            signature,
        })
    }

    /// Check the signature against the subject.
    pub fn verify(&self) -> Result<()> {
        let message = self.payload.signing_bytes()?;
        self.subject
            .verify(&message, &self.signature)
            .map_err(|e| GatewayError::InvalidSignature(e.to_string()))
    }
}

/// Current wall-clock time in Unix seconds.
pub fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn handle(byte: u8) -> CiphertextHandle {
        CiphertextHandle::from_bytes([byte; 32])
    }

    fn payload(handles: Vec<CiphertextHandle>) -> DelegationPayload {
        DelegationPayload::new(
            RegistryId::from_bytes([1; 32]),
            X25519PublicKey::from_bytes([2; 32]),
            handles,
            1_000,
            3_600,
        )
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::generate();
        let credential = DelegationCredential::sign(&keypair, payload(vec![handle(1)])).unwrap();
        assert_eq!(credential.subject, keypair.identity());
        credential.verify().unwrap();
    }

    #[test]
    fn test_handle_order_does_not_matter() {
        let a = payload(vec![handle(3), handle(1), handle(2)]);
        let b = payload(vec![handle(1), handle(2), handle(3), handle(1)]);
        assert_eq!(a.signing_bytes().unwrap(), b.signing_bytes().unwrap());
        assert_eq!(a.handle_set(), vec![handle(1), handle(2), handle(3)]);
    }

    #[test]
    fn test_tampered_payload_fails() {
        let keypair = Keypair::generate();
        let mut credential =
            DelegationCredential::sign(&keypair, payload(vec![handle(1)])).unwrap();
        credential.payload.valid_duration += 1;
        assert!(matches!(
            credential.verify(),
            Err(GatewayError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_other_subject_fails() {
        let keypair = Keypair::generate();
        let mut credential =
            DelegationCredential::sign(&keypair, payload(vec![handle(1)])).unwrap();
        credential.subject = Keypair::generate().identity();
        assert!(credential.verify().is_err());
    }

    #[test]
    fn test_window_is_half_open() {
        let p = payload(vec![handle(1)]);
        assert!(!p.is_valid_at(999));
        assert!(p.is_valid_at(1_000));
        assert!(p.is_valid_at(4_599));
        assert!(!p.is_valid_at(4_600));
    }

    #[test]
    fn test_limits() {
        assert!(payload(vec![]).check_limits(16, MAX_VALIDITY_SECS).is_err());
        assert!(payload(vec![handle(1), handle(2)]).check_limits(1, MAX_VALIDITY_SECS).is_err());
        assert!(payload(vec![handle(1)]).check_limits(16, 60).is_err());
        assert!(payload(vec![handle(1)]).check_limits(16, MAX_VALIDITY_SECS).is_ok());
    }

    #[test]
    fn test_cbor_value_roundtrip() {
        let p = payload(vec![handle(9), handle(4)]);
        assert_eq!(DelegationPayload::from_cbor_value(&p.to_cbor_value()).unwrap(), p);
    }

    #[test]
    fn test_signing_bytes_are_domain_separated() {
        let bytes = payload(vec![handle(1)]).signing_bytes().unwrap();
        assert!(bytes.starts_with(DELEGATION_DOMAIN));
    }

    proptest! {
        #[test]
        fn test_window_membership(
            valid_from in 0u64..=u64::MAX / 2,
            valid_duration in 1u64..=MAX_VALIDITY_SECS,
            offset in 0u64..=2 * MAX_VALIDITY_SECS,
        ) {
            let p = DelegationPayload::new(
                RegistryId::from_bytes([1; 32]),
                X25519PublicKey::from_bytes([2; 32]),
                vec![handle(1)],
                valid_from,
                valid_duration,
            );
            let now = valid_from + offset;
            prop_assert_eq!(p.is_valid_at(now), offset < valid_duration);
            prop_assert!(valid_from == 0 || !p.is_valid_at(valid_from - 1));
        }

        #[test]
        fn test_any_handle_set_survives_reparse(fills in prop::collection::vec(any::<u8>(), 1..16)) {
            let p = payload(fills.iter().map(|b| handle(*b)).collect());
            let reparsed = DelegationPayload::from_cbor_value(&p.to_cbor_value()).unwrap();
            prop_assert_eq!(reparsed.signing_bytes().unwrap(), p.signing_bytes().unwrap());
        }
    }
}
