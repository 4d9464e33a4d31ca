//! Delegation vectors for deterministic verification.
//!
//! Pin the exact bytes a holder signs for a delegation payload, so any
//! implementation of the protocol can check its canonical encoding against
//! the same reference.

use serde::Serialize;

use shroud_core::{CiphertextHandle, RegistryId};
use shroud_gateway::DelegationPayload;
use shroud_perms::X25519PublicKey;

/// A delegation test vector.
///
/// Keys and handles are 32 copies of one fill byte.
#[derive(Debug, Clone)]
pub struct DelegationVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Fill byte of the registry id.
    pub registry: u8,
    /// Fill byte of the session public key.
    pub ephemeral_public: u8,
    /// Fill bytes of the requested handles, in request order.
    pub handles: &'static [u8],
    /// Start of the validity window.
    pub valid_from: u64,
    /// Length of the validity window.
    pub valid_duration: u64,
    /// Expected signing bytes (hex), domain prefix included.
    pub expected_signing_bytes: &'static str,
}

/// Get all delegation vectors.
pub fn all_vectors() -> Vec<DelegationVector> {
    vec![
        DelegationVector {
            name: "single handle, ten minute window",
            registry: 0x11,
            ephemeral_public: 0x22,
            handles: &[0x33],
            valid_from: 1_700_000_000,
            valid_duration: 600,
            expected_signing_bytes: concat!(
                "7368726f75642d64656c65676174696f6e2d76303a",
                "a5",
                "00", "5820", "1111111111111111111111111111111111111111111111111111111111111111",
                "01", "5820", "2222222222222222222222222222222222222222222222222222222222222222",
                "02", "81",
                "82", "5820", "3333333333333333333333333333333333333333333333333333333333333333", "00",
                "03", "1a6553f100",
                "04", "190258",
            ),
        },
        DelegationVector {
            name: "two handles requested out of order",
            registry: 0x11,
            ephemeral_public: 0x22,
            handles: &[0x44, 0x33, 0x44],
            valid_from: 1_700_000_000,
            valid_duration: 600,
            expected_signing_bytes: concat!(
                "7368726f75642d64656c65676174696f6e2d76303a",
                "a5",
                "00", "5820", "1111111111111111111111111111111111111111111111111111111111111111",
                "01", "5820", "2222222222222222222222222222222222222222222222222222222222222222",
                "02", "82",
                "82", "5820", "3333333333333333333333333333333333333333333333333333333333333333", "00",
                "82", "5820", "4444444444444444444444444444444444444444444444444444444444444444", "00",
                "03", "1a6553f100",
                "04", "190258",
            ),
        },
        DelegationVector {
            name: "all zero, one second window",
            registry: 0x00,
            ephemeral_public: 0x00,
            handles: &[0x00],
            valid_from: 0,
            valid_duration: 1,
            expected_signing_bytes: concat!(
                "7368726f75642d64656c65676174696f6e2d76303a",
                "a5",
                "00", "5820", "0000000000000000000000000000000000000000000000000000000000000000",
                "01", "5820", "0000000000000000000000000000000000000000000000000000000000000000",
                "02", "81",
                "82", "5820", "0000000000000000000000000000000000000000000000000000000000000000", "00",
                "03", "00",
                "04", "01",
            ),
        },
    ]
}

/// Build the payload a vector describes.
pub fn payload_from_vector(vector: &DelegationVector) -> DelegationPayload {
    DelegationPayload::new(
        RegistryId::from_bytes([vector.registry; 32]),
        X25519PublicKey::from_bytes([vector.ephemeral_public; 32]),
        vector
            .handles
            .iter()
            .map(|fill| CiphertextHandle::from_bytes([*fill; 32])),
        vector.valid_from,
        vector.valid_duration,
    )
}

/// Verify all vectors produce their expected signing bytes.
///
/// Returns `(name, matches, actual hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = payload_from_vector(v)
                .signing_bytes()
                .map(hex::encode)
                .unwrap_or_else(|e| format!("error: {}", e));
            let matches = hex == v.expected_signing_bytes;
            (v.name.to_string(), matches, hex)
        })
        .collect()
}

#[derive(Serialize)]
struct VectorReport<'a> {
    name: &'a str,
    signing_bytes: &'a str,
}

/// All vectors as JSON, for sharing with other implementations.
pub fn vectors_json() -> String {
    let vectors = all_vectors();
    let reports: Vec<_> = vectors
        .iter()
        .map(|v| VectorReport {
            name: v.name,
            signing_bytes: v.expected_signing_bytes,
        })
        .collect();
    serde_json::to_string_pretty(&reports).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_core::Keypair;
    use shroud_gateway::DelegationCredential;

    #[test]
    fn test_vectors_match() {
        for (name, matches, hex) in verify_all_vectors() {
            assert!(matches, "vector '{}' produced {}", name, hex);
        }
    }

    #[test]
    fn test_vectors_survive_cbor_value_roundtrip() {
        for vector in all_vectors() {
            let payload = payload_from_vector(&vector);
            let reparsed = DelegationPayload::from_cbor_value(&payload.to_cbor_value()).unwrap();
            assert_eq!(
                hex::encode(reparsed.signing_bytes().unwrap()),
                vector.expected_signing_bytes,
                "vector '{}' changed after reparsing",
                vector.name
            );
        }
    }

    #[test]
    fn test_vector_credentials_verify() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        for vector in all_vectors() {
            let credential = DelegationCredential::sign(&keypair, payload_from_vector(&vector)).unwrap();
            assert!(credential.verify().is_ok(), "vector '{}'", vector.name);
        }
    }

    #[test]
    fn test_vectors_json_lists_every_vector() {
        let json: serde_json::Value = serde_json::from_str(&vectors_json()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), all_vectors().len());
    }
}
