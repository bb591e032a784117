// Artifact signing
//
// Two algorithms: hmac-sha256 for shared-secret deployments and ed25519 for
// public-key ones. Key material is hex: the HMAC secret, the ed25519 seed on
// the signing side, the ed25519 public key in the trusted-key set.

use super::artifact::ArtifactSignature;
use crate::config::{SigningAlgorithm, SigningConfig};
use crate::error::{BombeError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM_HMAC_SHA256: &str = "hmac-sha256";
pub const ALGORITHM_ED25519: &str = "ed25519";

pub fn sign(config: &SigningConfig, canonical: &[u8]) -> Result<ArtifactSignature> {
    let key_bytes = hex::decode(&config.key_material)
        .map_err(|e| BombeError::Config(format!("signing key material is not hex: {e}")))?;

    let (algorithm, value) = match config.algorithm {
        SigningAlgorithm::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(&key_bytes)
                .map_err(|e| BombeError::Config(format!("hmac key: {e}")))?;
            mac.update(canonical);
            (ALGORITHM_HMAC_SHA256, hex::encode(mac.finalize().into_bytes()))
        }
        SigningAlgorithm::Ed25519 => {
            let seed: [u8; 32] = key_bytes
                .as_slice()
                .try_into()
                .map_err(|_| BombeError::Config("ed25519 seed must be 32 bytes".to_string()))?;
            let signing_key = SigningKey::from_bytes(&seed);
            let signature = signing_key.sign(canonical);
            (ALGORITHM_ED25519, hex::encode(signature.to_bytes()))
        }
    };

    Ok(ArtifactSignature {
        algorithm: algorithm.to_string(),
        key_id: config.key_id.clone(),
        value,
    })
}

/// Derive the verification-side key material for a signing config: the same
/// secret for HMAC, the public key for ed25519.
pub fn verification_key_material(config: &SigningConfig) -> Result<String> {
    match config.algorithm {
        SigningAlgorithm::HmacSha256 => Ok(config.key_material.clone()),
        SigningAlgorithm::Ed25519 => {
            let key_bytes = hex::decode(&config.key_material)
                .map_err(|e| BombeError::Config(format!("signing key material is not hex: {e}")))?;
            let seed: [u8; 32] = key_bytes
                .as_slice()
                .try_into()
                .map_err(|_| BombeError::Config("ed25519 seed must be 32 bytes".to_string()))?;
            let signing_key = SigningKey::from_bytes(&seed);
            Ok(hex::encode(signing_key.verifying_key().to_bytes()))
        }
    }
}

/// Verify a signature value against trusted key material. Any malformed
/// input is simply a failed verification, never an error.
pub fn verify(
    algorithm: &str,
    key_material_hex: &str,
    canonical: &[u8],
    signature_hex: &str,
) -> bool {
    let Ok(key_bytes) = hex::decode(key_material_hex) else {
        return false;
    };
    let Ok(signature_bytes) = hex::decode(signature_hex) else {
        return false;
    };

    match algorithm {
        ALGORITHM_HMAC_SHA256 => {
            let Ok(mut mac) = HmacSha256::new_from_slice(&key_bytes) else {
                return false;
            };
            mac.update(canonical);
            mac.verify_slice(&signature_bytes).is_ok()
        }
        ALGORITHM_ED25519 => {
            let Ok(public) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
                return false;
            };
            let Ok(verifying_key) = VerifyingKey::from_bytes(&public) else {
                return false;
            };
            let Ok(signature_array) = <[u8; 64]>::try_from(signature_bytes.as_slice()) else {
                return false;
            };
            verifying_key
                .verify(canonical, &Signature::from_bytes(&signature_array))
                .is_ok()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmac_config() -> SigningConfig {
        SigningConfig {
            algorithm: SigningAlgorithm::HmacSha256,
            key_id: "k1".into(),
            key_material: hex::encode(b"a shared secret of decent length"),
        }
    }

    fn ed25519_config() -> SigningConfig {
        SigningConfig {
            algorithm: SigningAlgorithm::Ed25519,
            key_id: "k2".into(),
            key_material: hex::encode([7u8; 32]),
        }
    }

    #[test]
    fn hmac_round_trip() {
        let config = hmac_config();
        let signature = sign(&config, b"payload").unwrap();
        assert_eq!(signature.algorithm, ALGORITHM_HMAC_SHA256);
        let key = verification_key_material(&config).unwrap();
        assert!(verify(&signature.algorithm, &key, b"payload", &signature.value));
        assert!(!verify(&signature.algorithm, &key, b"tampered", &signature.value));
    }

    #[test]
    fn ed25519_round_trip() {
        let config = ed25519_config();
        let signature = sign(&config, b"payload").unwrap();
        let public = verification_key_material(&config).unwrap();
        assert!(verify(&signature.algorithm, &public, b"payload", &signature.value));
        assert!(!verify(&signature.algorithm, &public, b"other", &signature.value));
        // wrong key fails cleanly
        assert!(!verify(&signature.algorithm, &hex::encode([9u8; 32]), b"payload", &signature.value));
    }

    #[test]
    fn malformed_inputs_fail_closed() {
        assert!(!verify("hmac-sha256", "zz-not-hex", b"x", "aa"));
        assert!(!verify("ed25519", "aabb", b"x", "cc"));
        assert!(!verify("unknown-alg", "aa", b"x", "bb"));
    }
}
