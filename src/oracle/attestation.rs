//! Attestation proofs for automatic question resolution.
//!
//! An attester fetches a configured API source, post-processes the response
//! and signs the resulting outcome index. The oracle only checks that the
//! signature is valid for the configured attester key; how the data was
//! fetched is not its concern.

use alloy_primitives::{B256, U256};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One source's signed answer to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub question_id: B256,
    pub url: String,
    pub postprocess_key: String,
    pub timestamp: u64,
    /// Decoded outcome index
    pub result: U256,
    /// Hex-encoded Ed25519 signature over `signing_hash()`
    #[serde(default)]
    pub signature: String,
}

impl Proof {
    pub fn new(
        question_id: B256,
        url: impl Into<String>,
        postprocess_key: impl Into<String>,
        timestamp: u64,
        result: U256,
    ) -> Self {
        Self {
            question_id,
            url: url.into(),
            postprocess_key: postprocess_key.into(),
            timestamp,
            result,
            signature: String::new(),
        }
    }

    /// `question_id ‖ url ‖ 0x00 ‖ postprocess_key ‖ timestamp_be ‖ result_be32`
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.url.len() + self.postprocess_key.len() + 73);
        bytes.extend_from_slice(self.question_id.as_slice());
        bytes.extend_from_slice(self.url.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(self.postprocess_key.as_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&self.result.to_be_bytes::<32>());
        bytes
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_bytes());
        hasher.finalize().into()
    }

    /// Signs the proof in place. Used by attesters and in tests.
    pub fn sign(mut self, key: &SigningKey) -> Self {
        let signature = key.sign(&self.signing_hash());
        self.signature = hex::encode(signature.to_bytes());
        self
    }
}

// ============================================================================
// VERIFICATION PREDICATE
// ============================================================================

pub trait AttestationVerifier {
    fn verify(&self, proof: &Proof) -> bool;

    fn name(&self) -> &str;
}

/// Accepts any proof. Development and tests only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissiveVerifier;

impl AttestationVerifier for PermissiveVerifier {
    fn verify(&self, _proof: &Proof) -> bool {
        true
    }

    fn name(&self) -> &str {
        "permissive"
    }
}

/// Accepts proofs signed by one configured attester key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ed25519Verifier {
    attester: VerifyingKey,
}

impl Ed25519Verifier {
    pub fn new(attester: VerifyingKey) -> Self {
        Self { attester }
    }

    /// Parses a hex-encoded 32-byte public key.
    pub fn from_hex(public_key: &str) -> Result<Self, String> {
        let bytes = hex::decode(public_key.trim_start_matches("0x"))
            .map_err(|e| format!("Invalid attester key hex: {}", e))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "Attester key must be 32 bytes".to_string())?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| format!("Invalid attester key: {}", e))?;
        Ok(Self::new(key))
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.attester.as_bytes())
    }

    /// Fresh attester keypair. The signing half belongs to whoever runs the
    /// attester; only the verifying half is configured on the oracle.
    pub fn generate() -> (SigningKey, Self) {
        let key = SigningKey::generate(&mut OsRng);
        let verifier = Self::new(key.verifying_key());
        (key, verifier)
    }
}

impl AttestationVerifier for Ed25519Verifier {
    fn verify(&self, proof: &Proof) -> bool {
        let Ok(sig_bytes) = hex::decode(proof.signature.trim_start_matches("0x")) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
            return false;
        };
        let signature = Signature::from_bytes(&sig_bytes);
        self.attester
            .verify(&proof.signing_hash(), &signature)
            .is_ok()
    }

    fn name(&self) -> &str {
        "ed25519"
    }
}

/// Enum wrapper so the oracle stays serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifierType {
    Permissive(PermissiveVerifier),
    Ed25519(Ed25519Verifier),
}

impl AttestationVerifier for VerifierType {
    fn verify(&self, proof: &Proof) -> bool {
        match self {
            VerifierType::Permissive(v) => v.verify(proof),
            VerifierType::Ed25519(v) => v.verify(proof),
        }
    }

    fn name(&self) -> &str {
        match self {
            VerifierType::Permissive(v) => v.name(),
            VerifierType::Ed25519(v) => v.name(),
        }
    }
}
