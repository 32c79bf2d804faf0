//! Ed25519 signing and verification of canonical receipt bytes.
//!
//! Signatures travel as `ed25519:<base64url>` strings so the algorithm is
//! explicit on the wire and future algorithms can coexist. The base64url
//! alphabet is unpadded.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

/// Algorithm tag prefixed to every encoded signature.
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signature is missing the '{SIGNATURE_ALGORITHM}:' algorithm tag")]
    MissingAlgorithmTag,

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signature is not valid base64url: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("signature has wrong length: expected 64 bytes, got {0}")]
    InvalidLength(usize),

    #[error("key material is invalid: {0}")]
    InvalidKey(String),

    #[error("signature does not match content")]
    VerificationFailed,
}

/// Signs canonical receipt bytes with a fixed Ed25519 key.
#[derive(Clone)]
pub struct ReceiptSigner {
    signing_key: SigningKey,
}

impl ReceiptSigner {
    /// Generate a signer with a fresh random key. Used by tests and by
    /// deployments that accept per-process keys.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Build a signer from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Build a signer from a base64url-encoded 32-byte seed, the form keys
    /// take in configuration.
    pub fn from_base64url(encoded: &str) -> Result<Self, SigningError> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SigningError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self::from_seed(&seed))
    }

    /// Sign canonical bytes, returning the tagged encoded signature.
    pub fn sign(&self, canonical_bytes: &[u8]) -> String {
        let signature = self.signing_key.sign(canonical_bytes);
        format!(
            "{SIGNATURE_ALGORITHM}:{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }

    /// The verifier for this signer's public half.
    pub fn verifier(&self) -> ReceiptVerifier {
        ReceiptVerifier {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Base64url-encoded seed, for writing generated keys back to config.
    pub fn seed_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.signing_key.to_bytes())
    }
}

impl std::fmt::Debug for ReceiptSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material in logs.
        write!(f, "ReceiptSigner({:?})", self.verifier())
    }
}

/// Verifies tagged signatures against canonical receipt bytes.
#[derive(Clone)]
pub struct ReceiptVerifier {
    verifying_key: VerifyingKey,
}

impl ReceiptVerifier {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SigningError> {
        let verifying_key =
            VerifyingKey::from_bytes(bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self { verifying_key })
    }

    /// Base64url-encoded public key, the form exposed over the API.
    pub fn public_key_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.verifying_key.to_bytes())
    }

    /// Check a tagged signature against canonical bytes. Any failure along
    /// the way (bad tag, bad encoding, mismatch) is an error, never a
    /// silent pass.
    pub fn verify(&self, canonical_bytes: &[u8], tagged: &str) -> Result<(), SigningError> {
        let (algorithm, encoded) = tagged
            .split_once(':')
            .ok_or(SigningError::MissingAlgorithmTag)?;
        if algorithm != SIGNATURE_ALGORITHM {
            return Err(SigningError::UnsupportedAlgorithm(algorithm.to_string()));
        }

        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?;
        let raw: [u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SigningError::InvalidLength(bytes.len()))?;
        let signature = Signature::from_bytes(&raw);

        self.verifying_key
            .verify(canonical_bytes, &signature)
            .map_err(|_| SigningError::VerificationFailed)
    }
}

impl std::fmt::Debug for ReceiptVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReceiptVerifier({})", &self.public_key_base64url()[..12])
    }
}
