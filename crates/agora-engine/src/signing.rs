//! Ed25519 signing and verification behind the consensus seams.

use agora_consensus::{SignatureRef, SignatureVerifier};
use ed25519_dalek::{Signature, Signer as DalekSigner, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// Produces phase-message signatures for one validator identity.
pub trait Signer: Send + Sync {
    /// The verifying key bytes registered with the validator record.
    fn public_key(&self) -> [u8; 32];
    /// Sign a canonical phase payload.
    fn sign(&self, payload: &[u8]) -> SignatureRef;
}

/// Ed25519 [`Signer`] over a locally held signing key.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    /// Deterministic identity from seed bytes (tests, key import).
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(bytes))
    }
}

impl Signer for Ed25519Signer {
    fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    fn sign(&self, payload: &[u8]) -> SignatureRef {
        SignatureRef(self.signing_key.sign(payload).to_vec())
    }
}

/// Ed25519 implementation of the consensus verifier seam.
///
/// Malformed keys or signatures verify as false rather than erroring; a
/// broken message is indistinguishable from a forged one here.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &[u8; 32], payload: &[u8], signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(payload, &signature).is_ok()
    }
}
