use basalt_common::Digest;
use ed25519_dalek::Signer as _;
use ed25519_dalek::Verifier as _;
use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::error::CryptoError;

/// A 32-byte Ed25519 public key, as embedded in a user [`basalt_common::Account`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PublicKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Signature(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// An Ed25519 secret key, used only by test fixtures and tooling that needs
/// to mint signed transactions/blocks — the execution core itself never
/// generates keys, only verifies signatures produced elsewhere.
pub struct SecretKey(SigningKey);

impl SecretKey {
    pub fn generate<R: rand::RngCore + rand::CryptoRng>(rng: &mut R) -> Self {
        SecretKey(SigningKey::generate(rng))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        SecretKey(SigningKey::from_bytes(&bytes))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }
}

/// Signs a digest with the given secret key.
pub fn sign(key: &SecretKey, digest: &Digest) -> Signature {
    let sig = key.0.sign(digest.as_bytes());
    Signature(sig.to_bytes())
}

/// Verifies an Ed25519 signature over a digest against a public key.
///
/// Returns `Ok(())` on success, `Err(CryptoError::InvalidSignature)` on any
/// failure (malformed key, malformed signature, or a signature that does not
/// verify) — callers that need a boolean should use `.is_ok()`.
pub fn verify(key: &PublicKey, digest: &Digest, signature: &Signature) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_bytes(&key.0).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key
        .verify(digest.as_bytes(), &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;

    #[test]
    fn sign_then_verify_round_trips() {
        let mut rng = rand::rngs::OsRng;
        let key = SecretKey::generate(&mut rng);
        let digest = hash(b"a transaction id");
        let sig = sign(&key, &digest);
        assert!(verify(&key.public_key(), &digest, &sig).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_digest() {
        let mut rng = rand::rngs::OsRng;
        let key = SecretKey::generate(&mut rng);
        let digest = hash(b"a transaction id");
        let sig = sign(&key, &digest);
        let other_digest = hash(b"a different transaction id");
        assert!(verify(&key.public_key(), &other_digest, &sig).is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let mut rng = rand::rngs::OsRng;
        let key = SecretKey::generate(&mut rng);
        let other_key = SecretKey::generate(&mut rng);
        let digest = hash(b"a transaction id");
        let sig = sign(&key, &digest);
        assert!(verify(&other_key.public_key(), &digest, &sig).is_err());
    }
}
