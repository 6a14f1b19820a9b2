//! Ed25519 digital signatures for record non-repudiation.
//!
//! Thin, type-safe wrappers around `ed25519-dalek` for signing and
//! verifying record digests. A creation or access event can be signed to
//! prove authorship and detect tampering.
//!
//! # Example
//!
//! ```
//! use carta_crypto::signature::SigningKey;
//!
//! let signing_key = SigningKey::generate();
//! let verifying_key = signing_key.verifying_key();
//!
//! let message = b"record digest";
//! let signature = signing_key.sign(message);
//!
//! assert!(verifying_key.verify(message, &signature));
//! assert!(!verifying_key.verify(b"tampered", &signature));
//! ```

use ed25519_dalek::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH, Signer, Verifier};
use rand::rngs::OsRng;
use zeroize::ZeroizeOnDrop;

// ============================================================================
// Constants
// ============================================================================

/// Length of a signing key in bytes.
pub const SIGNING_KEY_LENGTH: usize = SECRET_KEY_LENGTH;

/// Length of a verifying key in bytes.
pub const VERIFYING_KEY_LENGTH: usize = PUBLIC_KEY_LENGTH;

// ============================================================================
// SigningKey
// ============================================================================

/// An Ed25519 signing key for creating digital signatures.
///
/// This is the secret half of the key pair and must be kept confidential.
///
/// # Security
///
/// - Never log or expose the key bytes
/// - Store wrapped at rest
/// - Use one key per identity
#[derive(Clone, ZeroizeOnDrop)]
pub struct SigningKey(ed25519_dalek::SigningKey);

impl SigningKey {
    /// Generates a new random signing key using the OS CSPRNG.
    ///
    /// # Panics
    ///
    /// Panics if the OS CSPRNG fails (should never happen on supported
    /// platforms).
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Restores a signing key from its 32-byte representation.
    ///
    /// Any 32 bytes form a valid Ed25519 secret key, so this cannot fail;
    /// only use bytes from a previously generated key.
    pub fn from_bytes(bytes: &[u8; SIGNING_KEY_LENGTH]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(bytes))
    }

    /// Returns the raw 32-byte secret key material.
    pub fn to_bytes(&self) -> [u8; SIGNING_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Returns the corresponding public key for signature verification.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Signs a message, producing a 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

// ============================================================================
// VerifyingKey
// ============================================================================

/// An Ed25519 public key for verifying signatures.
///
/// Safe to share, persist, and log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

impl VerifyingKey {
    /// Restores a verifying key from its 32-byte representation.
    ///
    /// # Errors
    ///
    /// Returns a signature error if the bytes do not encode a valid
    /// curve point.
    pub fn from_bytes(
        bytes: &[u8; VERIFYING_KEY_LENGTH],
    ) -> Result<Self, ed25519_dalek::SignatureError> {
        Ok(Self(ed25519_dalek::VerifyingKey::from_bytes(bytes)?))
    }

    /// Returns the raw 32-byte public key.
    pub fn to_bytes(&self) -> [u8; VERIFYING_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Verifies a signature over `message`.
    ///
    /// Returns `false` on any mismatch — a tampered message, a tampered
    /// signature, or the wrong key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify(message, &signature.0).is_ok()
    }
}

// ============================================================================
// Signature
// ============================================================================

/// A 64-byte Ed25519 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Restores a signature from its 64-byte representation.
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LENGTH]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(bytes))
    }

    /// Returns the raw 64-byte signature.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        self.0.to_bytes()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let signing_key = SigningKey::generate();
        let verifying_key = signing_key.verifying_key();
        let message = b"creation event for record:42";

        let signature = signing_key.sign(message);

        assert!(verifying_key.verify(message, &signature));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let signing_key = SigningKey::generate();
        let verifying_key = signing_key.verifying_key();

        let signature = signing_key.sign(b"original");

        assert!(!verifying_key.verify(b"tampered", &signature));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signing_key = SigningKey::generate();
        let other_key = SigningKey::generate().verifying_key();
        let message = b"message";

        let signature = signing_key.sign(message);

        assert!(!other_key.verify(message, &signature));
    }

    #[test]
    fn signing_key_roundtrips_through_bytes() {
        let original = SigningKey::generate();
        let restored = SigningKey::from_bytes(&original.to_bytes());

        let message = b"deterministic";
        assert_eq!(
            original.sign(message).to_bytes(),
            restored.sign(message).to_bytes()
        );
    }

    #[test]
    fn signature_roundtrips_through_bytes() {
        let signing_key = SigningKey::generate();
        let signature = signing_key.sign(b"payload");

        let restored = Signature::from_bytes(&signature.to_bytes());

        assert!(signing_key.verifying_key().verify(b"payload", &restored));
    }
}
