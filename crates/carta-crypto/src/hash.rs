//! Digest functions for content integrity and content addressing.
//!
//! `Carta` keeps two hashing paths apart:
//!
//! | Purpose | Algorithm | Use |
//! |---------|-----------|-----|
//! | Integrity | SHA-256 / SHA-512 | `content_hash` on records, ledger anchors, version chaining |
//! | Addressing | BLAKE3 | content fingerprints behind CIDs |
//!
//! Integrity digests are rendered as lowercase hex strings because they are
//! persisted, compared, and shipped to the ledger as text. Fingerprints stay
//! binary; the blob store turns them into content addresses.

use sha2::{Digest, Sha256, Sha512};

// ============================================================================
// Constants
// ============================================================================

/// Length of a BLAKE3 fingerprint in bytes (256 bits).
pub const FINGERPRINT_LENGTH: usize = 32;

// ============================================================================
// HashAlgorithm
// ============================================================================

/// Integrity digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-256 (FIPS 180-4). The default for content hashes.
    Sha256,
    /// SHA-512 (FIPS 180-4).
    Sha512,
}

// ============================================================================
// Digest Functions
// ============================================================================

/// Computes a lowercase hex digest of `data`.
///
/// Pure and deterministic: the same input yields the same output across
/// calls and processes.
///
/// # Example
///
/// ```
/// use carta_crypto::hash::{HashAlgorithm, hash_hex};
///
/// let digest = hash_hex(HashAlgorithm::Sha256, b"hello-world");
/// assert_eq!(
///     digest,
///     "afa27b44d43b02a9fea41d13cedc2e4016cfcf87c5dbf990e593669aa8ce286d"
/// );
/// ```
pub fn hash_hex(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        HashAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
    }
}

/// Computes the canonical content hash of record plaintext (SHA-256, hex).
///
/// This is the value pinned on the record row at creation and anchored on
/// the ledger; it is computed exactly once per version and never mutated.
pub fn content_hash(data: &[u8]) -> String {
    hash_hex(HashAlgorithm::Sha256, data)
}

// ============================================================================
// ContentFingerprint
// ============================================================================

/// A 32-byte BLAKE3 fingerprint used for content addressing.
///
/// Fingerprints are an internal performance path: BLAKE3 is several times
/// faster than SHA-256 on large blobs and the result never appears in an
/// audit trail, only inside content addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFingerprint([u8; FINGERPRINT_LENGTH]);

impl ContentFingerprint {
    /// Returns the fingerprint as a byte array reference.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ContentFingerprint({:016x}...)",
            u64::from_le_bytes(self.0[..8].try_into().unwrap())
        )
    }
}

/// Computes the BLAKE3 fingerprint of a blob.
pub fn fingerprint(data: &[u8]) -> ContentFingerprint {
    ContentFingerprint(*blake3::hash(data).as_bytes())
}

// ============================================================================
// Tests
// ============================================================================
