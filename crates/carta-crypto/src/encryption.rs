//! AES-256-GCM authenticated encryption for record content.
//!
//! Every record's content is encrypted under its own data key before it
//! leaves the process. AES-256-GCM is a FIPS 197 approved AEAD cipher that
//! provides both confidentiality and integrity.
//!
//! # Example
//!
//! ```
//! use carta_crypto::encryption::{EncryptionKey, encrypt, decrypt};
//! use carta_types::KeyId;
//!
//! let key = EncryptionKey::generate();
//! let payload = encrypt(&key, KeyId::generate(), b"lab result");
//!
//! let plaintext = decrypt(&key, &payload).unwrap();
//! assert_eq!(plaintext, b"lab result");
//! ```
//!
//! # Security
//!
//! - A fresh random IV is drawn from the OS CSPRNG on every [`encrypt`]
//!   call. Deterministic IV reuse is forbidden — nonce reuse completely
//!   breaks the confidentiality of AES-GCM.
//! - The authentication tag prevents tampering — decryption fails with
//!   [`CryptoError::Integrity`] if the ciphertext or tag is modified.
//! - Key material is securely zeroed from memory when dropped.

use aes_gcm::{Aes256Gcm, KeyInit, aead::Aead};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use carta_types::KeyId;

use crate::error::CryptoError;

// ============================================================================
// Constants
// ============================================================================

/// Length of an AES-256-GCM encryption key in bytes (256 bits).
pub const KEY_LENGTH: usize = 32;

/// Length of an AES-256-GCM IV in bytes (96 bits).
pub const IV_LENGTH: usize = 12;

/// Length of the AES-GCM authentication tag in bytes (128 bits).
pub const TAG_LENGTH: usize = 16;

/// Maximum plaintext size for a single encrypt call (256 MiB).
///
/// A sanity limit to catch accidental misuse; medical files should be
/// chunked long before they approach this size.
#[allow(dead_code)]
const MAX_PLAINTEXT_LENGTH: usize = 256 * 1024 * 1024;

// ============================================================================
// EncryptionKey
// ============================================================================

/// An AES-256-GCM encryption key (256 bits).
///
/// This is secret key material that must be protected. Use
/// [`EncryptionKey::generate`] to create a new random key, or
/// [`EncryptionKey::from_bytes`] to restore from secure storage.
///
/// Key material is securely zeroed from memory when dropped via
/// [`ZeroizeOnDrop`].
///
/// # Security
///
/// - Never log or expose the key bytes
/// - Store wrapped under a master key at rest (see `carta-keys`)
/// - Use one key per record for isolation
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_LENGTH],
}

impl EncryptionKey {
    /// Generates a new random encryption key using the OS CSPRNG.
    ///
    /// # Panics
    ///
    /// Panics if the OS CSPRNG fails (catastrophic system error).
    pub fn generate() -> Self {
        let key: [u8; KEY_LENGTH] = generate_random();

        // Postcondition: CSPRNG produced non-degenerate output
        debug_assert!(key.iter().any(|&b| b != 0), "CSPRNG produced all-zero key");

        Self { key }
    }

    /// Restores an encryption key from its 32-byte representation.
    ///
    /// # Security
    ///
    /// Only use bytes from a previously generated key or a secure KDF.
    pub fn from_bytes(bytes: &[u8; KEY_LENGTH]) -> Self {
        Self { key: *bytes }
    }

    /// Restores a key from a variable-length slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless the slice is exactly
    /// [`KEY_LENGTH`] bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_LENGTH,
                    actual: bytes.len(),
                })?;
        Ok(Self { key })
    }

    /// Returns the raw 32-byte key material.
    ///
    /// # Security
    ///
    /// Handle with care — this is secret key material.
    pub fn to_bytes(&self) -> [u8; KEY_LENGTH] {
        self.key
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material must never reach logs.
        f.write_str("EncryptionKey(..)")
    }
}

// ============================================================================
// Iv
// ============================================================================

/// A 96-bit AES-GCM initialization vector.
///
/// IVs are drawn fresh from the OS CSPRNG for every encryption; they are
/// not secret and travel alongside the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iv {
    bytes: [u8; IV_LENGTH],
}

impl Iv {
    /// Draws a fresh random IV from the OS CSPRNG.
    ///
    /// # Panics
    ///
    /// Panics if the OS CSPRNG fails.
    pub fn random() -> Self {
        Self {
            bytes: generate_random(),
        }
    }

    /// Restores an IV from its 12-byte representation.
    pub fn from_bytes(bytes: [u8; IV_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Returns the raw 12-byte IV.
    pub fn to_bytes(&self) -> [u8; IV_LENGTH] {
        self.bytes
    }
}

// ============================================================================
// CipherSuite / EncryptedPayload
// ============================================================================

/// Cipher suite identifier recorded with every payload.
///
/// Recorded so stored ciphertexts remain decryptable across a future
/// algorithm migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherSuite {
    /// AES-256-GCM (FIPS 197 approved AEAD).
    Aes256Gcm,
}

impl CipherSuite {
    /// Wire/storage name of the suite.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-256-gcm",
        }
    }
}

/// An encrypted payload: ciphertext plus the parameters needed to decrypt it.
///
/// The `ciphertext` field carries the 16-byte GCM authentication tag
/// appended, so its length is `plaintext.len() + TAG_LENGTH`.
///
/// ```text
/// Ciphertext layout:
/// ┌────────────────────────────┬──────────────────┐
/// │  encrypted data            │  auth tag        │
/// │  [0..plaintext.len()]      │  [last 16 bytes] │
/// └────────────────────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Cipher suite used to produce this payload.
    pub algorithm: CipherSuite,
    /// Identifier of the key that encrypted this payload.
    pub key_id: KeyId,
    /// The IV used for this payload.
    pub iv: Iv,
    /// Ciphertext with authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Length of the ciphertext including the authentication tag.
    pub fn len(&self) -> usize {
        self.ciphertext.len()
    }

    /// True if the payload is empty (which would be invalid — even an empty
    /// plaintext produces a 16-byte tag).
    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }

    /// Serializes the payload to a storage blob.
    ///
    /// Format: `[suite:u8][iv:12B][ciphertext+tag]`. The key ID is not
    /// embedded — it is persisted by the key custodian, keyed by record.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + IV_LENGTH + self.ciphertext.len());
        buf.push(match self.algorithm {
            CipherSuite::Aes256Gcm => 1u8,
        });
        buf.extend_from_slice(&self.iv.to_bytes());
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    /// Restores a payload from a storage blob.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedPayload`] if the blob is truncated or
    /// names an unknown suite.
    pub fn from_blob(blob: &[u8], key_id: KeyId) -> Result<Self, CryptoError> {
        if blob.len() < 1 + IV_LENGTH + TAG_LENGTH {
            return Err(CryptoError::MalformedPayload("blob too short"));
        }
        let algorithm = match blob[0] {
            1 => CipherSuite::Aes256Gcm,
            _ => return Err(CryptoError::MalformedPayload("unknown cipher suite")),
        };
        let iv_bytes: [u8; IV_LENGTH] = blob[1..1 + IV_LENGTH]
            .try_into()
            .expect("slice length checked above");

        Ok(Self {
            algorithm,
            key_id,
            iv: Iv::from_bytes(iv_bytes),
            ciphertext: blob[1 + IV_LENGTH..].to_vec(),
        })
    }
}

// ============================================================================
// Encrypt / Decrypt
// ============================================================================

/// Encrypts plaintext using AES-256-GCM with a fresh random IV.
///
/// Returns an [`EncryptedPayload`] containing the IV and the ciphertext
/// with a 16-byte authentication tag appended.
///
/// # Panics
///
/// Debug builds panic if `plaintext` exceeds the 256 MiB sanity limit.
pub fn encrypt(key: &EncryptionKey, key_id: KeyId, plaintext: &[u8]) -> EncryptedPayload {
    // Precondition: plaintext length is reasonable
    debug_assert!(
        plaintext.len() <= MAX_PLAINTEXT_LENGTH,
        "plaintext exceeds {MAX_PLAINTEXT_LENGTH} byte sanity limit"
    );

    let cipher = Aes256Gcm::new_from_slice(&key.key).expect("KEY_LENGTH is always valid");
    let iv = Iv::random();
    let nonce = iv.to_bytes().into();

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .expect("AES-GCM encryption cannot fail with valid inputs");

    // Postcondition: ciphertext is plaintext + tag
    debug_assert_eq!(
        ciphertext.len(),
        plaintext.len() + TAG_LENGTH,
        "ciphertext length mismatch"
    );

    EncryptedPayload {
        algorithm: CipherSuite::Aes256Gcm,
        key_id,
        iv,
        ciphertext,
    }
}

/// Decrypts an [`EncryptedPayload`] using AES-256-GCM.
///
/// Verifies the authentication tag and returns the original plaintext.
///
/// # Errors
///
/// Returns [`CryptoError::Integrity`] if:
/// - The key is incorrect
/// - The ciphertext or IV has been tampered with
/// - The authentication tag is invalid
pub fn decrypt(key: &EncryptionKey, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError> {
    if payload.ciphertext.len() < TAG_LENGTH {
        return Err(CryptoError::MalformedPayload("ciphertext shorter than tag"));
    }

    let cipher = Aes256Gcm::new_from_slice(&key.key).expect("KEY_LENGTH is always valid");
    let nonce = payload.iv.to_bytes().into();

    cipher
        .decrypt(&nonce, payload.ciphertext.as_slice())
        .map_err(|_| CryptoError::Integrity)
}

// ============================================================================
// Internal Helpers
// ============================================================================

/// Fills a buffer with cryptographically secure random bytes.
///
/// # Panics
///
/// Panics if the OS CSPRNG fails. This indicates a catastrophic system
/// error (e.g. /dev/urandom unavailable) and cannot be meaningfully
/// recovered from.
fn generate_random<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    getrandom::fill(&mut bytes).expect("CSPRNG failure");
    bytes
}

// ============================================================================
// Tests
// ============================================================================
