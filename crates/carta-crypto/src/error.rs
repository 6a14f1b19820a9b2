//! Error types for cryptographic operations.

use carta_types::KeyId;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations.
#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    /// Authentication tag verification failed: the ciphertext was tampered
    /// with or the wrong key was supplied. This is the tamper-detection
    /// contract the rest of the system relies on — never swallow it.
    #[error("integrity failure: authentication tag did not verify")]
    Integrity,

    /// No key material registered under the given key ID.
    #[error("unknown key: {0}")]
    UnknownKey(KeyId),

    /// Key material had the wrong length for the cipher suite.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Serialized payload could not be parsed.
    #[error("malformed encrypted payload: {0}")]
    MalformedPayload(&'static str),

    /// Signature verification failed.
    #[error(transparent)]
    Signature(#[from] ed25519_dalek::SignatureError),
}
