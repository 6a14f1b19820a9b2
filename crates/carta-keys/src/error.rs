//! Error types for key custody.

use carta_types::RecordId;

use carta_crypto::CryptoError;

/// Result type for key custody operations.
pub type KeyResult<T> = Result<T, KeyError>;

/// Errors that can occur during key custody operations.
#[derive(thiserror::Error, Debug)]
pub enum KeyError {
    /// No data key is stored for the record.
    #[error("no data key stored for {0}")]
    NotFound(RecordId),

    /// A data key already exists for the record; overwrites are rejected
    /// outside explicit rotation.
    #[error("data key already exists for {0}; use rotation to replace it")]
    AlreadyExists(RecordId),

    /// Unwrapping or wrapping the key failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The backing key store failed.
    #[error("key store failure: {0}")]
    Store(String),
}
