//! Error types for blob storage operations.

use carta_types::Cid;

/// Result type for blob storage operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob storage operations.
#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    /// No blob is stored (or pinned) at the address.
    #[error("no blob stored at {0}")]
    NotFound(Cid),

    /// Decryption failed: the blob was tampered with or the wrong key was
    /// supplied. Always surfaced, never swallowed.
    #[error("integrity failure decrypting blob")]
    Integrity,

    /// The backing store is unreachable or failed.
    #[error("content store failure: {0}")]
    Storage(String),

    /// The supplied data key has the wrong length for the cipher.
    #[error("data key has invalid length: {0} bytes")]
    InvalidKeyLength(usize),
}
