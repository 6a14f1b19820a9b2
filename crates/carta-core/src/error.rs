//! The core error taxonomy.
//!
//! Propagation policy: creation-pipeline failures beyond the DB-stub stage
//! are recovered locally (logged, degraded outcome returned); access-check
//! failures are fail-closed; integrity failures are always surfaced.

use carta_types::{RecordId, UserId};

use carta_blobstore::BlobError;
use carta_keys::KeyError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the record core.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// Malformed input. Fatal, surfaced immediately.
    #[error("validation failure: {0}")]
    Validation(String),

    /// A record data key is missing or unusable.
    #[error("key failure: {0}")]
    Key(#[from] KeyError),

    /// Tamper evidence: an authentication tag or ledger verification
    /// failed. Always surfaced, never swallowed.
    #[error("integrity failure for {record}")]
    Integrity { record: RecordId },

    /// The ledger is unreachable after bounded retries. Non-fatal for
    /// creation; denying for access checks.
    #[error("ledger connection failure: {0}")]
    Connection(String),

    /// The content store is unreachable or failed. Non-fatal for creation,
    /// fatal for download.
    #[error("content storage failure: {0}")]
    Storage(String),

    /// A record, blob, or grant does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The authoritative database failed.
    #[error("database failure: {0}")]
    Database(String),

    /// The access check denied (or failed closed for) this user.
    #[error("access denied for {user} on {resource}")]
    AccessDenied { resource: String, user: UserId },
}

impl CoreError {
    /// Maps a blob-store error into the core taxonomy for a given record.
    pub(crate) fn from_blob(record: &RecordId, e: BlobError) -> Self {
        match e {
            BlobError::NotFound(cid) => Self::NotFound(format!("content {cid} for {record}")),
            BlobError::Integrity => Self::Integrity {
                record: record.clone(),
            },
            BlobError::Storage(msg) => Self::Storage(msg),
            BlobError::InvalidKeyLength(n) => {
                Self::Validation(format!("data key for {record} has invalid length {n}"))
            }
        }
    }
}
