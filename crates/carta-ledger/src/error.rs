//! Error types for ledger communication.
//!
//! These errors flow between the transport and the client; the client's
//! public surface converts them into outcome values (see
//! [`crate::client::TxOutcome`]) rather than propagating them.

use thiserror::Error;

/// Result type for transport-level ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur while talking to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Connection-level I/O failure.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The call did not complete within the configured timeout.
    #[error("ledger call timed out")]
    Timeout,

    /// A frame failed validation (bad magic, version, checksum, or size).
    #[error("wire protocol error: {0}")]
    Wire(String),

    /// The ledger rejected the function name as unknown.
    ///
    /// Distinguished from [`LedgerError::Rejected`] because the client
    /// retries once against a known-compatible alternate name.
    #[error("ledger function not found: {0}")]
    FunctionNotFound(String),

    /// The ledger evaluated the call and rejected it.
    #[error("ledger rejected call: {0}")]
    Rejected(String),

    /// No connection is established.
    #[error("not connected to ledger")]
    NotConnected,
}
