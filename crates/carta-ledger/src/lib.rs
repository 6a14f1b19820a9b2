//! # carta-ledger: Distributed ledger client for `Carta`
//!
//! A long-lived, shared client for the ledger program that anchors record
//! creation and access events. The client owns connection-state tracking and
//! bounded retry; every public call returns an outcome value rather than an
//! error, so a flaky ledger degrades the caller instead of failing it.
//!
//! ```text
//! Disconnected ──initialize()──▶ Connecting ──diagnostic ok──▶ Connected
//!       ▲                                                        │
//!       └───────────── retries exhausted ◀── call failure ───────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`wire`] | Framed request/response codec (magic, version, CRC32) |
//! | [`transport`] | Async transport trait + TCP implementation |
//! | [`retry`] | Pure, stateless retry policy |
//! | [`client`] | State machine, outcomes, and domain wrappers |

pub mod client;
pub mod error;
pub mod retry;
pub mod transport;
pub mod wire;

pub use client::{
    ConnectionState, ConnectionStatus, InitOutcome, LedgerClient, LedgerClientConfig, RecordLedger,
    TxOutcome,
};
pub use error::{LedgerError, LedgerResult};
pub use retry::{Backoff, RetryPolicy};
pub use transport::{LedgerTransport, TcpTransport};
