//! # carta-core: Record orchestration for `Carta`
//!
//! The façade over the record integrity and access-control core. The
//! orchestrator sequences the crypto engine, key custodian, content store,
//! version chain, and ledger through record creation, download, and access
//! changes, under one consistency policy: **the database row is the single
//! source of truth; storage and ledger linkage are eventual**.
//!
//! ```text
//! create:  Stub ─▶ Keyed ─▶ Stored ─▶ Chained ─▶ Anchored ─▶ Indexed
//!          fatal    fatal    degrade    local      degrade     forget
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`model`] | Record, blob reference, grant, and version rows |
//! | [`db`] | Authoritative database trait + memory/sled backends |
//! | [`input`] | Tagged creation input resolved once at the boundary |
//! | [`access`] | Ordered access-check strategy chain, fail-closed |
//! | [`indexer`] | Fire-and-forget search collaborator boundary |
//! | [`orchestrator`] | The staged pipelines |

pub mod access;
pub mod db;
pub mod error;
pub mod indexer;
pub mod input;
pub mod model;
pub mod orchestrator;

pub use access::{
    AccessDecision, AccessPolicy, AccessStrategy, AuditSink, DatabaseAccessCheck,
    LedgerAccessCheck, TracingAuditSink,
};
pub use db::{MemoryDatabase, RecordDatabase, SledDatabase};
pub use error::{CoreError, CoreResult};
pub use indexer::{IndexDocument, NullIndexer, SearchIndexer};
pub use input::{CreateRecordInput, NormalizedCreate, RawUploadInput};
pub use model::{AccessGrant, MedicalRecord, RecordVersion, StoredBlobRef};
pub use orchestrator::{
    CancelToken, CreateOutcome, RecordMetadata, RecordOrchestrator, UpdateOutcome,
};
