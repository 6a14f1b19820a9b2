//! The search-indexer collaborator boundary.
//!
//! Indexing is fire-and-forget: the orchestrator hands a document off after
//! creation and never blocks a response on it. Failures are logged, not
//! propagated.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CoreResult;

// ============================================================================
// IndexDocument
// ============================================================================

/// The shape handed to the search collaborator after creation.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    pub doc_type: String,
    pub metadata: HashMap<String, String>,
}

// ============================================================================
// SearchIndexer
// ============================================================================

/// The external search collaborator.
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    /// Submits a document for indexing. No response contract is required
    /// by the core.
    async fn index(&self, document: IndexDocument) -> CoreResult<()>;
}

/// Indexer that drops documents, logging at debug.
///
/// The default for deployments without a search collaborator.
#[derive(Default)]
pub struct NullIndexer;

#[async_trait]
impl SearchIndexer for NullIndexer {
    async fn index(&self, document: IndexDocument) -> CoreResult<()> {
        debug!(id = %document.id, "search indexing disabled; dropping document");
        Ok(())
    }
}
