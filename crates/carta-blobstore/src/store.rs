//! The blob store boundary.
//!
//! The store holds opaque ciphertext blobs keyed by content address. It
//! never sees plaintext or key material. Pinning marks a blob as retained;
//! an unpinned address may be garbage-collected by a remote store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use carta_types::Cid;

use crate::cid::cid_for_ciphertext;
use crate::error::{BlobError, BlobResult};

// ============================================================================
// BlobStore
// ============================================================================

/// A content-addressable store for encrypted blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` at `cid`.
    ///
    /// Implementations verify the address against the bytes and reject a
    /// mismatch — the address is a function of the content, not a caller
    /// choice.
    async fn put(&self, cid: &Cid, bytes: Bytes) -> BlobResult<()>;

    /// Fetches the blob at `cid`.
    ///
    /// # Errors
    ///
    /// [`BlobError::NotFound`] if the address is missing.
    async fn get(&self, cid: &Cid) -> BlobResult<Bytes>;

    /// Pins the blob at `cid` so the store retains it.
    ///
    /// # Errors
    ///
    /// [`BlobError::NotFound`] if the address is missing.
    async fn pin(&self, cid: &Cid) -> BlobResult<()>;

    /// True if a blob is stored at `cid`.
    async fn contains(&self, cid: &Cid) -> BlobResult<bool>;
}

// ============================================================================
// MemoryBlobStore
// ============================================================================

#[derive(Default)]
struct MemoryBlobStoreInner {
    blobs: HashMap<Cid, Bytes>,
    pinned: HashSet<Cid>,
}

/// In-memory [`BlobStore`] for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: RwLock<MemoryBlobStoreInner>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `cid` has been pinned.
    pub async fn is_pinned(&self, cid: &Cid) -> bool {
        self.inner.read().await.pinned.contains(cid)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, cid: &Cid, bytes: Bytes) -> BlobResult<()> {
        // Verify address matches content before accepting
        let computed = cid_for_ciphertext(&bytes);
        if computed != *cid {
            return Err(BlobError::Storage(format!(
                "address mismatch: expected {computed}, got {cid}"
            )));
        }

        self.inner.write().await.blobs.insert(cid.clone(), bytes);
        Ok(())
    }

    async fn get(&self, cid: &Cid) -> BlobResult<Bytes> {
        self.inner
            .read()
            .await
            .blobs
            .get(cid)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(cid.clone()))
    }

    async fn pin(&self, cid: &Cid) -> BlobResult<()> {
        let mut inner = self.inner.write().await;

        if !inner.blobs.contains_key(cid) {
            return Err(BlobError::NotFound(cid.clone()));
        }
        inner.pinned.insert(cid.clone());
        Ok(())
    }

    async fn contains(&self, cid: &Cid) -> BlobResult<bool> {
        Ok(self.inner.read().await.blobs.contains_key(cid))
    }
}

// ============================================================================
// Tests
// ============================================================================
