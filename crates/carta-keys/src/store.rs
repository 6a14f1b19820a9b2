//! Persistence boundary for wrapped data keys.
//!
//! The custodian only ever hands this layer *wrapped* key material; a store
//! implementation never sees a plaintext data key.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carta_crypto::EncryptedPayload;
use carta_types::{Cid, RecordId};

use crate::error::{KeyError, KeyResult};

// ============================================================================
// WrappedDataKey
// ============================================================================

/// A data key envelope-encrypted under the master key, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedDataKey {
    /// The wrapped key bytes with their encryption parameters.
    pub envelope: EncryptedPayload,
    /// When this key was wrapped.
    pub created_at: DateTime<Utc>,
    /// Rotation generation, starting at 1.
    pub generation: u32,
}

// ============================================================================
// KeyStore
// ============================================================================

/// Storage for wrapped data keys and the CID side index.
///
/// Implementations must reject plain overwrites of an existing key — the
/// custodian replaces keys only through [`KeyStore::push_rotation`], which
/// retains the superseded envelope so old ciphertexts stay recoverable.
pub trait KeyStore: Send + Sync {
    /// Persists the first wrapped key for a record.
    ///
    /// # Errors
    ///
    /// [`KeyError::AlreadyExists`] if a key is already stored.
    fn insert(&self, record_id: &RecordId, wrapped: WrappedDataKey) -> KeyResult<()>;

    /// Returns the current wrapped key for a record.
    ///
    /// # Errors
    ///
    /// [`KeyError::NotFound`] if absent.
    fn current(&self, record_id: &RecordId) -> KeyResult<WrappedDataKey>;

    /// Replaces the current key, retaining the superseded envelope.
    ///
    /// # Errors
    ///
    /// [`KeyError::NotFound`] if no key exists to rotate.
    fn push_rotation(&self, record_id: &RecordId, wrapped: WrappedDataKey) -> KeyResult<()>;

    /// Returns retained (superseded) envelopes, oldest first.
    fn retired(&self, record_id: &RecordId) -> KeyResult<Vec<WrappedDataKey>>;

    /// Records a content address for a record in the side index.
    fn register_cid(&self, record_id: &RecordId, cid: &Cid) -> KeyResult<()>;

    /// Returns the side-indexed content addresses for a record, in
    /// registration order. Non-authoritative — the blob reference table is
    /// the source of truth.
    fn cids_for_record(&self, record_id: &RecordId) -> KeyResult<Vec<Cid>>;
}

// ============================================================================
// MemoryKeyStore
// ============================================================================

#[derive(Default)]
struct MemoryKeyStoreInner {
    current: HashMap<RecordId, WrappedDataKey>,
    retired: HashMap<RecordId, Vec<WrappedDataKey>>,
    cid_index: HashMap<RecordId, Vec<Cid>>,
}

/// In-memory [`KeyStore`] for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryKeyStore {
    inner: RwLock<MemoryKeyStoreInner>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn insert(&self, record_id: &RecordId, wrapped: WrappedDataKey) -> KeyResult<()> {
        let mut inner = self.inner.write().expect("key store lock poisoned");

        if inner.current.contains_key(record_id) {
            return Err(KeyError::AlreadyExists(record_id.clone()));
        }
        inner.current.insert(record_id.clone(), wrapped);
        Ok(())
    }

    fn current(&self, record_id: &RecordId) -> KeyResult<WrappedDataKey> {
        self.inner
            .read()
            .expect("key store lock poisoned")
            .current
            .get(record_id)
            .cloned()
            .ok_or_else(|| KeyError::NotFound(record_id.clone()))
    }

    fn push_rotation(&self, record_id: &RecordId, wrapped: WrappedDataKey) -> KeyResult<()> {
        let mut inner = self.inner.write().expect("key store lock poisoned");

        let old = inner
            .current
            .remove(record_id)
            .ok_or_else(|| KeyError::NotFound(record_id.clone()))?;
        inner.retired.entry(record_id.clone()).or_default().push(old);
        inner.current.insert(record_id.clone(), wrapped);
        Ok(())
    }

    fn retired(&self, record_id: &RecordId) -> KeyResult<Vec<WrappedDataKey>> {
        Ok(self
            .inner
            .read()
            .expect("key store lock poisoned")
            .retired
            .get(record_id)
            .cloned()
            .unwrap_or_default())
    }

    fn register_cid(&self, record_id: &RecordId, cid: &Cid) -> KeyResult<()> {
        self.inner
            .write()
            .expect("key store lock poisoned")
            .cid_index
            .entry(record_id.clone())
            .or_default()
            .push(cid.clone());
        Ok(())
    }

    fn cids_for_record(&self, record_id: &RecordId) -> KeyResult<Vec<Cid>> {
        Ok(self
            .inner
            .read()
            .expect("key store lock poisoned")
            .cid_index
            .get(record_id)
            .cloned()
            .unwrap_or_default())
    }
}
