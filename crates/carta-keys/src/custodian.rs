//! The key custodian: issues, wraps, and recovers per-record data keys.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use zeroize::Zeroizing;

use carta_crypto::{EncryptionKey, decrypt, encrypt, random_bytes};
use carta_types::{Cid, KeyId, RecordId};

use crate::error::{KeyError, KeyResult};
use crate::store::{KeyStore, WrappedDataKey};

// ============================================================================
// DataKey
// ============================================================================

/// A plaintext per-record data key.
///
/// Lives only in memory, zeroed on drop, and never logged; it reaches
/// persistence exclusively in wrapped form.
pub struct DataKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl DataKey {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Returns the raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care — this is secret key material.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length key (invalid; only possible through misuse).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(..)")
    }
}

// ============================================================================
// MasterKeyProvider
// ============================================================================

/// Source of the master (key-encryption) key.
///
/// Behind a trait so deployments can plug in an external KMS without
/// touching the custodian; tests use [`InMemoryMasterKey`].
pub trait MasterKeyProvider: Send + Sync {
    /// Returns the master key used to wrap data keys.
    fn master_key(&self) -> EncryptionKey;

    /// A stable identifier for the master key, recorded on envelopes.
    fn master_key_id(&self) -> KeyId;
}

/// A process-local master key.
pub struct InMemoryMasterKey {
    key: EncryptionKey,
    key_id: KeyId,
}

impl InMemoryMasterKey {
    /// Generates a fresh master key.
    pub fn generate() -> Self {
        Self {
            key: EncryptionKey::generate(),
            key_id: KeyId::generate(),
        }
    }

    /// Restores a master key from its raw bytes.
    pub fn from_bytes(bytes: &[u8; 32], key_id: KeyId) -> Self {
        Self {
            key: EncryptionKey::from_bytes(bytes),
            key_id,
        }
    }
}

impl MasterKeyProvider for InMemoryMasterKey {
    fn master_key(&self) -> EncryptionKey {
        self.key.clone()
    }

    fn master_key_id(&self) -> KeyId {
        self.key_id.clone()
    }
}

// ============================================================================
// KeyCustodian
// ============================================================================

/// Issues and persists per-record data keys, envelope-encrypted under the
/// master key.
pub struct KeyCustodian {
    master: Arc<dyn MasterKeyProvider>,
    store: Arc<dyn KeyStore>,
}

impl KeyCustodian {
    /// Creates a custodian over a master-key provider and a key store.
    pub fn new(master: Arc<dyn MasterKeyProvider>, store: Arc<dyn KeyStore>) -> Self {
        Self { master, store }
    }

    /// Generates a fresh data key of `size_bytes` secure random bytes.
    ///
    /// The key is pure CSPRNG output — never derived from record content.
    pub fn generate_data_key(&self, size_bytes: usize) -> DataKey {
        DataKey::new(random_bytes(size_bytes))
    }

    /// Wraps `data_key` under the master key and persists it for the record.
    ///
    /// # Errors
    ///
    /// [`KeyError::AlreadyExists`] if the record already has a key — plain
    /// overwrites are rejected; use [`Self::rotate_record_data_key`].
    pub fn store_record_data_key(&self, record_id: &RecordId, data_key: &DataKey) -> KeyResult<()> {
        let wrapped = self.wrap(data_key, 1);
        self.store.insert(record_id, wrapped)?;

        debug!(record = %record_id, "stored wrapped data key");
        Ok(())
    }

    /// Unwraps and returns the record's current data key.
    ///
    /// # Errors
    ///
    /// - [`KeyError::NotFound`] if no key is stored
    /// - [`KeyError::Crypto`] if unwrapping fails (wrong master key or a
    ///   tampered envelope)
    pub fn load_record_data_key(&self, record_id: &RecordId) -> KeyResult<DataKey> {
        let wrapped = self.store.current(record_id)?;
        let raw = decrypt(&self.master.master_key(), &wrapped.envelope)?;
        Ok(DataKey::new(raw))
    }

    /// Rotates the record's data key: wraps a fresh key and retires the old
    /// envelope without destroying it.
    ///
    /// Content already uploaded stays decryptable — historical envelopes are
    /// retained in wrapped form and recoverable via the store.
    ///
    /// # Errors
    ///
    /// [`KeyError::NotFound`] if the record has no key to rotate.
    pub fn rotate_record_data_key(&self, record_id: &RecordId) -> KeyResult<DataKey> {
        let old = self.store.current(record_id)?;
        let new_key = self.generate_data_key(old_key_size(&old));
        let wrapped = self.wrap(&new_key, old.generation + 1);

        self.store.push_rotation(record_id, wrapped)?;

        debug!(record = %record_id, generation = old.generation + 1, "rotated data key");
        Ok(new_key)
    }

    /// Unwraps the record's retired data keys, oldest first.
    ///
    /// Ciphertexts produced before a rotation decrypt under one of these.
    ///
    /// # Errors
    ///
    /// [`KeyError::Crypto`] if any retained envelope fails to unwrap.
    pub fn load_retired_data_keys(&self, record_id: &RecordId) -> KeyResult<Vec<DataKey>> {
        let master = self.master.master_key();
        self.store
            .retired(record_id)?
            .iter()
            .map(|wrapped| {
                let raw = decrypt(&master, &wrapped.envelope)?;
                Ok(DataKey::new(raw))
            })
            .collect()
    }

    /// Records a content address for the record in the side index.
    ///
    /// Used for audit and debugging; the blob reference table remains
    /// authoritative.
    pub fn register_cid_for_record(&self, record_id: &RecordId, cid: &Cid) -> KeyResult<()> {
        self.store.register_cid(record_id, cid)
    }

    /// Returns the side-indexed content addresses for a record.
    pub fn cids_for_record(&self, record_id: &RecordId) -> KeyResult<Vec<Cid>> {
        self.store.cids_for_record(record_id)
    }

    fn wrap(&self, data_key: &DataKey, generation: u32) -> WrappedDataKey {
        let envelope = encrypt(
            &self.master.master_key(),
            self.master.master_key_id(),
            data_key.as_bytes(),
        );
        WrappedDataKey {
            envelope,
            created_at: Utc::now(),
            generation,
        }
    }
}

fn old_key_size(wrapped: &WrappedDataKey) -> usize {
    // Ciphertext carries a 16-byte tag; the rest is the key itself.
    wrapped.envelope.len() - carta_crypto::TAG_LENGTH
}

// ============================================================================
// Tests
// ============================================================================
