//! Encrypt-then-upload client for the content store.
//!
//! The client owns the crypto step on both directions: content is encrypted
//! with the record's data key before upload, and decrypted after fetch. The
//! store itself only ever holds ciphertext.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use carta_crypto::{EncryptedPayload, EncryptionKey, decrypt, encrypt};
use carta_types::{Cid, KeyId};

use crate::cid::cid_for_ciphertext;
use crate::error::{BlobError, BlobResult};
use crate::store::BlobStore;

// ============================================================================
// Constants
// ============================================================================

/// Payloads at or above this size are encrypted on the blocking thread pool
/// so CPU-bound crypto does not stall the async executor.
const OFFLOAD_THRESHOLD: usize = 256 * 1024;

// ============================================================================
// UploadReceipt
// ============================================================================

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Content address of the stored ciphertext.
    pub cid: Cid,
    /// Ciphertext size in bytes (plaintext + cipher overhead).
    pub size: u64,
}

// ============================================================================
// ContentStoreClient
// ============================================================================

/// Uploads and downloads encrypted blobs against a [`BlobStore`].
pub struct ContentStoreClient {
    store: Arc<dyn BlobStore>,
    default_key: EncryptionKey,
}

impl ContentStoreClient {
    /// Creates a client with a freshly generated default key.
    ///
    /// The default key backs only the degraded [`Self::download_default`]
    /// path; deployments that need the degraded path across restarts use
    /// [`Self::with_default_key`].
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            default_key: EncryptionKey::generate(),
        }
    }

    /// Creates a client with an explicit default key.
    pub fn with_default_key(store: Arc<dyn BlobStore>, default_key: EncryptionKey) -> Self {
        Self { store, default_key }
    }

    /// Encrypts `plaintext` with `data_key`, uploads and pins the
    /// ciphertext, and returns its content address and size.
    ///
    /// The address is a deterministic function of the ciphertext bytes, so
    /// storing identical ciphertext twice lands at the same address.
    ///
    /// # Errors
    ///
    /// - [`BlobError::InvalidKeyLength`] if `data_key` is not a valid key
    /// - [`BlobError::Storage`] / [`BlobError::NotFound`] from the store
    pub async fn upload(
        &self,
        plaintext: Bytes,
        file_name: &str,
        mime_type: &str,
        data_key: &[u8],
    ) -> BlobResult<UploadReceipt> {
        let key = EncryptionKey::try_from_slice(data_key)
            .map_err(|_| BlobError::InvalidKeyLength(data_key.len()))?;

        let blob = encrypt_blob(key, plaintext).await;
        let cid = cid_for_ciphertext(&blob);
        let size = blob.len() as u64;

        self.store.put(&cid, blob).await?;
        self.store.pin(&cid).await?;

        debug!(%cid, size, file_name, mime_type, "uploaded encrypted blob");

        Ok(UploadReceipt { cid, size })
    }

    /// Fetches the blob at `cid` and decrypts it with `data_key`.
    ///
    /// # Errors
    ///
    /// - [`BlobError::NotFound`] if the address is unpinned/missing
    /// - [`BlobError::Integrity`] if the blob was tampered with or the key
    ///   is wrong
    pub async fn download_with_key(&self, cid: &Cid, data_key: &[u8]) -> BlobResult<Bytes> {
        let key = EncryptionKey::try_from_slice(data_key)
            .map_err(|_| BlobError::InvalidKeyLength(data_key.len()))?;

        let blob = self.store.get(cid).await?;
        decrypt_blob(key, blob, cid).await
    }

    /// Fetches the blob at `cid` and decrypts it with the client's default
    /// key.
    ///
    /// This is a degraded, less-secure fallback used only when a per-record
    /// key cannot be resolved; it is flagged in logs so telemetry can
    /// distinguish it from the primary path.
    ///
    /// # Errors
    ///
    /// Same as [`Self::download_with_key`].
    pub async fn download_default(&self, cid: &Cid) -> BlobResult<Bytes> {
        warn!(%cid, degraded = true, "downloading with default key scheme");

        let blob = self.store.get(cid).await?;
        decrypt_blob(self.default_key.clone(), blob, cid).await
    }

    /// Encrypts `plaintext` under the client's default key and uploads it.
    ///
    /// Counterpart of [`Self::download_default`]; exists for content stored
    /// before per-record keys were provisioned.
    pub async fn upload_default(
        &self,
        plaintext: Bytes,
        file_name: &str,
        mime_type: &str,
    ) -> BlobResult<UploadReceipt> {
        warn!(file_name, degraded = true, "uploading with default key scheme");

        let key_bytes = self.default_key.to_bytes();
        self.upload(plaintext, file_name, mime_type, &key_bytes).await
    }
}

// ============================================================================
// Crypto offload
// ============================================================================

/// Key identifier recorded on payloads reconstructed from a fetched blob.
///
/// Custody of the real key ID lives with the key custodian; the address is
/// enough to correlate a payload in logs.
fn blob_key_id(cid: &Cid) -> KeyId {
    KeyId::new(cid.as_str())
}

async fn encrypt_blob(key: EncryptionKey, plaintext: Bytes) -> Bytes {
    if plaintext.len() >= OFFLOAD_THRESHOLD {
        tokio::task::spawn_blocking(move || {
            let payload = encrypt(&key, KeyId::new("pending"), &plaintext);
            Bytes::from(payload.to_blob())
        })
        .await
        .expect("encryption task panicked")
    } else {
        let payload = encrypt(&key, KeyId::new("pending"), &plaintext);
        Bytes::from(payload.to_blob())
    }
}

async fn decrypt_blob(key: EncryptionKey, blob: Bytes, cid: &Cid) -> BlobResult<Bytes> {
    let key_id = blob_key_id(cid);
    let blob_len = blob.len();

    let decode = move || -> BlobResult<Bytes> {
        let payload = EncryptedPayload::from_blob(&blob, key_id)
            .map_err(|_| BlobError::Integrity)?;
        let plaintext = decrypt(&key, &payload).map_err(|_| BlobError::Integrity)?;
        Ok(Bytes::from(plaintext))
    };

    if blob_len >= OFFLOAD_THRESHOLD {
        tokio::task::spawn_blocking(decode)
            .await
            .expect("decryption task panicked")
    } else {
        decode()
    }
}

// ============================================================================
// Tests
// ============================================================================
