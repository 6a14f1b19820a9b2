//! The record orchestrator.
//!
//! Sequences the crypto engine, key custodian, content store, version
//! chain, and ledger through each record operation, applying the
//! partial-failure policy: the database row is the single source of truth,
//! storage and ledger linkage are eventual. Creation degrades instead of
//! aborting; downloads and access checks fail hard and fail closed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use carta_blobstore::ContentStoreClient;
use carta_chain::create_version_info;
use carta_crypto::content_hash;
use carta_keys::{KeyCustodian, KeyError};
use carta_ledger::RecordLedger;
use carta_types::{Cid, PermissionType, RecordId, TxId, UserId};

use crate::access::AccessPolicy;
use crate::db::RecordDatabase;
use crate::error::{CoreError, CoreResult};
use crate::indexer::{IndexDocument, SearchIndexer};
use crate::input::{CreateRecordInput, NormalizedCreate};
use crate::model::{AccessGrant, MedicalRecord, RecordVersion, StoredBlobRef};

// ============================================================================
// Constants
// ============================================================================

/// Size of freshly issued per-record data keys (AES-256).
const DATA_KEY_BYTES: usize = 32;

// ============================================================================
// CancelToken
// ============================================================================

/// Cooperative cancellation for the creation pipeline.
///
/// Checked at the entry of each stage; a stage already running completes —
/// its side effect (an upload, a ledger submit) is not transactionally
/// revocable.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of record creation.
///
/// Creation "succeeds" whenever the authoritative row exists; the message
/// names any linkage still pending.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub record_id: RecordId,
    /// Ledger anchor; `None` means ledger pending.
    pub tx_id: Option<TxId>,
    /// Content address; `None` means storage pending.
    pub cid: Option<Cid>,
    pub message: String,
}

/// Result of appending a new version.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub record_id: RecordId,
    pub version: u32,
    pub cid: Cid,
    /// Ledger anchor for the update; `None` means mirror pending.
    pub tx_id: Option<TxId>,
}

/// Metadata-only view of a record. No content is fetched.
#[derive(Debug, Clone)]
pub struct RecordMetadata {
    pub record: MedicalRecord,
    /// Highest stored version, if any content exists.
    pub latest_version: Option<u32>,
    /// Hex of the current version-chain root.
    pub version_root: Option<String>,
    /// True while no content is stored for the record.
    pub storage_pending: bool,
}

// ============================================================================
// RecordOrchestrator
// ============================================================================

/// The façade the rest of the system calls.
pub struct RecordOrchestrator {
    db: Arc<dyn RecordDatabase>,
    custodian: Arc<KeyCustodian>,
    content: Arc<ContentStoreClient>,
    ledger: Arc<dyn RecordLedger>,
    indexer: Arc<dyn SearchIndexer>,
    access: AccessPolicy,
}

impl RecordOrchestrator {
    /// Wires the orchestrator with the standard access chain
    /// (ledger first, database fallback).
    pub fn new(
        db: Arc<dyn RecordDatabase>,
        custodian: Arc<KeyCustodian>,
        content: Arc<ContentStoreClient>,
        ledger: Arc<dyn RecordLedger>,
        indexer: Arc<dyn SearchIndexer>,
    ) -> Self {
        let access = AccessPolicy::standard(ledger.clone(), db.clone());
        Self {
            db,
            custodian,
            content,
            ledger,
            indexer,
            access,
        }
    }

    /// Replaces the access policy (tests, custom strategy chains).
    pub fn with_access_policy(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    // ------------------------------------------------------------------
    // Creation pipeline
    // ------------------------------------------------------------------

    /// Creates a record through the staged pipeline.
    ///
    /// Stage failures beyond the stub and key stages degrade the outcome
    /// rather than failing it; the message names pending linkages.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] for malformed input or duplicate IDs
    /// - [`CoreError::Key`] if the data key cannot be issued (the stub row
    ///   exists; the record stays retrievable as metadata-only)
    pub async fn create_record(
        &self,
        input: CreateRecordInput,
        creator_id: &UserId,
    ) -> CoreResult<CreateOutcome> {
        self.create_record_with_cancel(input, creator_id, &CancelToken::new())
            .await
    }

    /// [`Self::create_record`] with cooperative cancellation.
    pub async fn create_record_with_cancel(
        &self,
        input: CreateRecordInput,
        creator_id: &UserId,
        cancel: &CancelToken,
    ) -> CoreResult<CreateOutcome> {
        let normalized = input.resolve()?;

        // Stage 1 — Stub. The authoritative row; failure here is fatal.
        let record_id = RecordId::generate();
        let hash = content_hash(&normalized.content);
        self.persist_stub(&record_id, &normalized, creator_id, &hash)?;
        debug!(record = %record_id, "record stub persisted");

        // Stage 2 — Keyed. Without a key there is nothing safe to upload;
        // the stub survives as metadata-only.
        if cancel.is_cancelled() {
            return Ok(self.outcome(record_id, None, None, true));
        }
        let data_key = self.custodian.generate_data_key(DATA_KEY_BYTES);
        self.custodian
            .store_record_data_key(&record_id, &data_key)?;

        // Stage 3 — Stored. Degrades to "storage pending".
        let mut cid = None;
        if !cancel.is_cancelled() {
            match self
                .content
                .upload(
                    normalized.content.clone(),
                    &normalized.file_name,
                    &normalized.mime_type,
                    data_key.as_bytes(),
                )
                .await
            {
                Ok(receipt) => {
                    self.record_blob_ref(&record_id, &normalized, &receipt.cid, receipt.size);
                    cid = Some(receipt.cid);
                }
                Err(e) => {
                    warn!(record = %record_id, error = %e, "content upload failed; storage pending");
                }
            }
        }

        // Stage 4 — Chained. Local computation over the stored address.
        if let Some(cid) = &cid {
            self.append_version(&record_id, cid, &hash, creator_id);
        }

        // Stage 5 — Anchored. Degrades to "ledger pending"; a record
        // without a stored address has nothing to anchor yet.
        let mut tx_id = None;
        if let (Some(cid), false) = (&cid, cancel.is_cancelled()) {
            let outcome = self
                .ledger
                .create_record(&record_id, &normalized.patient_id, creator_id, cid, &hash)
                .await;
            if outcome.success {
                tx_id = outcome.tx_id();
                if let Some(tx) = &tx_id {
                    if let Err(e) = self.db.set_record_ledger_tx(&record_id, tx) {
                        warn!(record = %record_id, error = %e, "failed to persist ledger anchor");
                    }
                }
            } else {
                warn!(
                    record = %record_id,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "ledger anchoring failed; ledger pending"
                );
            }
        }

        // Stage 6 — Indexed. Fire-and-forget.
        if !cancel.is_cancelled() {
            self.index_record(&record_id, &normalized, &hash);
        }

        info!(
            record = %record_id,
            stored = cid.is_some(),
            anchored = tx_id.is_some(),
            "record created"
        );
        Ok(self.outcome(record_id, tx_id, cid, cancel.is_cancelled()))
    }

    fn persist_stub(
        &self,
        record_id: &RecordId,
        normalized: &NormalizedCreate,
        creator_id: &UserId,
        hash: &str,
    ) -> CoreResult<()> {
        let now = Utc::now();
        self.db.insert_record(MedicalRecord {
            record_id: record_id.clone(),
            patient_id: normalized.patient_id.clone(),
            creator_id: creator_id.clone(),
            title: normalized.title.clone(),
            file_name: normalized.file_name.clone(),
            file_kind: normalized.file_kind,
            file_size: normalized.content.len() as u64,
            content_hash: hash.to_string(),
            ledger_tx: None,
            created_at: now,
            updated_at: now,
        })?;

        // A creator who is not the patient gets an explicit write grant,
        // matching the ledger program's initial access list.
        if creator_id != &normalized.patient_id {
            self.db.upsert_grant(AccessGrant::new(
                record_id.clone(),
                creator_id.clone(),
                PermissionType::Write,
                normalized.patient_id.clone(),
                None,
            ))?;
        }
        Ok(())
    }

    fn record_blob_ref(
        &self,
        record_id: &RecordId,
        normalized: &NormalizedCreate,
        cid: &Cid,
        ciphertext_size: u64,
    ) {
        let blob_ref = StoredBlobRef {
            content_address: cid.clone(),
            record_id: record_id.clone(),
            version: 1,
            chunk_index: None,
            file_name: normalized.file_name.clone(),
            mime_type: normalized.mime_type.clone(),
            file_size: normalized.content.len() as u64,
            ciphertext_size,
            encryption_algorithm: "aes-256-gcm".to_string(),
            key_id: carta_types::KeyId::new(record_id.as_str()),
            created_at: Utc::now(),
        };

        if let Err(e) = self.db.insert_blob_ref(blob_ref) {
            warn!(record = %record_id, error = %e, "failed to persist blob reference");
        }
        if let Err(e) = self.custodian.register_cid_for_record(record_id, cid) {
            warn!(record = %record_id, error = %e, "failed to register cid in side index");
        }
    }

    fn append_version(&self, record_id: &RecordId, cid: &Cid, hash: &str, creator: &UserId) {
        let prior = match self.db.versions_for_record(record_id) {
            Ok(versions) => versions.into_iter().map(|v| v.entry).collect::<Vec<_>>(),
            Err(e) => {
                warn!(record = %record_id, error = %e, "failed to load prior versions");
                return;
            }
        };

        let entry = create_version_info(&prior, cid.clone(), hash.to_string(), creator.clone());
        if let Err(e) = self.db.insert_version(RecordVersion {
            record_id: record_id.clone(),
            entry,
        }) {
            warn!(record = %record_id, error = %e, "failed to persist version entry");
        }
    }

    fn index_record(&self, record_id: &RecordId, normalized: &NormalizedCreate, hash: &str) {
        let document = IndexDocument {
            id: record_id.to_string(),
            title: normalized.title.clone(),
            content: normalized.title.clone(),
            doc_type: normalized.file_kind.to_string(),
            metadata: HashMap::from([
                ("patientId".to_string(), normalized.patient_id.to_string()),
                ("fileName".to_string(), normalized.file_name.clone()),
                ("contentHash".to_string(), hash.to_string()),
            ]),
        };

        let indexer = self.indexer.clone();
        let record_id = record_id.clone();
        tokio::spawn(async move {
            if let Err(e) = indexer.index(document).await {
                warn!(record = %record_id, error = %e, "search indexing failed");
            }
        });
    }

    fn outcome(
        &self,
        record_id: RecordId,
        tx_id: Option<TxId>,
        cid: Option<Cid>,
        cancelled: bool,
    ) -> CreateOutcome {
        let message = match (&cid, &tx_id, cancelled) {
            (Some(_), Some(_), false) => "record created".to_string(),
            (Some(_), None, false) => "record created; ledger pending".to_string(),
            (None, _, false) => "record created; storage and ledger pending".to_string(),
            (_, _, true) => "record creation cancelled; linkage pending".to_string(),
        };
        CreateOutcome {
            record_id,
            tx_id,
            cid,
            message,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Checks whether `user_id` may read `record_id`.
    ///
    /// Prefers the ledger's view and falls back to the database; any error
    /// during the check denies (fail-closed). Idempotent and
    /// side-effect-free.
    pub async fn check_access(&self, record_id: &RecordId, user_id: &UserId) -> bool {
        self.access.evaluate(record_id, user_id).await
    }

    /// Downloads and decrypts the record's current content.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AccessDenied`] if the check denies or fails closed
    /// - [`CoreError::NotFound`] if the record or its content is absent
    /// - [`CoreError::Integrity`] if decryption detects tampering
    /// - [`CoreError::Storage`] if the content store fails
    pub async fn download_record(&self, record_id: &RecordId, user_id: &UserId) -> CoreResult<Bytes> {
        if !self.access.evaluate(record_id, user_id).await {
            return Err(CoreError::AccessDenied {
                resource: record_id.to_string(),
                user: user_id.clone(),
            });
        }

        self.db
            .record(record_id)?
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;

        let blob_ref = self
            .db
            .active_blob_ref(record_id)?
            .ok_or_else(|| CoreError::NotFound(format!("content pending for {record_id}")))?;

        // Primary path: the record's own data key. Degraded path: the
        // default key scheme, only when key resolution fails.
        match self.custodian.load_record_data_key(record_id) {
            Ok(data_key) => self
                .content
                .download_with_key(&blob_ref.content_address, data_key.as_bytes())
                .await
                .map_err(|e| CoreError::from_blob(record_id, e)),
            Err(KeyError::NotFound(_)) => {
                warn!(record = %record_id, "record key missing; falling back to default key scheme");
                self.content
                    .download_default(&blob_ref.content_address)
                    .await
                    .map_err(|e| CoreError::from_blob(record_id, e))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns a metadata-only view, gated by the same access check as
    /// downloads.
    pub async fn record_metadata(
        &self,
        record_id: &RecordId,
        user_id: &UserId,
    ) -> CoreResult<RecordMetadata> {
        if !self.access.evaluate(record_id, user_id).await {
            return Err(CoreError::AccessDenied {
                resource: record_id.to_string(),
                user: user_id.clone(),
            });
        }

        let record = self
            .db
            .record(record_id)?
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;

        let versions = self.db.versions_for_record(record_id)?;
        let latest = versions.last();
        let storage_pending = self.db.active_blob_ref(record_id)?.is_none();

        Ok(RecordMetadata {
            latest_version: latest.map(|v| v.entry.version),
            version_root: latest.map(|v| v.entry.root.to_hex()),
            storage_pending,
            record,
        })
    }

    /// Lists records for a patient. Patients may list only their own.
    pub fn list_records_for_patient(
        &self,
        patient_id: &UserId,
        requester: &UserId,
    ) -> CoreResult<Vec<MedicalRecord>> {
        if requester != patient_id {
            return Err(CoreError::AccessDenied {
                resource: format!("records of {patient_id}"),
                user: requester.clone(),
            });
        }
        self.db.records_for_patient(patient_id)
    }

    /// Verifies the record's anchored content hash against the ledger.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Integrity`] if the ledger reports a mismatch —
    ///   always surfaced, never swallowed
    /// - [`CoreError::Connection`] if the ledger cannot answer
    pub async fn verify_record(&self, record_id: &RecordId) -> CoreResult<()> {
        let record = self
            .db
            .record(record_id)?
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;

        let outcome = self
            .ledger
            .verify_record(record_id, &record.content_hash)
            .await;
        if !outcome.success {
            return Err(CoreError::Connection(
                outcome
                    .error
                    .unwrap_or_else(|| "ledger unavailable".to_string()),
            ));
        }

        match outcome.as_bool() {
            Some(true) => Ok(()),
            Some(false) => {
                error!(record = %record_id, "ledger verification mismatch");
                Err(CoreError::Integrity {
                    record: record_id.clone(),
                })
            }
            None => Err(CoreError::Connection(
                "ledger returned non-boolean verdict".to_string(),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Access lifecycle
    // ------------------------------------------------------------------

    /// Grants `grantee_id` access at `permission` level.
    ///
    /// The database write is authoritative; the ledger mirror is eventual
    /// and its failure is logged, not propagated.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the record does not exist
    /// - [`CoreError::AccessDenied`] if `grantor_id` is not an owner
    /// - [`CoreError::Validation`] for an expiry in the past
    pub async fn grant_access(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
        permission: PermissionType,
        expires_at: Option<chrono::DateTime<Utc>>,
        grantor_id: &UserId,
    ) -> CoreResult<AccessGrant> {
        let record = self
            .db
            .record(record_id)?
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;
        if !record.is_owner(grantor_id) {
            return Err(CoreError::AccessDenied {
                resource: record_id.to_string(),
                user: grantor_id.clone(),
            });
        }
        if let Some(expires) = expires_at {
            if expires <= Utc::now() {
                return Err(CoreError::Validation(
                    "expiration time cannot be in the past".to_string(),
                ));
            }
        }

        let grant = AccessGrant::new(
            record_id.clone(),
            grantee_id.clone(),
            permission,
            grantor_id.clone(),
            expires_at,
        );
        self.db.upsert_grant(grant.clone())?;

        let outcome = self
            .ledger
            .grant_access(record_id, grantee_id, permission, expires_at)
            .await;
        if outcome.success {
            if let Some(tx) = outcome.tx_id() {
                if let Err(e) = self.db.set_grant_ledger_tx(record_id, grantee_id, &tx) {
                    warn!(record = %record_id, error = %e, "failed to persist grant anchor");
                }
            }
        } else {
            warn!(
                record = %record_id,
                grantee = %grantee_id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "ledger grant mirror failed; database remains authoritative"
            );
        }

        Ok(grant)
    }

    /// Revokes the grantee's access immediately.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the record or grant does not exist
    /// - [`CoreError::AccessDenied`] if `revoker_id` is not an owner
    pub async fn revoke_access(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
        revoker_id: &UserId,
    ) -> CoreResult<()> {
        let record = self
            .db
            .record(record_id)?
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;
        if !record.is_owner(revoker_id) {
            return Err(CoreError::AccessDenied {
                resource: record_id.to_string(),
                user: revoker_id.clone(),
            });
        }

        if !self.db.deactivate_grant(record_id, grantee_id)? {
            return Err(CoreError::NotFound(format!(
                "grant for {grantee_id} on {record_id}"
            )));
        }

        let outcome = self.ledger.revoke_access(record_id, grantee_id).await;
        if !outcome.success {
            warn!(
                record = %record_id,
                grantee = %grantee_id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "ledger revoke mirror failed; database remains authoritative"
            );
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Appends a new content version to a record.
    ///
    /// The original row's `content_hash` is never mutated — the new hash
    /// lives on the version entry and blob reference.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AccessDenied`] unless `user_id` is an owner or holds
    ///   an effective write grant
    /// - [`CoreError::Key`] if the record key cannot be loaded
    /// - [`CoreError::Storage`] if the upload fails (no version without
    ///   stored content)
    pub async fn update_record(
        &self,
        record_id: &RecordId,
        new_content: Bytes,
        file_name: &str,
        mime_type: &str,
        user_id: &UserId,
    ) -> CoreResult<UpdateOutcome> {
        if new_content.is_empty() {
            return Err(CoreError::Validation("file buffer is empty".to_string()));
        }

        let record = self
            .db
            .record(record_id)?
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;
        if !self.can_write(&record, user_id)? {
            return Err(CoreError::AccessDenied {
                resource: record_id.to_string(),
                user: user_id.clone(),
            });
        }

        let hash = content_hash(&new_content);
        let data_key = self.custodian.load_record_data_key(record_id)?;

        let receipt = self
            .content
            .upload(new_content.clone(), file_name, mime_type, data_key.as_bytes())
            .await
            .map_err(|e| CoreError::from_blob(record_id, e))?;

        let prior: Vec<_> = self
            .db
            .versions_for_record(record_id)?
            .into_iter()
            .map(|v| v.entry)
            .collect();
        let entry = create_version_info(&prior, receipt.cid.clone(), hash.clone(), user_id.clone());
        let version = entry.version;

        self.db.insert_version(RecordVersion {
            record_id: record_id.clone(),
            entry,
        })?;
        self.db.insert_blob_ref(StoredBlobRef {
            content_address: receipt.cid.clone(),
            record_id: record_id.clone(),
            version,
            chunk_index: None,
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            file_size: new_content.len() as u64,
            ciphertext_size: receipt.size,
            encryption_algorithm: "aes-256-gcm".to_string(),
            key_id: carta_types::KeyId::new(record_id.as_str()),
            created_at: Utc::now(),
        })?;

        if let Err(e) = self.custodian.register_cid_for_record(record_id, &receipt.cid) {
            warn!(record = %record_id, error = %e, "failed to register cid in side index");
        }

        let outcome = self
            .ledger
            .update_record(record_id, &hash, &receipt.cid)
            .await;
        let tx_id = if outcome.success {
            outcome.tx_id()
        } else {
            warn!(
                record = %record_id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "ledger update mirror failed"
            );
            None
        };

        info!(record = %record_id, version, "record version appended");
        Ok(UpdateOutcome {
            record_id: record_id.clone(),
            version,
            cid: receipt.cid,
            tx_id,
        })
    }

    /// Local write-permission rule: owner, or an effective grant covering
    /// write. Database errors propagate (and deny at the call site).
    fn can_write(&self, record: &MedicalRecord, user_id: &UserId) -> CoreResult<bool> {
        if record.is_owner(user_id) {
            return Ok(true);
        }
        let grant = self
            .db
            .effective_grant(&record.record_id, user_id, Utc::now())?;
        Ok(grant.map_or(false, |g| g.permission.covers(PermissionType::Write)))
    }
}
