//! Integration tests for the record orchestrator.
//!
//! These drive the full pipeline over in-memory backends and a scripted
//! ledger, exercising the degraded-mode policy, the access lifecycle, and
//! the end-to-end creation scenario.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};

use carta_blobstore::{BlobError, BlobStore, ContentStoreClient, MemoryBlobStore};
use carta_core::{
    AccessGrant, CoreError, CreateRecordInput, MemoryDatabase, NullIndexer, RawUploadInput,
    RecordDatabase, RecordOrchestrator, SledDatabase,
};
use carta_keys::{InMemoryMasterKey, KeyCustodian, MemoryKeyStore};
use carta_ledger::{RecordLedger, TxOutcome};
use carta_types::{Cid, PermissionType, RecordId, UserId};

// ============================================================================
// Fakes
// ============================================================================

/// Scripted ledger double.
///
/// `healthy == false` makes every call return a failure outcome, the shape
/// the real client produces after exhausting retries.
struct FakeLedger {
    healthy: Mutex<bool>,
    /// Reply for `check_access`; `None` simulates an unreachable ledger.
    access_reply: Mutex<Option<bool>>,
    /// Reply for `verify_record`.
    verify_reply: Mutex<bool>,
}

impl FakeLedger {
    fn healthy() -> Arc<Self> {
        Arc::new(Self {
            healthy: Mutex::new(true),
            access_reply: Mutex::new(None),
            verify_reply: Mutex::new(true),
        })
    }

    fn down() -> Arc<Self> {
        let ledger = Self::healthy();
        *ledger.healthy.lock().unwrap() = false;
        ledger
    }

    fn outcome(&self, data: serde_json::Value) -> TxOutcome {
        if *self.healthy.lock().unwrap() {
            TxOutcome {
                success: true,
                data: Some(data),
                error: None,
            }
        } else {
            TxOutcome {
                success: false,
                data: None,
                error: Some("ledger unreachable".to_string()),
            }
        }
    }
}

#[async_trait]
impl RecordLedger for FakeLedger {
    async fn create_record(
        &self,
        record_id: &RecordId,
        _patient_id: &UserId,
        _creator_id: &UserId,
        _payload_cid: &Cid,
        _content_hash: &str,
    ) -> TxOutcome {
        self.outcome(serde_json::json!({"txId": format!("tx-{record_id}")}))
    }

    async fn read_record(&self, record_id: &RecordId) -> TxOutcome {
        self.outcome(serde_json::json!({"recordId": record_id.as_str()}))
    }

    async fn update_record(
        &self,
        record_id: &RecordId,
        _new_content_hash: &str,
        _new_cid: &Cid,
    ) -> TxOutcome {
        self.outcome(serde_json::json!({"txId": format!("tx-update-{record_id}")}))
    }

    async fn grant_access(
        &self,
        record_id: &RecordId,
        _grantee_id: &UserId,
        _permission: PermissionType,
        _expires_at: Option<chrono::DateTime<Utc>>,
    ) -> TxOutcome {
        self.outcome(serde_json::json!({"txId": format!("tx-grant-{record_id}")}))
    }

    async fn revoke_access(&self, record_id: &RecordId, _grantee_id: &UserId) -> TxOutcome {
        self.outcome(serde_json::json!({"txId": format!("tx-revoke-{record_id}")}))
    }

    async fn check_access(&self, _record_id: &RecordId, _user_id: &UserId) -> TxOutcome {
        match *self.access_reply.lock().unwrap() {
            Some(verdict) => self.outcome(serde_json::json!(verdict)),
            None => TxOutcome {
                success: false,
                data: None,
                error: Some("ledger unreachable".to_string()),
            },
        }
    }

    async fn verify_record(&self, _record_id: &RecordId, _content_hash: &str) -> TxOutcome {
        let verdict = *self.verify_reply.lock().unwrap();
        self.outcome(serde_json::json!(verdict))
    }
}

/// Blob store whose writes always fail, simulating an unreachable content
/// store.
struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, _cid: &Cid, _bytes: Bytes) -> Result<(), BlobError> {
        Err(BlobError::Storage("content store unreachable".to_string()))
    }

    async fn get(&self, cid: &Cid) -> Result<Bytes, BlobError> {
        Err(BlobError::NotFound(cid.clone()))
    }

    async fn pin(&self, cid: &Cid) -> Result<(), BlobError> {
        Err(BlobError::NotFound(cid.clone()))
    }

    async fn contains(&self, _cid: &Cid) -> Result<bool, BlobError> {
        Ok(false)
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    db: Arc<MemoryDatabase>,
    ledger: Arc<FakeLedger>,
    orchestrator: RecordOrchestrator,
}

fn harness_with(ledger: Arc<FakeLedger>, store: Arc<dyn BlobStore>) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let db = Arc::new(MemoryDatabase::new());
    let custodian = Arc::new(KeyCustodian::new(
        Arc::new(InMemoryMasterKey::generate()),
        Arc::new(MemoryKeyStore::new()),
    ));
    let content = Arc::new(ContentStoreClient::new(store));

    let orchestrator = RecordOrchestrator::new(
        db.clone(),
        custodian,
        content,
        ledger.clone(),
        Arc::new(NullIndexer),
    );

    Harness {
        db,
        ledger,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(FakeLedger::healthy(), Arc::new(MemoryBlobStore::new()))
}

fn upload(patient: &str, creator: &str, content: &'static [u8]) -> CreateRecordInput {
    CreateRecordInput::RawUpload(RawUploadInput {
        file_buffer: Bytes::from_static(content),
        file_name: "note.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        patient_id: UserId::new(patient),
        creator_id: UserId::new(creator),
        title: Some("Consultation note".to_string()),
    })
}

// ============================================================================
// End-to-end creation
// ============================================================================

#[tokio::test]
async fn end_to_end_creation_scenario() {
    let h = harness();
    let creator = UserId::new("doctorA");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctorA", b"hello-world"), &creator)
        .await
        .unwrap();

    assert!(outcome.cid.is_some());
    assert!(outcome.tx_id.is_some());
    assert_eq!(outcome.message, "record created");

    // The authoritative row pins the fixed sha256("hello-world") digest
    let record = h.db.record(&outcome.record_id).unwrap().unwrap();
    assert_eq!(
        record.content_hash,
        "afa27b44d43b02a9fea41d13cedc2e4016cfcf87c5dbf990e593669aa8ce286d"
    );
    assert!(record.ledger_tx.is_some());

    // Version 1 exists and folds into the chain
    let versions = h.db.versions_for_record(&outcome.record_id).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].entry.version, 1);
    assert_eq!(versions[0].entry.previous_root, None);
}

#[tokio::test]
async fn second_version_has_new_root() {
    let h = harness();
    let creator = UserId::new("doctorA");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctorA", b"hello-world"), &creator)
        .await
        .unwrap();

    let update = h
        .orchestrator
        .update_record(
            &outcome.record_id,
            Bytes::from_static(b"hello-world v2"),
            "note-v2.pdf",
            "application/pdf",
            &creator,
        )
        .await
        .unwrap();

    assert_eq!(update.version, 2);

    let versions = h.db.versions_for_record(&outcome.record_id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_ne!(versions[0].entry.root, versions[1].entry.root);
    assert_eq!(
        versions[1].entry.previous_root,
        Some(versions[0].entry.root)
    );

    // The original row's content hash is untouched by the update
    let record = h.db.record(&outcome.record_id).unwrap().unwrap();
    assert_eq!(
        record.content_hash,
        "afa27b44d43b02a9fea41d13cedc2e4016cfcf87c5dbf990e593669aa8ce286d"
    );
}

#[tokio::test]
async fn download_roundtrips_for_owner() {
    let h = harness();
    let creator = UserId::new("doctor-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"scan bytes"), &creator)
        .await
        .unwrap();

    let plaintext = h
        .orchestrator
        .download_record(&outcome.record_id, &UserId::new("patient-1"))
        .await
        .unwrap();

    assert_eq!(&plaintext[..], b"scan bytes");
}

#[tokio::test]
async fn empty_upload_is_rejected_before_any_stage() {
    let h = harness();

    let result = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b""), &UserId::new("doctor-1"))
        .await;

    assert!(matches!(result, Err(CoreError::Validation(_))));
}

// ============================================================================
// Degraded creation
// ============================================================================

#[tokio::test]
async fn content_store_failure_degrades_to_storage_pending() {
    let h = harness_with(FakeLedger::healthy(), Arc::new(FailingBlobStore));
    let creator = UserId::new("doctor-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &creator)
        .await
        .unwrap();

    assert!(outcome.cid.is_none());
    assert!(outcome.tx_id.is_none());
    assert_eq!(outcome.message, "record created; storage and ledger pending");

    // The record exists and is retrievable by ID
    let record = h.db.record(&outcome.record_id).unwrap();
    assert!(record.is_some());

    // No version was chained for unstored content
    assert!(h.db.versions_for_record(&outcome.record_id).unwrap().is_empty());
}

#[tokio::test]
async fn ledger_failure_degrades_to_ledger_pending() {
    let h = harness_with(FakeLedger::down(), Arc::new(MemoryBlobStore::new()));
    let creator = UserId::new("doctor-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &creator)
        .await
        .unwrap();

    assert!(outcome.cid.is_some());
    assert!(outcome.tx_id.is_none());
    assert_eq!(outcome.message, "record created; ledger pending");

    let record = h.db.record(&outcome.record_id).unwrap().unwrap();
    assert!(record.ledger_tx.is_none());
}

#[tokio::test]
async fn download_of_pending_storage_is_not_found() {
    let h = harness_with(FakeLedger::healthy(), Arc::new(FailingBlobStore));
    let creator = UserId::new("doctor-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &creator)
        .await
        .unwrap();

    let result = h
        .orchestrator
        .download_record(&outcome.record_id, &UserId::new("patient-1"))
        .await;

    assert!(matches!(result, Err(CoreError::NotFound(_))));
}

// ============================================================================
// Access lifecycle
// ============================================================================

#[tokio::test]
async fn grant_allows_and_revoke_denies_immediately() {
    let h = harness();
    let patient = UserId::new("patient-1");
    let specialist = UserId::new("specialist-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();
    let record_id = outcome.record_id;

    // No grant yet: denied (ledger fake is unreachable for access checks,
    // so the database decides)
    assert!(!h.orchestrator.check_access(&record_id, &specialist).await);

    // Grant read for an hour: allowed immediately
    let expires = Utc::now() + Duration::hours(1);
    h.orchestrator
        .grant_access(&record_id, &specialist, PermissionType::Read, Some(expires), &patient)
        .await
        .unwrap();
    assert!(h.orchestrator.check_access(&record_id, &specialist).await);

    // And the grantee can download
    let plaintext = h
        .orchestrator
        .download_record(&record_id, &specialist)
        .await
        .unwrap();
    assert_eq!(&plaintext[..], b"content");

    // Revoke: denied immediately, regardless of expiry
    h.orchestrator
        .revoke_access(&record_id, &specialist, &patient)
        .await
        .unwrap();
    assert!(!h.orchestrator.check_access(&record_id, &specialist).await);

    let denied = h.orchestrator.download_record(&record_id, &specialist).await;
    assert!(matches!(denied, Err(CoreError::AccessDenied { .. })));
}

#[tokio::test]
async fn expired_grant_is_not_effective() {
    let h = harness();
    let specialist = UserId::new("specialist-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    // Plant a grant that expired an hour ago
    let mut grant = AccessGrant::new(
        outcome.record_id.clone(),
        specialist.clone(),
        PermissionType::Read,
        UserId::new("patient-1"),
        Some(Utc::now() - Duration::hours(1)),
    );
    grant.granted_at = Utc::now() - Duration::hours(2);
    h.db.upsert_grant(grant).unwrap();

    assert!(!h.orchestrator.check_access(&outcome.record_id, &specialist).await);
}

#[tokio::test]
async fn owners_have_implicit_access() {
    let h = harness();

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    assert!(h.orchestrator.check_access(&outcome.record_id, &UserId::new("patient-1")).await);
    assert!(h.orchestrator.check_access(&outcome.record_id, &UserId::new("doctor-1")).await);
    assert!(!h.orchestrator.check_access(&outcome.record_id, &UserId::new("stranger")).await);
}

#[tokio::test]
async fn ledger_verdict_takes_precedence_over_database() {
    let h = harness();
    let stranger = UserId::new("stranger");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    // The ledger answers: its verdict wins even though the database would
    // deny this user
    *h.ledger.access_reply.lock().unwrap() = Some(true);
    assert!(h.orchestrator.check_access(&outcome.record_id, &stranger).await);

    *h.ledger.access_reply.lock().unwrap() = Some(false);
    assert!(!h.orchestrator.check_access(&outcome.record_id, &stranger).await);
}

#[tokio::test]
async fn missing_record_fails_closed() {
    let h = harness();

    let verdict = h
        .orchestrator
        .check_access(&RecordId::new("record:missing"), &UserId::new("anyone"))
        .await;

    assert!(!verdict);
}

#[tokio::test]
async fn grant_with_past_expiry_is_rejected() {
    let h = harness();
    let patient = UserId::new("patient-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    let result = h
        .orchestrator
        .grant_access(
            &outcome.record_id,
            &UserId::new("specialist-1"),
            PermissionType::Read,
            Some(Utc::now() - Duration::minutes(5)),
            &patient,
        )
        .await;

    assert!(matches!(result, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn non_owner_cannot_grant_or_revoke() {
    let h = harness();

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    let grant = h
        .orchestrator
        .grant_access(
            &outcome.record_id,
            &UserId::new("accomplice"),
            PermissionType::Admin,
            None,
            &UserId::new("intruder"),
        )
        .await;
    assert!(matches!(grant, Err(CoreError::AccessDenied { .. })));

    let revoke = h
        .orchestrator
        .revoke_access(&outcome.record_id, &UserId::new("doctor-1"), &UserId::new("intruder"))
        .await;
    assert!(matches!(revoke, Err(CoreError::AccessDenied { .. })));
}

#[tokio::test]
async fn new_grant_supersedes_rather_than_duplicates() {
    let h = harness();
    let patient = UserId::new("patient-1");
    let specialist = UserId::new("specialist-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    h.orchestrator
        .grant_access(&outcome.record_id, &specialist, PermissionType::Read, None, &patient)
        .await
        .unwrap();
    h.orchestrator
        .grant_access(&outcome.record_id, &specialist, PermissionType::Write, None, &patient)
        .await
        .unwrap();

    let grants: Vec<_> = h
        .db
        .grants_for_record(&outcome.record_id)
        .unwrap()
        .into_iter()
        .filter(|g| g.grantee_id == specialist)
        .collect();

    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].permission, PermissionType::Write);
}

// ============================================================================
// Verification & metadata
// ============================================================================

#[tokio::test]
async fn verify_record_surfaces_ledger_mismatch_as_integrity_error() {
    let h = harness();

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    assert!(h.orchestrator.verify_record(&outcome.record_id).await.is_ok());

    *h.ledger.verify_reply.lock().unwrap() = false;
    let result = h.orchestrator.verify_record(&outcome.record_id).await;

    assert!(matches!(result, Err(CoreError::Integrity { .. })));
}

#[tokio::test]
async fn verify_record_with_unreachable_ledger_is_a_connection_error() {
    let h = harness_with(FakeLedger::down(), Arc::new(MemoryBlobStore::new()));

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    let result = h.orchestrator.verify_record(&outcome.record_id).await;

    assert!(matches!(result, Err(CoreError::Connection(_))));
}

#[tokio::test]
async fn metadata_view_reports_version_and_storage_state() {
    let h = harness();
    let patient = UserId::new("patient-1");

    let outcome = h
        .orchestrator
        .create_record(upload("patient-1", "doctor-1", b"content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    let metadata = h
        .orchestrator
        .record_metadata(&outcome.record_id, &patient)
        .await
        .unwrap();

    assert_eq!(metadata.latest_version, Some(1));
    assert!(metadata.version_root.is_some());
    assert!(!metadata.storage_pending);

    // Denied for strangers
    let denied = h
        .orchestrator
        .record_metadata(&outcome.record_id, &UserId::new("stranger"))
        .await;
    assert!(matches!(denied, Err(CoreError::AccessDenied { .. })));
}

#[tokio::test]
async fn patients_list_only_their_own_records() {
    let h = harness();
    let patient = UserId::new("patient-1");

    h.orchestrator
        .create_record(upload("patient-1", "doctor-1", b"one"), &UserId::new("doctor-1"))
        .await
        .unwrap();
    h.orchestrator
        .create_record(upload("patient-1", "doctor-1", b"two"), &UserId::new("doctor-1"))
        .await
        .unwrap();
    h.orchestrator
        .create_record(upload("patient-2", "doctor-1", b"other"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    let records = h
        .orchestrator
        .list_records_for_patient(&patient, &patient)
        .unwrap();
    assert_eq!(records.len(), 2);

    let denied = h
        .orchestrator
        .list_records_for_patient(&patient, &UserId::new("patient-2"));
    assert!(matches!(denied, Err(CoreError::AccessDenied { .. })));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn cancellation_before_storage_leaves_metadata_only_record() {
    let h = harness();
    let cancel = carta_core::CancelToken::new();
    cancel.cancel();

    let outcome = h
        .orchestrator
        .create_record_with_cancel(
            upload("patient-1", "doctor-1", b"content"),
            &UserId::new("doctor-1"),
            &cancel,
        )
        .await
        .unwrap();

    assert!(outcome.cid.is_none());
    assert!(outcome.tx_id.is_none());
    assert!(h.db.record(&outcome.record_id).unwrap().is_some());
}

// ============================================================================
// Sled backend
// ============================================================================

#[tokio::test]
async fn pipeline_runs_over_the_sled_backend() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(SledDatabase::open(dir.path()).unwrap());
    let custodian = Arc::new(KeyCustodian::new(
        Arc::new(InMemoryMasterKey::generate()),
        Arc::new(MemoryKeyStore::new()),
    ));
    let content = Arc::new(ContentStoreClient::new(Arc::new(MemoryBlobStore::new())));
    let orchestrator = RecordOrchestrator::new(
        db.clone(),
        custodian,
        content,
        FakeLedger::healthy(),
        Arc::new(NullIndexer),
    );

    let outcome = orchestrator
        .create_record(upload("patient-1", "doctor-1", b"durable content"), &UserId::new("doctor-1"))
        .await
        .unwrap();

    let record = db.record(&outcome.record_id).unwrap().unwrap();
    assert_eq!(record.patient_id, UserId::new("patient-1"));

    let versions = db.versions_for_record(&outcome.record_id).unwrap();
    assert_eq!(versions.len(), 1);

    let plaintext = orchestrator
        .download_record(&outcome.record_id, &UserId::new("patient-1"))
        .await
        .unwrap();
    assert_eq!(&plaintext[..], b"durable content");
}
