//! The authoritative data model.
//!
//! Records and blob references are logically append-only: an update appends
//! a new version, it never mutates what was written. Grants are soft-deleted
//! on revocation and expire passively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carta_chain::VersionEntry;
use carta_types::{Cid, FileKind, KeyId, PermissionType, RecordId, TxId, UserId};

// ============================================================================
// MedicalRecord
// ============================================================================

/// The authoritative record row.
///
/// `content_hash` is computed once at creation and never recomputed or
/// mutated; a re-upload creates a new version whose hash lives on that
/// version's blob reference and chain entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub record_id: RecordId,
    /// The patient the record is about — the primary owner.
    pub patient_id: UserId,
    /// Who created the record (e.g. the treating clinician).
    pub creator_id: UserId,
    pub title: String,
    pub file_name: String,
    pub file_kind: FileKind,
    /// Plaintext size in bytes at creation.
    pub file_size: u64,
    /// Hex SHA-256 of the version-1 plaintext. Immutable.
    pub content_hash: String,
    /// Ledger anchor; `None` means "ledger pending", not failure.
    pub ledger_tx: Option<TxId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicalRecord {
    /// True if `user` is an owner (patient or creator). Owners pass access
    /// checks without an explicit grant.
    pub fn is_owner(&self, user: &UserId) -> bool {
        &self.patient_id == user || &self.creator_id == user
    }
}

// ============================================================================
// StoredBlobRef
// ============================================================================

/// Maps one record version to its stored ciphertext.
///
/// One active reference per record per version; the content address is
/// immutable once pinned — it is a deterministic function of the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlobRef {
    /// Content address of the ciphertext.
    pub content_address: Cid,
    pub record_id: RecordId,
    /// Version this blob belongs to, starting at 1.
    pub version: u32,
    /// Chunk index when a version is split across blobs; `None` for whole
    /// files.
    pub chunk_index: Option<u32>,
    pub file_name: String,
    pub mime_type: String,
    /// Plaintext size in bytes.
    pub file_size: u64,
    /// Ciphertext size in bytes.
    pub ciphertext_size: u64,
    /// Cipher suite name, recorded for migration.
    pub encryption_algorithm: String,
    /// Identifier of the wrapping key generation in custody.
    pub key_id: KeyId,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// AccessGrant
// ============================================================================

/// A grant of access to a record.
///
/// At most one *effective* grant exists per (record, grantee) pair: a new
/// grant supersedes rather than duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Unique grant identifier.
    pub permission_id: String,
    pub record_id: RecordId,
    pub grantee_id: UserId,
    pub permission: PermissionType,
    pub grantor_id: UserId,
    pub granted_at: DateTime<Utc>,
    /// `None` means the grant does not expire.
    pub expires_at: Option<DateTime<Utc>>,
    /// Cleared on revocation (soft delete).
    pub is_active: bool,
    /// Ledger anchor; `None` means the mirror is pending.
    pub ledger_tx: Option<TxId>,
}

impl AccessGrant {
    /// Creates a fresh active grant.
    pub fn new(
        record_id: RecordId,
        grantee_id: UserId,
        permission: PermissionType,
        grantor_id: UserId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            permission_id: format!("perm:{}", uuid::Uuid::new_v4()),
            record_id,
            grantee_id,
            permission,
            grantor_id,
            granted_at: Utc::now(),
            expires_at,
            is_active: true,
            ledger_tx: None,
        }
    }

    /// The effective-grant rule: active and not expired at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

// ============================================================================
// RecordVersion
// ============================================================================

/// A chain entry bound to its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersion {
    pub record_id: RecordId,
    pub entry: VersionEntry,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(expires_at: Option<DateTime<Utc>>) -> AccessGrant {
        AccessGrant::new(
            RecordId::new("record:1"),
            UserId::new("specialist-1"),
            PermissionType::Read,
            UserId::new("patient-1"),
            expires_at,
        )
    }

    #[test]
    fn unexpiring_active_grant_is_effective() {
        let g = grant(None);

        assert!(g.is_effective(Utc::now()));
    }

    #[test]
    fn grant_expires_passively() {
        let now = Utc::now();
        let g = grant(Some(now + Duration::hours(1)));

        assert!(g.is_effective(now));
        assert!(g.is_effective(now + Duration::minutes(59)));
        assert!(!g.is_effective(now + Duration::hours(1)));
        assert!(!g.is_effective(now + Duration::hours(2)));
    }

    #[test]
    fn revoked_grant_is_never_effective() {
        let now = Utc::now();
        let mut g = grant(Some(now + Duration::hours(1)));
        g.is_active = false;

        assert!(!g.is_effective(now));
    }

    #[test]
    fn owners_are_patient_and_creator() {
        let record = MedicalRecord {
            record_id: RecordId::new("record:1"),
            patient_id: UserId::new("patient-1"),
            creator_id: UserId::new("doctor-1"),
            title: "MRI".to_string(),
            file_name: "mri.dcm".to_string(),
            file_kind: FileKind::Dicom,
            file_size: 1024,
            content_hash: "abc".to_string(),
            ledger_tx: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(record.is_owner(&UserId::new("patient-1")));
        assert!(record.is_owner(&UserId::new("doctor-1")));
        assert!(!record.is_owner(&UserId::new("stranger")));
    }
}
