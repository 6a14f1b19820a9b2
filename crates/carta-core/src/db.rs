//! The authoritative record database.
//!
//! The database is the single source of truth: blob storage and the ledger
//! are eventually linked to it, never the other way around. The boundary is
//! a trait so the orchestrator and access policy can run over an embedded
//! store, an external database, or a test double.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use carta_types::{RecordId, TxId, UserId};

use crate::error::{CoreError, CoreResult};
use crate::model::{AccessGrant, MedicalRecord, RecordVersion, StoredBlobRef};

// ============================================================================
// RecordDatabase
// ============================================================================

/// Storage for records, blob references, grants, and version entries.
pub trait RecordDatabase: Send + Sync {
    /// Inserts a new record row.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] if the record ID already exists.
    fn insert_record(&self, record: MedicalRecord) -> CoreResult<()>;

    /// Fetches a record by ID.
    fn record(&self, record_id: &RecordId) -> CoreResult<Option<MedicalRecord>>;

    /// Sets the ledger anchor on a record once anchoring succeeds.
    fn set_record_ledger_tx(&self, record_id: &RecordId, tx: &TxId) -> CoreResult<()>;

    /// Lists records owned by a patient, oldest first.
    fn records_for_patient(&self, patient_id: &UserId) -> CoreResult<Vec<MedicalRecord>>;

    /// Inserts a blob reference for a record version.
    fn insert_blob_ref(&self, blob_ref: StoredBlobRef) -> CoreResult<()>;

    /// Lists a record's blob references in version order.
    fn blob_refs_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<StoredBlobRef>>;

    /// The blob reference of the highest stored version.
    fn active_blob_ref(&self, record_id: &RecordId) -> CoreResult<Option<StoredBlobRef>>;

    /// Inserts a grant, superseding any prior grant for the same
    /// (record, grantee) pair.
    fn upsert_grant(&self, grant: AccessGrant) -> CoreResult<()>;

    /// The current grant for a (record, grantee) pair, effective or not.
    fn grant_for(&self, record_id: &RecordId, grantee_id: &UserId)
        -> CoreResult<Option<AccessGrant>>;

    /// The effective grant for a pair at `now`, per the effective-grant rule.
    fn effective_grant(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<AccessGrant>> {
        Ok(self
            .grant_for(record_id, grantee_id)?
            .filter(|grant| grant.is_effective(now)))
    }

    /// Lists all current grants on a record.
    fn grants_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<AccessGrant>>;

    /// Soft-deletes the pair's grant. Returns `false` if none existed.
    fn deactivate_grant(&self, record_id: &RecordId, grantee_id: &UserId) -> CoreResult<bool>;

    /// Sets the ledger anchor on the pair's current grant.
    fn set_grant_ledger_tx(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
        tx: &TxId,
    ) -> CoreResult<()>;

    /// Appends a version entry.
    fn insert_version(&self, version: RecordVersion) -> CoreResult<()>;

    /// Lists a record's version entries in version order.
    fn versions_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<RecordVersion>>;
}

// ============================================================================
// MemoryDatabase
// ============================================================================

#[derive(Default)]
struct MemoryDatabaseInner {
    records: HashMap<RecordId, MedicalRecord>,
    blob_refs: HashMap<RecordId, Vec<StoredBlobRef>>,
    grants: HashMap<(RecordId, UserId), AccessGrant>,
    versions: HashMap<RecordId, Vec<RecordVersion>>,
}

/// In-memory [`RecordDatabase`] for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryDatabase {
    inner: RwLock<MemoryDatabaseInner>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordDatabase for MemoryDatabase {
    fn insert_record(&self, record: MedicalRecord) -> CoreResult<()> {
        let mut inner = self.inner.write().expect("db lock poisoned");

        if inner.records.contains_key(&record.record_id) {
            return Err(CoreError::Validation(format!(
                "record already exists: {}",
                record.record_id
            )));
        }
        inner.records.insert(record.record_id.clone(), record);
        Ok(())
    }

    fn record(&self, record_id: &RecordId) -> CoreResult<Option<MedicalRecord>> {
        Ok(self
            .inner
            .read()
            .expect("db lock poisoned")
            .records
            .get(record_id)
            .cloned())
    }

    fn set_record_ledger_tx(&self, record_id: &RecordId, tx: &TxId) -> CoreResult<()> {
        let mut inner = self.inner.write().expect("db lock poisoned");

        let record = inner
            .records
            .get_mut(record_id)
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;
        record.ledger_tx = Some(tx.clone());
        record.updated_at = Utc::now();
        Ok(())
    }

    fn records_for_patient(&self, patient_id: &UserId) -> CoreResult<Vec<MedicalRecord>> {
        let inner = self.inner.read().expect("db lock poisoned");

        let mut records: Vec<_> = inner
            .records
            .values()
            .filter(|r| &r.patient_id == patient_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn insert_blob_ref(&self, blob_ref: StoredBlobRef) -> CoreResult<()> {
        self.inner
            .write()
            .expect("db lock poisoned")
            .blob_refs
            .entry(blob_ref.record_id.clone())
            .or_default()
            .push(blob_ref);
        Ok(())
    }

    fn blob_refs_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<StoredBlobRef>> {
        let mut refs = self
            .inner
            .read()
            .expect("db lock poisoned")
            .blob_refs
            .get(record_id)
            .cloned()
            .unwrap_or_default();
        refs.sort_by_key(|r| r.version);
        Ok(refs)
    }

    fn active_blob_ref(&self, record_id: &RecordId) -> CoreResult<Option<StoredBlobRef>> {
        Ok(self.blob_refs_for_record(record_id)?.into_iter().last())
    }

    fn upsert_grant(&self, grant: AccessGrant) -> CoreResult<()> {
        self.inner
            .write()
            .expect("db lock poisoned")
            .grants
            .insert((grant.record_id.clone(), grant.grantee_id.clone()), grant);
        Ok(())
    }

    fn grant_for(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
    ) -> CoreResult<Option<AccessGrant>> {
        Ok(self
            .inner
            .read()
            .expect("db lock poisoned")
            .grants
            .get(&(record_id.clone(), grantee_id.clone()))
            .cloned())
    }

    fn grants_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<AccessGrant>> {
        let mut grants: Vec<_> = self
            .inner
            .read()
            .expect("db lock poisoned")
            .grants
            .values()
            .filter(|g| &g.record_id == record_id)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.granted_at);
        Ok(grants)
    }

    fn deactivate_grant(&self, record_id: &RecordId, grantee_id: &UserId) -> CoreResult<bool> {
        let mut inner = self.inner.write().expect("db lock poisoned");

        match inner
            .grants
            .get_mut(&(record_id.clone(), grantee_id.clone()))
        {
            Some(grant) => {
                grant.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_grant_ledger_tx(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
        tx: &TxId,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().expect("db lock poisoned");

        let grant = inner
            .grants
            .get_mut(&(record_id.clone(), grantee_id.clone()))
            .ok_or_else(|| {
                CoreError::NotFound(format!("grant for {grantee_id} on {record_id}"))
            })?;
        grant.ledger_tx = Some(tx.clone());
        Ok(())
    }

    fn insert_version(&self, version: RecordVersion) -> CoreResult<()> {
        self.inner
            .write()
            .expect("db lock poisoned")
            .versions
            .entry(version.record_id.clone())
            .or_default()
            .push(version);
        Ok(())
    }

    fn versions_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<RecordVersion>> {
        let mut versions = self
            .inner
            .read()
            .expect("db lock poisoned")
            .versions
            .get(record_id)
            .cloned()
            .unwrap_or_default();
        versions.sort_by_key(|v| v.entry.version);
        Ok(versions)
    }
}

// ============================================================================
// SledDatabase
// ============================================================================

/// Embedded [`RecordDatabase`] over sled trees.
///
/// Tree layout:
/// - `records`: `record_id` → [`MedicalRecord`] JSON
/// - `blob_refs`: `record_id/0000000001` → [`StoredBlobRef`] JSON
/// - `grants`: `record_id\u{0}grantee_id` → [`AccessGrant`] JSON
/// - `versions`: `record_id/0000000001` → [`RecordVersion`] JSON
pub struct SledDatabase {
    #[allow(dead_code)]
    db: sled::Db,
    records: sled::Tree,
    blob_refs: sled::Tree,
    grants: sled::Tree,
    versions: sled::Tree,
}

impl SledDatabase {
    /// Opens or creates the database at `path`.
    ///
    /// # Errors
    ///
    /// [`CoreError::Database`] on any backend failure.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let db = sled::open(path).map_err(db_err)?;
        Ok(Self {
            records: db.open_tree("records").map_err(db_err)?,
            blob_refs: db.open_tree("blob_refs").map_err(db_err)?,
            grants: db.open_tree("grants").map_err(db_err)?,
            versions: db.open_tree("versions").map_err(db_err)?,
            db,
        })
    }

    fn versioned_key(record_id: &RecordId, version: u32) -> Vec<u8> {
        format!("{}/{version:010}", record_id.as_str()).into_bytes()
    }

    fn pair_key(record_id: &RecordId, grantee_id: &UserId) -> Vec<u8> {
        let mut key = record_id.as_str().as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(grantee_id.as_str().as_bytes());
        key
    }

    fn scan_prefix<T: serde::de::DeserializeOwned>(
        tree: &sled::Tree,
        prefix: &[u8],
    ) -> CoreResult<Vec<T>> {
        tree.scan_prefix(prefix)
            .map(|item| {
                let (_, value) = item.map_err(db_err)?;
                decode(&value)
            })
            .collect()
    }
}

fn db_err(e: sled::Error) -> CoreError {
    CoreError::Database(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CoreError::Database(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Database(e.to_string()))
}

impl RecordDatabase for SledDatabase {
    fn insert_record(&self, record: MedicalRecord) -> CoreResult<()> {
        let key = record.record_id.as_str().as_bytes();

        if self.records.contains_key(key).map_err(db_err)? {
            return Err(CoreError::Validation(format!(
                "record already exists: {}",
                record.record_id
            )));
        }
        self.records.insert(key, encode(&record)?).map_err(db_err)?;
        Ok(())
    }

    fn record(&self, record_id: &RecordId) -> CoreResult<Option<MedicalRecord>> {
        self.records
            .get(record_id.as_str().as_bytes())
            .map_err(db_err)?
            .map(|value| decode(&value))
            .transpose()
    }

    fn set_record_ledger_tx(&self, record_id: &RecordId, tx: &TxId) -> CoreResult<()> {
        let mut record = self
            .record(record_id)?
            .ok_or_else(|| CoreError::NotFound(record_id.to_string()))?;
        record.ledger_tx = Some(tx.clone());
        record.updated_at = Utc::now();

        self.records
            .insert(record_id.as_str().as_bytes(), encode(&record)?)
            .map_err(db_err)?;
        Ok(())
    }

    fn records_for_patient(&self, patient_id: &UserId) -> CoreResult<Vec<MedicalRecord>> {
        let mut records = Vec::new();
        for item in self.records.iter() {
            let (_, value) = item.map_err(db_err)?;
            let record: MedicalRecord = decode(&value)?;
            if &record.patient_id == patient_id {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn insert_blob_ref(&self, blob_ref: StoredBlobRef) -> CoreResult<()> {
        let key = Self::versioned_key(&blob_ref.record_id, blob_ref.version);
        self.blob_refs
            .insert(key, encode(&blob_ref)?)
            .map_err(db_err)?;
        Ok(())
    }

    fn blob_refs_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<StoredBlobRef>> {
        let prefix = format!("{}/", record_id.as_str());
        Self::scan_prefix(&self.blob_refs, prefix.as_bytes())
    }

    fn active_blob_ref(&self, record_id: &RecordId) -> CoreResult<Option<StoredBlobRef>> {
        Ok(self.blob_refs_for_record(record_id)?.into_iter().last())
    }

    fn upsert_grant(&self, grant: AccessGrant) -> CoreResult<()> {
        let key = Self::pair_key(&grant.record_id, &grant.grantee_id);
        self.grants.insert(key, encode(&grant)?).map_err(db_err)?;
        Ok(())
    }

    fn grant_for(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
    ) -> CoreResult<Option<AccessGrant>> {
        self.grants
            .get(Self::pair_key(record_id, grantee_id))
            .map_err(db_err)?
            .map(|value| decode(&value))
            .transpose()
    }

    fn grants_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<AccessGrant>> {
        let mut prefix = record_id.as_str().as_bytes().to_vec();
        prefix.push(0);

        let mut grants: Vec<AccessGrant> = Self::scan_prefix(&self.grants, &prefix)?;
        grants.sort_by_key(|g| g.granted_at);
        Ok(grants)
    }

    fn deactivate_grant(&self, record_id: &RecordId, grantee_id: &UserId) -> CoreResult<bool> {
        match self.grant_for(record_id, grantee_id)? {
            Some(mut grant) => {
                grant.is_active = false;
                self.upsert_grant(grant)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_grant_ledger_tx(
        &self,
        record_id: &RecordId,
        grantee_id: &UserId,
        tx: &TxId,
    ) -> CoreResult<()> {
        let mut grant = self.grant_for(record_id, grantee_id)?.ok_or_else(|| {
            CoreError::NotFound(format!("grant for {grantee_id} on {record_id}"))
        })?;
        grant.ledger_tx = Some(tx.clone());
        self.upsert_grant(grant)
    }

    fn insert_version(&self, version: RecordVersion) -> CoreResult<()> {
        let key = Self::versioned_key(&version.record_id, version.entry.version);
        self.versions
            .insert(key, encode(&version)?)
            .map_err(db_err)?;
        Ok(())
    }

    fn versions_for_record(&self, record_id: &RecordId) -> CoreResult<Vec<RecordVersion>> {
        let prefix = format!("{}/", record_id.as_str());
        Self::scan_prefix(&self.versions, prefix.as_bytes())
    }
}
