//! Version entries chained through running roots.
//!
//! Each version folds the previous chain root together with a hash of the
//! new version's content address, creator, and timestamp:
//!
//! ```text
//! Version 1: root_1 = entry_hash_1
//! Version 2: root_2 = combine(root_1, entry_hash_2)
//! Version 3: root_3 = combine(root_2, entry_hash_3)
//! ```
//!
//! Rewriting any historical version changes every subsequent root, which is
//! what makes the history tamper-evident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use carta_types::{Cid, UserId};

use crate::merkle::{TreeHash, combine};

// ============================================================================
// VersionEntry
// ============================================================================

/// One version of a record's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Version number, strictly increasing from 1.
    pub version: u32,
    /// Content address of this version's encrypted blob.
    pub content_address: Cid,
    /// Hex digest of this version's plaintext.
    pub content_hash: String,
    /// The chain root before this version was appended (`None` for v1).
    pub previous_root: Option<TreeHash>,
    /// The chain root after folding this entry in.
    pub root: TreeHash,
    /// Who created this version.
    pub created_by: UserId,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}

impl VersionEntry {
    /// Hash of this entry's identity fields (address, creator, timestamp,
    /// content hash), used when folding into the chain root.
    fn entry_hash(
        content_address: &Cid,
        content_hash: &str,
        created_by: &UserId,
        created_at: DateTime<Utc>,
    ) -> TreeHash {
        let mut hasher = Sha256::new();
        hasher.update(content_address.as_str().as_bytes());
        hasher.update(content_hash.as_bytes());
        hasher.update(created_by.as_str().as_bytes());
        hasher.update(created_at.to_rfc3339().as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        TreeHash::from(digest)
    }
}

// ============================================================================
// create_version_info
// ============================================================================

/// Builds the next [`VersionEntry`] after `prior` versions.
///
/// `version` is `prior.len() + 1`; the new root folds the previous root
/// with the entry hash (for version 1 the entry hash *is* the root).
pub fn create_version_info(
    prior: &[VersionEntry],
    content_address: Cid,
    content_hash: String,
    created_by: UserId,
) -> VersionEntry {
    create_version_info_at(prior, content_address, content_hash, created_by, Utc::now())
}

/// [`create_version_info`] with an explicit timestamp.
///
/// Exists so callers replaying history (and tests) get deterministic
/// entries; the convenience wrapper stamps `Utc::now()`.
pub fn create_version_info_at(
    prior: &[VersionEntry],
    content_address: Cid,
    content_hash: String,
    created_by: UserId,
    created_at: DateTime<Utc>,
) -> VersionEntry {
    let previous_root = prior.last().map(|entry| entry.root);
    let entry_hash =
        VersionEntry::entry_hash(&content_address, &content_hash, &created_by, created_at);

    let root = match previous_root {
        Some(prev) => combine(&prev, &entry_hash),
        None => entry_hash,
    };

    let version = prior.len() as u32 + 1;

    // Postcondition: version numbers are strictly increasing from 1
    debug_assert_eq!(
        version,
        prior.last().map_or(1, |entry| entry.version + 1),
        "version numbering gap"
    );

    VersionEntry {
        version,
        content_address,
        content_hash,
        previous_root,
        root,
        created_by,
        created_at,
    }
}

// ============================================================================
// VersionChain
// ============================================================================

/// An in-order sequence of a record's versions with its running root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionChain {
    entries: Vec<VersionEntry>,
}

impl VersionChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a chain from already-ordered entries.
    pub fn from_entries(entries: Vec<VersionEntry>) -> Self {
        debug_assert!(
            entries.iter().enumerate().all(|(i, e)| e.version == i as u32 + 1),
            "entries are not a contiguous version sequence"
        );
        Self { entries }
    }

    /// Appends the next version and returns it.
    pub fn append(
        &mut self,
        content_address: Cid,
        content_hash: String,
        created_by: UserId,
    ) -> VersionEntry {
        let entry = create_version_info(&self.entries, content_address, content_hash, created_by);
        self.entries.push(entry.clone());
        entry
    }

    /// The current chain root, if any version exists.
    pub fn root(&self) -> Option<TreeHash> {
        self.entries.last().map(|entry| entry.root)
    }

    /// The latest version entry.
    pub fn latest(&self) -> Option<&VersionEntry> {
        self.entries.last()
    }

    /// All entries in version order.
    pub fn entries(&self) -> &[VersionEntry] {
        &self.entries
    }

    /// Number of versions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no version has been appended.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recomputes every root from the entries' own fields and compares
    /// against the stored roots.
    ///
    /// Returns `false` if any entry was rewritten after the fact.
    pub fn verify(&self) -> bool {
        let mut previous: Option<TreeHash> = None;

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.version != i as u32 + 1 || entry.previous_root != previous {
                return false;
            }

            let entry_hash = VersionEntry::entry_hash(
                &entry.content_address,
                &entry.content_hash,
                &entry.created_by,
                entry.created_at,
            );
            let expected_root = match previous {
                Some(prev) => combine(&prev, &entry_hash),
                None => entry_hash,
            };
            if entry.root != expected_root {
                return false;
            }

            previous = Some(entry.root);
        }

        true
    }
}

// ============================================================================
// Tests
// ============================================================================
