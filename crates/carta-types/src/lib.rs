//! # carta-types: Core types for `Carta`
//!
//! This crate contains shared types used across the `Carta` record core:
//! - Entity IDs ([`RecordId`], [`UserId`], [`KeyId`], [`TxId`])
//! - Content addresses ([`Cid`])
//! - File classification ([`FileKind`])
//! - Access levels ([`PermissionType`])

use std::fmt::Display;

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs
// ============================================================================

/// Unique identifier for a medical record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record ID from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random record ID.
    pub fn generate() -> Self {
        Self(format!("record:{}", uuid::Uuid::new_v4()))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique identifier for a user (patient, clinician, or service identity).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier for a stored encryption key.
///
/// Key IDs name key material without exposing it; they are safe to log
/// and persist alongside ciphertexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random key ID.
    pub fn generate() -> Self {
        Self(format!("key:{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque ledger transaction reference returned by anchor operations.
///
/// Its absence on a record means "ledger pending", not failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Content Address
// ============================================================================

/// A content address: an opaque, deterministic identifier derived from a
/// blob's bytes.
///
/// The same bytes always yield the same address. Callers must treat the
/// string as immutable and never parse its internal structure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cid(String);

impl Cid {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Cid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// FileKind
// ============================================================================

/// Classification of a record's underlying file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Pdf,
    Dicom,
    Image,
    Other,
}

impl FileKind {
    /// Classifies a MIME type string.
    ///
    /// Unknown types map to [`FileKind::Other`] rather than erroring;
    /// classification is descriptive, not a gate.
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            "application/pdf" => Self::Pdf,
            "application/dicom" => Self::Dicom,
            m if m.starts_with("image/") => Self::Image,
            _ => Self::Other,
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pdf => "PDF",
            Self::Dicom => "DICOM",
            Self::Image => "IMAGE",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// PermissionType
// ============================================================================

/// Access level attached to a grant.
///
/// Levels are ordered: `Admin` covers `Write`, which covers `Read`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    Read,
    Write,
    Admin,
}

impl PermissionType {
    /// Numeric level used for hierarchy comparison.
    pub fn level(self) -> u8 {
        match self {
            Self::Read => 1,
            Self::Write => 2,
            Self::Admin => 3,
        }
    }

    /// Returns true if this level covers the `required` action.
    pub fn covers(self, required: PermissionType) -> bool {
        self.level() >= required.level()
    }

    /// Parses a wire-format action name.
    ///
    /// Accepts the legacy `share` spelling still present on deployed
    /// ledgers, which maps to [`PermissionType::Write`].
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "read" => Some(Self::Read),
            "write" | "share" => Some(Self::Write),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Canonical wire-format action name.
    pub fn as_action(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }
}

impl Display for PermissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_action())
    }
}

// ============================================================================
// Tests
// ============================================================================
