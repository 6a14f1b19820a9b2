//! Creation inputs.
//!
//! The orchestrator accepts a tagged union of input shapes and resolves it
//! exactly once, at the boundary, into a single canonical struct. Everything
//! downstream works with [`NormalizedCreate`] only.

use bytes::Bytes;

use carta_types::{FileKind, UserId};

use crate::error::{CoreError, CoreResult};

// ============================================================================
// Input shapes
// ============================================================================

/// The shape the upload/route layer hands over.
#[derive(Debug, Clone)]
pub struct RawUploadInput {
    pub file_buffer: Bytes,
    pub file_name: String,
    pub mime_type: String,
    pub patient_id: UserId,
    pub creator_id: UserId,
    /// Optional display title; defaults to the file name.
    pub title: Option<String>,
}

/// The canonical creation input.
#[derive(Debug, Clone)]
pub struct NormalizedCreate {
    pub patient_id: UserId,
    pub creator_id: UserId,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_kind: FileKind,
    pub content: Bytes,
}

/// Union of accepted creation inputs.
#[derive(Debug, Clone)]
pub enum CreateRecordInput {
    /// A raw upload from the route layer.
    RawUpload(RawUploadInput),
    /// Already-normalized input (e.g. internal re-ingestion).
    Normalized(NormalizedCreate),
}

impl CreateRecordInput {
    /// Resolves the union into the canonical struct, validating once.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] for an empty buffer, blank identity, or
    /// blank file name.
    pub fn resolve(self) -> CoreResult<NormalizedCreate> {
        let normalized = match self {
            Self::Normalized(normalized) => normalized,
            Self::RawUpload(raw) => {
                let title = raw
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| raw.file_name.clone());
                NormalizedCreate {
                    patient_id: raw.patient_id,
                    creator_id: raw.creator_id,
                    title,
                    file_kind: FileKind::from_mime(&raw.mime_type),
                    file_name: raw.file_name,
                    mime_type: raw.mime_type,
                    content: raw.file_buffer,
                }
            }
        };

        if normalized.content.is_empty() {
            return Err(CoreError::Validation("file buffer is empty".to_string()));
        }
        if normalized.patient_id.as_str().trim().is_empty() {
            return Err(CoreError::Validation("patient id is blank".to_string()));
        }
        if normalized.creator_id.as_str().trim().is_empty() {
            return Err(CoreError::Validation("creator id is blank".to_string()));
        }
        if normalized.file_name.trim().is_empty() {
            return Err(CoreError::Validation("file name is blank".to_string()));
        }

        Ok(normalized)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawUploadInput {
        RawUploadInput {
            file_buffer: Bytes::from_static(b"content"),
            file_name: "note.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            patient_id: UserId::new("patient-1"),
            creator_id: UserId::new("doctor-1"),
            title: None,
        }
    }

    #[test]
    fn raw_upload_resolves_with_defaults() {
        let normalized = CreateRecordInput::RawUpload(raw()).resolve().unwrap();

        assert_eq!(normalized.title, "note.pdf");
        assert_eq!(normalized.file_kind, FileKind::Pdf);
        assert_eq!(&normalized.content[..], b"content");
    }

    #[test]
    fn explicit_title_wins() {
        let mut input = raw();
        input.title = Some("Discharge note".to_string());

        let normalized = CreateRecordInput::RawUpload(input).resolve().unwrap();

        assert_eq!(normalized.title, "Discharge note");
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let mut input = raw();
        input.file_buffer = Bytes::new();

        let result = CreateRecordInput::RawUpload(input).resolve();

        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn blank_identities_are_rejected() {
        let mut input = raw();
        input.patient_id = UserId::new("  ");
        assert!(matches!(
            CreateRecordInput::RawUpload(input).resolve(),
            Err(CoreError::Validation(_))
        ));

        let mut input = raw();
        input.creator_id = UserId::new("");
        assert!(matches!(
            CreateRecordInput::RawUpload(input).resolve(),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn normalized_passthrough_is_still_validated() {
        let normalized = NormalizedCreate {
            patient_id: UserId::new("patient-1"),
            creator_id: UserId::new("doctor-1"),
            title: "t".to_string(),
            file_name: "f.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            file_kind: FileKind::Other,
            content: Bytes::new(),
        };

        let result = CreateRecordInput::Normalized(normalized).resolve();

        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
