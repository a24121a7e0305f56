use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{EntityType, ProcessingStatus};

/// Default attempt budget for a freshly uploaded certificate.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// An uploaded certificate for an organization, vehicle or horse.
///
/// Owned by the certificate store. The compliance core reads the descriptive
/// fields and writes only the processing fields through `CertificatePatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub file_name: String,
    /// Image reference handed to the extraction collaborator.
    #[serde(default)]
    pub storage_ref: String,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub certificate_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub extracted_data: Option<serde_json::Value>,
    #[serde(default)]
    pub has_extracted_data: bool,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default = "default_status")]
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extracted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_status() -> ProcessingStatus {
    ProcessingStatus::None
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Certificate {
    /// A new, never-processed certificate record.
    pub fn new(
        id: impl Into<String>,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type,
            entity_id: entity_id.into(),
            file_name: file_name.into(),
            storage_ref: String::new(),
            document_type: None,
            certificate_type: None,
            display_name: None,
            extracted_data: None,
            has_extracted_data: false,
            expiry_date: None,
            processing_status: ProcessingStatus::None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            next_retry_at: None,
            last_error: None,
            last_attempt_at: None,
            extracted_at: None,
            failed_at: None,
            created_at: Utc::now(),
        }
    }

    /// The reference passed to the extractor; falls back to the file name.
    pub fn image_ref(&self) -> &str {
        if self.storage_ref.trim().is_empty() {
            &self.file_name
        } else {
            &self.storage_ref
        }
    }

    /// Apply a patch in memory (mirrors what the store persists).
    pub fn apply(&mut self, patch: &CertificatePatch) {
        if let Some(status) = patch.processing_status {
            self.processing_status = status;
        }
        if let Some(count) = patch.retry_count {
            self.retry_count = count;
        }
        if let Some(next) = patch.next_retry_at {
            self.next_retry_at = next;
        }
        if let Some(err) = &patch.last_error {
            self.last_error = err.clone();
        }
        if let Some(at) = patch.last_attempt_at {
            self.last_attempt_at = Some(at);
        }
        if let Some(data) = &patch.extracted_data {
            self.extracted_data = Some(data.clone());
        }
        if let Some(has) = patch.has_extracted_data {
            self.has_extracted_data = has;
        }
        if let Some(at) = patch.extracted_at {
            self.extracted_at = Some(at);
        }
        if let Some(at) = patch.failed_at {
            self.failed_at = Some(at);
        }
    }
}

/// Partial update of a certificate's processing fields.
///
/// `None` leaves a field untouched. Clearable fields use `Option<Option<_>>`:
/// `Some(None)` clears, `Some(Some(v))` sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificatePatch {
    pub processing_status: Option<ProcessingStatus>,
    pub retry_count: Option<u32>,
    pub next_retry_at: Option<Option<DateTime<Utc>>>,
    pub last_error: Option<Option<String>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub extracted_data: Option<serde_json::Value>,
    pub has_extracted_data: Option<bool>,
    pub extracted_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl CertificatePatch {
    pub fn status(status: ProcessingStatus) -> Self {
        Self {
            processing_status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    pub fn with_next_retry_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.next_retry_at = Some(at);
        self
    }

    pub fn with_last_error(mut self, error: Option<String>) -> Self {
        self.last_error = Some(error);
        self
    }

    pub fn with_last_attempt_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_attempt_at = Some(at);
        self
    }

    pub fn with_extracted_data(mut self, data: serde_json::Value, at: DateTime<Utc>) -> Self {
        self.extracted_data = Some(data);
        self.has_extracted_data = Some(true);
        self.extracted_at = Some(at);
        self
    }

    pub fn with_failed_at(mut self, at: DateTime<Utc>) -> Self {
        self.failed_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn image_ref_falls_back_to_file_name() {
        let mut cert = Certificate::new("c1", EntityType::Horse, "h1", "pass.jpg");
        assert_eq!(cert.image_ref(), "pass.jpg");
        cert.storage_ref = "horses/h1/pass.jpg".into();
        assert_eq!(cert.image_ref(), "horses/h1/pass.jpg");
    }

    #[test]
    fn apply_clears_and_sets_fields() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut cert = Certificate::new("c1", EntityType::Vehicle, "v1", "reg.pdf");
        cert.last_error = Some("timeout".into());
        cert.next_retry_at = Some(at);

        let patch = CertificatePatch::status(ProcessingStatus::Pending)
            .with_retry_count(0)
            .with_last_error(None)
            .with_next_retry_at(None);
        cert.apply(&patch);

        assert_eq!(cert.processing_status, ProcessingStatus::Pending);
        assert!(cert.last_error.is_none());
        assert!(cert.next_retry_at.is_none());
    }

    #[test]
    fn deserializes_minimal_camel_case_record() {
        let json = r#"{
            "id": "c9",
            "entityType": "horse",
            "entityId": "h1",
            "fileName": "hestepas.jpg",
            "documentType": "Hestepas"
        }"#;
        let cert: Certificate = serde_json::from_str(json).unwrap();
        assert_eq!(cert.document_type.as_deref(), Some("Hestepas"));
        assert_eq!(cert.processing_status, ProcessingStatus::None);
        assert_eq!(cert.max_retries, DEFAULT_MAX_RETRIES);
    }
}
