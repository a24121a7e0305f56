//! Collaborator seams of the extraction job manager.
//!
//! - CertificateStore: persistence of certificate records
//! - DocumentExtractor: the AI extraction call
//! - Clock: time source, so retry scheduling is testable
//! - JobNotifier: best-effort status-change delivery

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::error::ExtractorError;
use super::types::JobEvent;
use crate::db::DatabaseError;
use crate::models::enums::{EntityType, ProcessingStatus};
use crate::models::{Certificate, CertificatePatch};

pub trait CertificateStore: Send + Sync {
    fn insert(&self, certificate: &Certificate) -> Result<(), DatabaseError>;

    fn get(&self, id: &str) -> Result<Option<Certificate>, DatabaseError>;

    /// All certificates of one entity, oldest first.
    fn get_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<Certificate>, DatabaseError>;

    fn list_by_status(&self, statuses: &[ProcessingStatus]) -> Result<Vec<Certificate>, DatabaseError>;

    /// Partial update. `NotFound` when the record is gone.
    fn update(&self, id: &str, patch: &CertificatePatch) -> Result<(), DatabaseError>;

    /// Applies `patch` only while the stored status is one of `expected`.
    /// Returns whether the update happened.
    fn update_if_status(
        &self,
        id: &str,
        expected: &[ProcessingStatus],
        patch: &CertificatePatch,
    ) -> Result<bool, DatabaseError>;

    fn delete(&self, id: &str) -> Result<bool, DatabaseError>;
}

/// Turns a certificate image into structured JSON.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, image_ref: &str, entity_type: EntityType) -> Result<Value, ExtractorError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Receives job status changes. Failures are logged and otherwise ignored.
pub trait JobNotifier: Send + Sync {
    fn notify(&self, event: &JobEvent) -> Result<(), String>;
}

/// Notifier that writes events to the log.
pub struct LogNotifier;

impl JobNotifier for LogNotifier {
    fn notify(&self, event: &JobEvent) -> Result<(), String> {
        tracing::info!(
            certificate_id = %event.certificate_id,
            status = %event.status,
            retry_count = event.retry_count,
            "Certificate extraction status changed"
        );
        Ok(())
    }
}
