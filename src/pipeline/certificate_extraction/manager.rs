//! Extraction job state machine.
//!
//! ```text
//! none/pending ──► processing ──► completed
//!                      │
//!                      ├──► retrying ──(due)──► processing
//!                      └──► failed
//! ```
//!
//! `processing` is the mutual-exclusion marker: entering it is a
//! compare-and-set on the stored status. Every transition is persisted
//! before its notification goes out.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};

use super::error::JobError;
use super::queue::RetryQueue;
use super::traits::{CertificateStore, Clock, DocumentExtractor, JobNotifier};
use super::types::{ExtractionConfig, JobEvent, JobOutcome, ResumeReport};
use crate::models::enums::{EntityType, ProcessingStatus};
use crate::models::{Certificate, CertificatePatch};

const RESUMABLE: [ProcessingStatus; 3] = [
    ProcessingStatus::Pending,
    ProcessingStatus::Retrying,
    ProcessingStatus::Processing,
];

pub struct ExtractionJobManager {
    store: Arc<dyn CertificateStore>,
    extractor: Arc<dyn DocumentExtractor>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn JobNotifier>,
    config: ExtractionConfig,
    queue: RetryQueue,
}

impl ExtractionJobManager {
    pub fn new(
        store: Arc<dyn CertificateStore>,
        extractor: Arc<dyn DocumentExtractor>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn JobNotifier>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            clock,
            notifier,
            config,
            queue: RetryQueue::new(),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn CertificateStore {
        self.store.as_ref()
    }

    pub fn queue(&self) -> &RetryQueue {
        &self.queue
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Persists a freshly uploaded certificate as `pending` and queues its
    /// first attempt. With extraction disabled the record is stored but
    /// nothing is queued; a later resumption picks it up.
    pub fn schedule_upload(&self, mut certificate: Certificate) -> Result<Certificate, JobError> {
        certificate.processing_status = ProcessingStatus::Pending;
        certificate.retry_count = 0;
        certificate.max_retries = self.config.max_retries;
        certificate.next_retry_at = None;
        certificate.last_error = None;
        self.store.insert(&certificate)?;

        tracing::info!(
            certificate_id = %certificate.id,
            entity_type = %certificate.entity_type,
            "Certificate registered for extraction"
        );
        self.emit(&certificate, None);

        if self.config.enabled {
            self.queue.schedule(&certificate.id, self.clock.now());
        } else {
            tracing::debug!(certificate_id = %certificate.id, "Extraction disabled, not queued");
        }
        Ok(certificate)
    }

    /// Manual retry: resets the attempt budget and runs again as soon as
    /// the worker wakes. Refused while an attempt is in flight.
    pub fn request_retry(&self, id: &str) -> Result<Certificate, JobError> {
        let mut certificate = self
            .store
            .get(id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if certificate.processing_status == ProcessingStatus::Processing {
            return Err(JobError::AlreadyProcessing(id.to_string()));
        }

        let patch = CertificatePatch::status(ProcessingStatus::Pending)
            .with_retry_count(0)
            .with_last_error(None)
            .with_next_retry_at(None);
        let expected = [certificate.processing_status];
        if !self.store.update_if_status(id, &expected, &patch)? {
            // Lost a race; the record moved on underneath us.
            return match self.store.get(id)? {
                None => Err(JobError::NotFound(id.to_string())),
                Some(_) => Err(JobError::AlreadyProcessing(id.to_string())),
            };
        }
        certificate.apply(&patch);

        tracing::info!(certificate_id = %id, "Manual extraction retry requested");
        self.emit(&certificate, None);

        if self.config.enabled {
            self.queue.schedule(id, self.clock.now());
        }
        Ok(certificate)
    }

    /// Runs one extraction attempt for `id`.
    ///
    /// Deleted certificates, certificates not in a startable state, and
    /// certificates another worker claimed first are skipped.
    pub fn process(&self, id: &str) -> Result<JobOutcome, JobError> {
        let Some(mut certificate) = self.store.get(id)? else {
            tracing::debug!(certificate_id = %id, "Certificate gone, skipping attempt");
            return Ok(JobOutcome::Skipped);
        };

        let from = certificate.processing_status;
        if !from.can_start_attempt() {
            tracing::debug!(certificate_id = %id, status = %from, "Not startable, skipping attempt");
            return Ok(JobOutcome::Skipped);
        }

        let started_at = self.clock.now();
        let claim = CertificatePatch::status(ProcessingStatus::Processing).with_last_attempt_at(started_at);
        if !self.store.update_if_status(id, &[from], &claim)? {
            tracing::debug!(certificate_id = %id, "Attempt claimed elsewhere, skipping");
            return Ok(JobOutcome::Skipped);
        }
        certificate.apply(&claim);
        self.emit(&certificate, None);

        let attempt = certificate.retry_count + 1;
        tracing::info!(certificate_id = %id, attempt, "Extraction attempt started");

        match self.extractor.extract(certificate.image_ref(), certificate.entity_type) {
            Ok(data) => self.complete(certificate, data),
            Err(e) => self.fail_attempt(certificate, e.to_string()),
        }
    }

    fn complete(&self, mut certificate: Certificate, data: serde_json::Value) -> Result<JobOutcome, JobError> {
        let patch = CertificatePatch::status(ProcessingStatus::Completed)
            .with_retry_count(0)
            .with_next_retry_at(None)
            .with_last_error(None)
            .with_extracted_data(data, self.clock.now());

        if !self.commit(&certificate.id, &patch)? {
            return Ok(JobOutcome::Skipped);
        }
        certificate.apply(&patch);

        tracing::info!(certificate_id = %certificate.id, status = "completed", "Extraction completed");
        self.emit(&certificate, None);
        Ok(JobOutcome::Completed)
    }

    fn fail_attempt(&self, mut certificate: Certificate, error: String) -> Result<JobOutcome, JobError> {
        let now = self.clock.now();
        let retry_count = certificate.retry_count + 1;

        if retry_count < certificate.max_retries {
            let delay = self.config.retry_delay(certificate.retry_count);
            let next_retry_at = now + delay;
            let patch = CertificatePatch::status(ProcessingStatus::Retrying)
                .with_retry_count(retry_count)
                .with_next_retry_at(Some(next_retry_at))
                .with_last_error(Some(error.clone()));

            if !self.commit(&certificate.id, &patch)? {
                return Ok(JobOutcome::Skipped);
            }
            certificate.apply(&patch);

            tracing::warn!(
                certificate_id = %certificate.id,
                attempt = retry_count,
                delay_secs = delay.num_seconds(),
                error = %error,
                "Extraction failed, retry scheduled"
            );
            self.emit(&certificate, Some(error));
            self.queue.schedule(&certificate.id, next_retry_at);

            return Ok(JobOutcome::Retrying {
                retry_count,
                next_retry_at,
            });
        }

        let patch = CertificatePatch::status(ProcessingStatus::Failed)
            .with_retry_count(retry_count)
            .with_next_retry_at(None)
            .with_last_error(Some(error.clone()))
            .with_failed_at(now);

        if !self.commit(&certificate.id, &patch)? {
            return Ok(JobOutcome::Skipped);
        }
        certificate.apply(&patch);

        tracing::warn!(
            certificate_id = %certificate.id,
            attempt = retry_count,
            error = %error,
            "Extraction failed permanently"
        );
        self.emit(&certificate, Some(error));
        Ok(JobOutcome::Failed { retry_count })
    }

    /// Writes the outcome of an attempt, but only over our own claim.
    /// False when the certificate was deleted mid-attempt.
    fn commit(&self, id: &str, patch: &CertificatePatch) -> Result<bool, JobError> {
        let written = self
            .store
            .update_if_status(id, &[ProcessingStatus::Processing], patch)?;
        if !written {
            tracing::debug!(certificate_id = %id, "Certificate changed during attempt, outcome dropped");
        }
        Ok(written)
    }

    /// Resumes the jobs of one entity (on screen mount).
    pub fn resume_entity(&self, entity_type: EntityType, entity_id: &str) -> Result<ResumeReport, JobError> {
        if !self.config.enabled {
            return Ok(ResumeReport::default());
        }
        let certificates = self.store.get_for_entity(entity_type, entity_id)?;
        self.resume(certificates)
    }

    /// Resumes every unfinished job (on start).
    pub fn resume_all(&self) -> Result<ResumeReport, JobError> {
        if !self.config.enabled {
            tracing::info!("Certificate extraction disabled, skipping resumption");
            return Ok(ResumeReport::default());
        }
        let certificates = self.store.list_by_status(&RESUMABLE)?;
        let report = self.resume(certificates)?;
        tracing::info!(
            started = report.started,
            rearmed = report.rearmed,
            recovered = report.recovered,
            "Extraction jobs resumed"
        );
        Ok(report)
    }

    fn resume(&self, certificates: Vec<Certificate>) -> Result<ResumeReport, JobError> {
        let now = self.clock.now();
        let stale_secs = i64::try_from(self.config.stale_processing_secs).unwrap_or(i64::MAX);
        let mut report = ResumeReport::default();

        for certificate in certificates {
            let id = certificate.id.as_str();
            match certificate.processing_status {
                ProcessingStatus::Pending => {
                    self.queue.schedule(id, now);
                    report.started += 1;
                }
                ProcessingStatus::Retrying => match certificate.next_retry_at {
                    Some(at) if at > now => {
                        self.queue.schedule(id, at);
                        report.rearmed += 1;
                    }
                    _ => {
                        self.queue.schedule(id, now);
                        report.started += 1;
                    }
                },
                ProcessingStatus::Processing => {
                    let abandoned = certificate
                        .last_attempt_at
                        .map_or(true, |at| (now - at).num_seconds() >= stale_secs);
                    if !abandoned {
                        continue;
                    }
                    let patch = CertificatePatch::status(ProcessingStatus::Pending);
                    if self.store.update_if_status(id, &[ProcessingStatus::Processing], &patch)? {
                        tracing::warn!(certificate_id = %id, "Recovered abandoned extraction attempt");
                        self.queue.schedule(id, now);
                        report.recovered += 1;
                    }
                }
                _ => {}
            }
        }
        Ok(report)
    }

    /// Runs every queued attempt that is due, one after another.
    ///
    /// A store failure on one certificate is logged and does not stop the
    /// others; that certificate is picked up again by the next resumption.
    pub fn run_due(&self) -> Vec<(String, JobOutcome)> {
        if !self.config.enabled {
            return Vec::new();
        }
        let mut outcomes = Vec::new();
        for id in self.queue.take_due(self.clock.now()) {
            match self.process(&id) {
                Ok(outcome) => outcomes.push((id, outcome)),
                Err(e) => {
                    tracing::error!(certificate_id = %id, error = %e, "Extraction attempt aborted");
                }
            }
        }
        outcomes
    }

    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.queue.next_due_at()
    }

    /// How long the worker may sleep before something could be due.
    pub fn idle_wait(&self) -> StdDuration {
        let poll = StdDuration::from_secs(self.config.poll_interval_secs.max(1));
        match self.next_due_at() {
            Some(at) => (at - self.clock.now()).to_std().unwrap_or(StdDuration::ZERO).min(poll),
            None => poll,
        }
    }

    /// Forgets queued work for a certificate that is being deleted.
    pub fn forget(&self, id: &str) {
        self.queue.remove(id);
    }

    fn emit(&self, certificate: &Certificate, error: Option<String>) {
        let event = JobEvent {
            certificate_id: certificate.id.clone(),
            status: certificate.processing_status,
            retry_count: certificate.retry_count,
            next_retry_at: certificate.next_retry_at,
            error,
        };
        if let Err(e) = self.notifier.notify(&event) {
            tracing::warn!(certificate_id = %certificate.id, error = %e, "Job notification not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::certificate_extraction::store::SqliteCertificateStore;
    use crate::pipeline::certificate_extraction::traits::mocks::{RecordingNotifier, ScriptedExtractor};
    use crate::pipeline::certificate_extraction::traits::ManualClock;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    struct Harness {
        manager: ExtractionJobManager,
        store: Arc<SqliteCertificateStore>,
        extractor: Arc<ScriptedExtractor>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
    }

    fn harness(extractor: ScriptedExtractor, config: ExtractionConfig) -> Harness {
        harness_with(extractor, RecordingNotifier::default(), config)
    }

    fn harness_with(extractor: ScriptedExtractor, notifier: RecordingNotifier, config: ExtractionConfig) -> Harness {
        let store = Arc::new(SqliteCertificateStore::in_memory().unwrap());
        let extractor = Arc::new(extractor);
        let clock = Arc::new(ManualClock::new(start()));
        let notifier = Arc::new(notifier);
        let manager = ExtractionJobManager::new(
            store.clone(),
            extractor.clone(),
            clock.clone(),
            notifier.clone(),
            config,
        );
        Harness {
            manager,
            store,
            extractor,
            clock,
            notifier,
        }
    }

    fn upload(h: &Harness, id: &str) -> Certificate {
        h.manager
            .schedule_upload(Certificate::new(id, EntityType::Horse, "h1", format!("{id}.jpg")))
            .unwrap()
    }

    fn stored(h: &Harness, id: &str) -> Certificate {
        h.store.get(id).unwrap().unwrap()
    }

    #[test]
    fn upload_is_pending_and_queued_now() {
        let h = harness(ScriptedExtractor::always_failing(), ExtractionConfig::default());
        let cert = upload(&h, "c1");

        assert_eq!(cert.processing_status, ProcessingStatus::Pending);
        assert_eq!(stored(&h, "c1").processing_status, ProcessingStatus::Pending);
        assert_eq!(h.manager.next_due_at(), Some(start()));
        assert_eq!(h.extractor.calls(), 0);
    }

    #[test]
    fn successful_attempt_completes() {
        let h = harness(
            ScriptedExtractor::new(vec![Ok(json!({"document_type": "Hestepas"}))]),
            ExtractionConfig::default(),
        );
        upload(&h, "c1");

        let outcomes = h.manager.run_due();
        assert_eq!(outcomes, vec![("c1".to_string(), JobOutcome::Completed)]);

        let cert = stored(&h, "c1");
        assert_eq!(cert.processing_status, ProcessingStatus::Completed);
        assert!(cert.has_extracted_data);
        assert_eq!(cert.extracted_data.unwrap()["document_type"], "Hestepas");
        assert_eq!(cert.extracted_at, Some(start()));
        assert_eq!(cert.last_attempt_at, Some(start()));
        assert_eq!(cert.retry_count, 0);
        assert!(cert.last_error.is_none());

        assert_eq!(
            h.notifier.statuses(),
            vec![ProcessingStatus::Pending, ProcessingStatus::Processing, ProcessingStatus::Completed]
        );
    }

    #[test]
    fn backoff_sequence_ends_in_failure() {
        let h = harness(ScriptedExtractor::always_failing(), ExtractionConfig::default());
        upload(&h, "c1");

        // attempt 1 → retry in 60s
        let first = h.manager.run_due();
        assert_eq!(
            first[0].1,
            JobOutcome::Retrying {
                retry_count: 1,
                next_retry_at: start() + Duration::seconds(60)
            }
        );
        let cert = stored(&h, "c1");
        assert_eq!(cert.processing_status, ProcessingStatus::Retrying);
        assert_eq!(cert.retry_count, 1);
        assert!(cert.last_error.is_some());

        // not yet due
        h.clock.advance(Duration::seconds(59));
        assert!(h.manager.run_due().is_empty());

        // attempt 2 → retry in 120s
        h.clock.advance(Duration::seconds(1));
        let second = h.manager.run_due();
        let expected_next = start() + Duration::seconds(60) + Duration::seconds(120);
        assert_eq!(
            second[0].1,
            JobOutcome::Retrying {
                retry_count: 2,
                next_retry_at: expected_next
            }
        );
        assert_eq!(stored(&h, "c1").next_retry_at, Some(expected_next));

        // attempt 3 → failed
        h.clock.set(expected_next);
        let third = h.manager.run_due();
        assert_eq!(third[0].1, JobOutcome::Failed { retry_count: 3 });

        let cert = stored(&h, "c1");
        assert_eq!(cert.processing_status, ProcessingStatus::Failed);
        assert_eq!(cert.failed_at, Some(expected_next));
        assert!(cert.next_retry_at.is_none());
        assert_eq!(h.extractor.calls(), 3);
        assert!(h.manager.queue().is_empty());
    }

    #[test]
    fn failure_then_success_resets_retry_state() {
        let h = harness(
            ScriptedExtractor::new(vec![Err("model loading".into()), Ok(json!({"ok": true}))]),
            ExtractionConfig::default(),
        );
        upload(&h, "c1");
        h.manager.run_due();
        h.clock.advance(Duration::seconds(60));
        h.manager.run_due();

        let cert = stored(&h, "c1");
        assert_eq!(cert.processing_status, ProcessingStatus::Completed);
        assert_eq!(cert.retry_count, 0);
        assert!(cert.next_retry_at.is_none());
        assert!(cert.last_error.is_none());
    }

    #[test]
    fn elapsed_retry_is_resumed_immediately() {
        let h = harness(
            ScriptedExtractor::new(vec![Err("timeout".into()), Ok(json!({}))]),
            ExtractionConfig::default(),
        );
        upload(&h, "c1");
        h.manager.run_due();
        assert_eq!(stored(&h, "c1").processing_status, ProcessingStatus::Retrying);

        // simulate a restart: the queue is lost, the record survives
        h.manager.forget("c1");
        h.clock.advance(Duration::minutes(10));

        let report = h.manager.resume_entity(EntityType::Horse, "h1").unwrap();
        assert_eq!(report.started, 1);
        h.manager.run_due();
        assert_eq!(stored(&h, "c1").processing_status, ProcessingStatus::Completed);
    }

    #[test]
    fn restarted_manager_completes_elapsed_retry() {
        let h = harness(ScriptedExtractor::always_failing(), ExtractionConfig::default());
        upload(&h, "c1");
        h.manager.run_due();
        assert_eq!(stored(&h, "c1").processing_status, ProcessingStatus::Retrying);
        drop(h.manager);

        h.clock.advance(Duration::minutes(10));
        let extractor = Arc::new(ScriptedExtractor::new(vec![Ok(json!({"document_type": "Vognkort"}))]));
        let notifier = Arc::new(RecordingNotifier::default());
        let restarted = ExtractionJobManager::new(
            h.store.clone(),
            extractor.clone(),
            h.clock.clone(),
            notifier.clone(),
            ExtractionConfig::default(),
        );
        assert!(restarted.queue().is_empty());

        let report = restarted.resume_all().unwrap();
        assert_eq!(report, ResumeReport { started: 1, rearmed: 0, recovered: 0 });

        let outcomes = restarted.run_due();
        assert_eq!(outcomes, vec![("c1".to_string(), JobOutcome::Completed)]);
        assert_eq!(extractor.calls(), 1);
        assert_eq!(
            notifier.statuses(),
            vec![ProcessingStatus::Processing, ProcessingStatus::Completed]
        );

        let cert = h.store.get("c1").unwrap().unwrap();
        assert_eq!(cert.processing_status, ProcessingStatus::Completed);
        assert_eq!(cert.extracted_data.unwrap()["document_type"], "Vognkort");
        assert_eq!(cert.retry_count, 0);
        assert!(cert.next_retry_at.is_none());
    }

    #[test]
    fn future_retry_is_rearmed_not_run() {
        let h = harness(ScriptedExtractor::always_failing(), ExtractionConfig::default());
        upload(&h, "c1");
        h.manager.run_due();
        h.manager.forget("c1");

        let report = h.manager.resume_all().unwrap();
        assert_eq!(report, ResumeReport { started: 0, rearmed: 1, recovered: 0 });
        assert_eq!(h.manager.next_due_at(), Some(start() + Duration::seconds(60)));
        assert!(h.manager.run_due().is_empty());
    }

    #[test]
    fn abandoned_processing_is_recovered() {
        let h = harness(ScriptedExtractor::new(vec![Ok(json!({}))]), ExtractionConfig::default());
        let mut cert = Certificate::new("c1", EntityType::Vehicle, "v1", "vognkort.jpg");
        cert.processing_status = ProcessingStatus::Processing;
        cert.last_attempt_at = Some(start() - Duration::hours(1));
        h.store.insert(&cert).unwrap();

        let mut fresh = Certificate::new("c2", EntityType::Vehicle, "v1", "kort.jpg");
        fresh.processing_status = ProcessingStatus::Processing;
        fresh.last_attempt_at = Some(start() - Duration::seconds(30));
        h.store.insert(&fresh).unwrap();

        let report = h.manager.resume_all().unwrap();
        assert_eq!(report.recovered, 1);
        assert_eq!(report.total(), 1);

        h.manager.run_due();
        assert_eq!(stored(&h, "c1").processing_status, ProcessingStatus::Completed);
        assert_eq!(stored(&h, "c2").processing_status, ProcessingStatus::Processing);
    }

    #[test]
    fn kill_switch_leaves_state_untouched() {
        let config = ExtractionConfig {
            enabled: false,
            ..ExtractionConfig::default()
        };
        let h = harness(ScriptedExtractor::new(vec![Ok(json!({}))]), config);
        upload(&h, "c1");

        assert!(h.manager.queue().is_empty());
        assert_eq!(h.manager.resume_all().unwrap(), ResumeReport::default());
        assert_eq!(h.manager.resume_entity(EntityType::Horse, "h1").unwrap().total(), 0);
        assert!(h.manager.run_due().is_empty());
        assert_eq!(stored(&h, "c1").processing_status, ProcessingStatus::Pending);
        assert_eq!(h.extractor.calls(), 0);
    }

    #[test]
    fn deleted_certificate_retry_is_a_no_op() {
        let h = harness(ScriptedExtractor::always_failing(), ExtractionConfig::default());
        upload(&h, "c1");
        h.manager.run_due();

        h.store.delete("c1").unwrap();
        h.clock.advance(Duration::seconds(60));

        let outcomes = h.manager.run_due();
        assert_eq!(outcomes, vec![("c1".to_string(), JobOutcome::Skipped)]);
        assert_eq!(h.extractor.calls(), 1);
    }

    #[test]
    fn process_refuses_claimed_or_finished_certificates() {
        let h = harness(ScriptedExtractor::new(vec![Ok(json!({}))]), ExtractionConfig::default());
        let mut busy = Certificate::new("busy", EntityType::Horse, "h1", "a.jpg");
        busy.processing_status = ProcessingStatus::Processing;
        h.store.insert(&busy).unwrap();

        let mut done = Certificate::new("done", EntityType::Horse, "h1", "b.jpg");
        done.processing_status = ProcessingStatus::Completed;
        h.store.insert(&done).unwrap();

        assert_eq!(h.manager.process("busy").unwrap(), JobOutcome::Skipped);
        assert_eq!(h.manager.process("done").unwrap(), JobOutcome::Skipped);
        assert_eq!(h.manager.process("missing").unwrap(), JobOutcome::Skipped);
        assert_eq!(h.extractor.calls(), 0);
    }

    #[test]
    fn manual_retry_resets_failed_certificate() {
        let config = ExtractionConfig {
            max_retries: 1,
            ..ExtractionConfig::default()
        };
        let h = harness(
            ScriptedExtractor::new(vec![Err("bad image".into()), Ok(json!({"x": 1}))]),
            config,
        );
        upload(&h, "c1");
        assert_eq!(h.manager.run_due()[0].1, JobOutcome::Failed { retry_count: 1 });

        let cert = h.manager.request_retry("c1").unwrap();
        assert_eq!(cert.processing_status, ProcessingStatus::Pending);
        assert_eq!(cert.retry_count, 0);
        assert!(cert.last_error.is_none());
        assert_eq!(h.manager.next_due_at(), Some(start()));

        h.manager.run_due();
        assert_eq!(stored(&h, "c1").processing_status, ProcessingStatus::Completed);
    }

    #[test]
    fn manual_retry_rejected_while_processing() {
        let h = harness(ScriptedExtractor::always_failing(), ExtractionConfig::default());
        let mut cert = Certificate::new("c1", EntityType::Horse, "h1", "a.jpg");
        cert.processing_status = ProcessingStatus::Processing;
        h.store.insert(&cert).unwrap();

        assert!(matches!(h.manager.request_retry("c1"), Err(JobError::AlreadyProcessing(_))));
        assert!(matches!(h.manager.request_retry("nope"), Err(JobError::NotFound(_))));
    }

    #[test]
    fn notification_failure_does_not_fail_transition() {
        let h = harness_with(
            ScriptedExtractor::new(vec![Ok(json!({}))]),
            RecordingNotifier::failing(),
            ExtractionConfig::default(),
        );
        upload(&h, "c1");
        assert_eq!(h.manager.run_due()[0].1, JobOutcome::Completed);
        assert_eq!(h.notifier.statuses().len(), 3);
    }

    #[test]
    fn idle_wait_is_bounded_by_poll_interval_and_next_due() {
        let h = harness(ScriptedExtractor::always_failing(), ExtractionConfig::default());
        assert_eq!(h.manager.idle_wait(), StdDuration::from_secs(5));

        upload(&h, "c1");
        assert_eq!(h.manager.idle_wait(), StdDuration::ZERO);

        h.manager.run_due();
        h.clock.advance(Duration::seconds(58));
        assert_eq!(h.manager.idle_wait(), StdDuration::from_secs(2));
    }
}
