//! Shared application state.
//!
//! `CoreState` owns the requirement catalog and the extraction job manager,
//! and is shared by the HTTP API and the background worker.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::compliance::{CatalogError, CertificateMatcher, RequirementCatalog, RequirementEngine};
use crate::config::AppConfig;
use crate::db::DatabaseError;
use crate::pipeline::certificate_extraction::{
    start_extraction_worker, ExtractionJobManager, ExtractionWorkerHandle, ExtractorError, JobError,
    LogNotifier, OllamaVisionExtractor, ResumeReport, SqliteCertificateStore, SystemClock,
};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Extractor setup failed: {0}")]
    Extractor(#[from] ExtractorError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Storage directory {path}: {reason}")]
    Storage { path: String, reason: String },

    #[error("Lock poisoned")]
    LockPoisoned,
}

pub struct CoreState {
    catalog: Arc<RequirementCatalog>,
    engine: RequirementEngine,
    matcher: CertificateMatcher,
    manager: Arc<ExtractionJobManager>,
    worker: Mutex<Option<ExtractionWorkerHandle>>,
}

impl CoreState {
    pub fn new(catalog: Arc<RequirementCatalog>, manager: Arc<ExtractionJobManager>) -> Self {
        Self {
            engine: RequirementEngine::new(catalog.clone()),
            matcher: CertificateMatcher::new(catalog.clone()),
            catalog,
            manager,
            worker: Mutex::new(None),
        }
    }

    /// Wires the production collaborators described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let catalog = match &config.catalog.path {
            Some(path) => RequirementCatalog::load(path)?,
            None => RequirementCatalog::bundled()?,
        };

        let storage_dir = &config.storage.storage_dir;
        std::fs::create_dir_all(storage_dir).map_err(|e| CoreError::Storage {
            path: storage_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let store = SqliteCertificateStore::open(&config.storage.database_path)?;
        let extractor = OllamaVisionExtractor::new(
            &config.ollama.base_url,
            &config.ollama.model,
            storage_dir.clone(),
            config.ollama.timeout_secs,
        )?;

        tracing::info!(
            database = %config.storage.database_path.display(),
            model = %config.ollama.model,
            extraction_enabled = config.extraction.enabled,
            "Core state initialised"
        );

        let manager = ExtractionJobManager::new(
            Arc::new(store),
            Arc::new(extractor),
            Arc::new(SystemClock),
            Arc::new(LogNotifier),
            config.extraction.clone(),
        );
        Ok(Self::new(Arc::new(catalog), Arc::new(manager)))
    }

    pub fn catalog(&self) -> &RequirementCatalog {
        &self.catalog
    }

    pub fn engine(&self) -> &RequirementEngine {
        &self.engine
    }

    pub fn matcher(&self) -> &CertificateMatcher {
        &self.matcher
    }

    pub fn manager(&self) -> &Arc<ExtractionJobManager> {
        &self.manager
    }

    /// Resumes unfinished jobs and starts the worker thread. No-op when
    /// already running.
    pub fn start_worker(&self) -> Result<ResumeReport, CoreError> {
        let mut worker = self.worker.lock().map_err(|_| CoreError::LockPoisoned)?;
        if worker.is_some() {
            return Ok(ResumeReport::default());
        }
        let report = self.manager.resume_all()?;
        *worker = Some(start_extraction_worker(self.manager.clone()));
        Ok(report)
    }

    /// Stops the worker, waiting for an in-flight attempt to finish.
    pub fn stop_worker(&self) {
        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(handle);
    }

    pub fn worker_running(&self) -> bool {
        self.worker
            .lock()
            .map(|w| w.as_ref().is_some_and(|h| h.is_running()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::pipeline::certificate_extraction::traits::mocks::{RecordingNotifier, ScriptedExtractor};
    use crate::pipeline::certificate_extraction::{ExtractionConfig, ManualClock};
    use chrono::{TimeZone, Utc};

    pub struct TestCore {
        pub core: Arc<CoreState>,
        pub store: Arc<SqliteCertificateStore>,
        pub clock: Arc<ManualClock>,
    }

    /// In-memory core with a scripted extractor and a clock fixed at
    /// 2026-10-16 08:00 UTC.
    pub fn test_core(extractor: ScriptedExtractor, config: ExtractionConfig) -> TestCore {
        let store = Arc::new(SqliteCertificateStore::in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()));
        let manager = ExtractionJobManager::new(
            store.clone(),
            Arc::new(extractor),
            clock.clone(),
            Arc::new(RecordingNotifier::default()),
            config,
        );
        let catalog = Arc::new(RequirementCatalog::bundled().unwrap());
        TestCore {
            core: Arc::new(CoreState::new(catalog, Arc::new(manager))),
            store,
            clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::test_core;
    use super::*;
    use crate::models::enums::EntityType;
    use crate::models::Certificate;
    use crate::pipeline::certificate_extraction::traits::mocks::ScriptedExtractor;
    use crate::pipeline::certificate_extraction::{CertificateStore, ExtractionConfig};

    #[test]
    fn from_config_builds_file_backed_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.database_path = dir.path().join("db").join("equiroute.db");
        config.storage.storage_dir = dir.path().join("certificates");

        let core = CoreState::from_config(&config).unwrap();
        assert!(config.storage.storage_dir.is_dir());
        assert_eq!(core.catalog().version(), "2026.10.1");
        assert!(!core.worker_running());
    }

    #[test]
    fn from_config_reports_bad_catalog_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.database_path = dir.path().join("equiroute.db");
        config.storage.storage_dir = dir.path().join("certificates");
        config.catalog.path = Some(dir.path().join("missing.json"));

        assert!(matches!(CoreState::from_config(&config), Err(CoreError::Catalog(_))));
    }

    #[test]
    fn start_worker_resumes_pending_jobs_once() {
        let t = test_core(ScriptedExtractor::always_failing(), ExtractionConfig::default());
        let mut pending = Certificate::new("c1", EntityType::Horse, "h1", "pass.jpg");
        pending.processing_status = crate::models::enums::ProcessingStatus::Pending;
        t.store.insert(&pending).unwrap();

        let report = t.core.start_worker().unwrap();
        assert_eq!(report.started, 1);
        assert!(t.core.worker_running());

        assert_eq!(t.core.start_worker().unwrap(), ResumeReport::default());

        t.core.stop_worker();
        assert!(!t.core.worker_running());
    }
}
