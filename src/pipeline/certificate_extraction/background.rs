//! Background extraction worker.
//!
//! One thread drains the manager's retry queue: it runs whatever is due,
//! then sleeps until the next due time, the poll interval, or a wake from
//! an upload, retry request or shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::manager::ExtractionJobManager;

/// Handle for the extraction worker thread.
///
/// Shuts the worker down on `Drop`; an attempt already running completes first.
pub struct ExtractionWorkerHandle {
    shutdown: Arc<AtomicBool>,
    manager: Arc<ExtractionJobManager>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ExtractionWorkerHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.manager.queue().wake();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ExtractionWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

pub fn start_extraction_worker(manager: Arc<ExtractionJobManager>) -> ExtractionWorkerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let worker_manager = manager.clone();

    let handle = std::thread::spawn(move || {
        tracing::info!(
            poll_interval_secs = worker_manager.config().poll_interval_secs,
            "Certificate extraction worker started"
        );
        worker_loop(&worker_manager, &flag);
        tracing::info!("Certificate extraction worker shutting down");
    });

    ExtractionWorkerHandle {
        shutdown,
        manager,
        handle: Some(handle),
    }
}

fn worker_loop(manager: &ExtractionJobManager, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        let outcomes = manager.run_due();
        if !outcomes.is_empty() {
            tracing::debug!(attempts = outcomes.len(), "Extraction batch drained");
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        manager.queue().wait(manager.idle_wait());
    }
}
