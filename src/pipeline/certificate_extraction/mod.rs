//! Background AI extraction of uploaded certificates.
//!
//! Each certificate carries its own job state (status, retry counters and
//! timestamps). `ExtractionJobManager` drives the state machine, a delayed
//! queue holds scheduled attempts, and a worker thread drains it.

pub mod background;
pub mod error;
pub mod manager;
pub mod queue;
pub mod store;
pub mod traits;
pub mod types;
pub mod vision;

pub use background::{start_extraction_worker, ExtractionWorkerHandle};
pub use error::{ExtractorError, JobError};
pub use manager::ExtractionJobManager;
pub use queue::RetryQueue;
pub use store::SqliteCertificateStore;
pub use traits::*;
pub use types::*;
pub use vision::{OllamaVisionExtractor, DEFAULT_VISION_MODEL};
