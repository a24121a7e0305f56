use thiserror::Error;

use crate::db::DatabaseError;

/// Failures of the AI extraction collaborator. All of them are retryable.
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Cannot connect to Ollama at {0}")]
    OllamaConnection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Ollama returned {status}: {body}")]
    OllamaError { status: u16, body: String },

    #[error("Response parsing failed: {0}")]
    ResponseParsing(String),

    #[error("Cannot read image '{path}': {reason}")]
    ImageRead { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Certificate {0} is already being processed")]
    AlreadyProcessing(String),

    #[error("Certificate not found: {0}")]
    NotFound(String),
}
