//! HTTP API.
//!
//! Exposes requirement derivation, compliance evaluation and certificate
//! job control as JSON endpoints under `/api/`. The router is composable:
//! `api_router()` returns a `Router` that can be mounted on any axum server.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
