//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub catalog_version: String,
    pub extraction_enabled: bool,
    pub queued_jobs: usize,
}

/// `GET /api/health`
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let manager = ctx.core.manager();

    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        catalog_version: ctx.core.catalog().version().to_string(),
        extraction_enabled: manager.config().enabled,
        queued_jobs: manager.queue().len(),
    }))
}
