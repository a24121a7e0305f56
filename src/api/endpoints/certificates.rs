//! Certificate endpoints.
//!
//! - `POST   /api/certificates`: register an upload, schedule extraction
//! - `GET    /api/entities/:entity_type/:entity_id/certificates`: list and resume
//! - `POST   /api/certificates/:id/retry`: manual retry
//! - `DELETE /api/certificates/:id`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_entity_type, ApiContext};
use crate::models::enums::EntityType;
use crate::models::Certificate;
use crate::pipeline::certificate_extraction::ResumeReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCertificateRequest {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub file_name: String,
    #[serde(default)]
    pub storage_ref: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub certificate_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

/// `POST /api/certificates`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(req): Json<CreateCertificateRequest>,
) -> Result<(StatusCode, Json<Certificate>), ApiError> {
    if req.entity_id.trim().is_empty() {
        return Err(ApiError::BadRequest("entityId is required".into()));
    }
    if req.file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("fileName is required".into()));
    }

    let manager = ctx.core.manager();
    let mut certificate = Certificate::new(
        Uuid::new_v4().to_string(),
        req.entity_type,
        req.entity_id,
        req.file_name,
    );
    certificate.storage_ref = req.storage_ref.unwrap_or_default();
    certificate.document_type = req.document_type;
    certificate.certificate_type = req.certificate_type;
    certificate.display_name = req.display_name;
    certificate.expiry_date = req.expiry_date;
    certificate.created_at = manager.now();

    let certificate = manager.schedule_upload(certificate)?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCertificatesResponse {
    pub certificates: Vec<Certificate>,
    pub resumed: ResumeReport,
}

/// `GET /api/entities/:entity_type/:entity_id/certificates`
///
/// Opening an entity's certificate list resumes its unfinished jobs.
pub async fn list_for_entity(
    State(ctx): State<ApiContext>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> Result<Json<EntityCertificatesResponse>, ApiError> {
    let entity_type = parse_entity_type(&entity_type)?;
    let manager = ctx.core.manager();

    let resumed = manager.resume_entity(entity_type, &entity_id)?;
    let certificates = manager.store().get_for_entity(entity_type, &entity_id)?;

    Ok(Json(EntityCertificatesResponse {
        certificates,
        resumed,
    }))
}

/// `POST /api/certificates/:id/retry`
pub async fn retry(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Certificate>, ApiError> {
    Ok(Json(ctx.core.manager().request_retry(&id)?))
}

/// `DELETE /api/certificates/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let manager = ctx.core.manager();
    manager.forget(&id);
    if !manager.store().delete(&id)? {
        return Err(ApiError::NotFound(format!("Certificate {id}")));
    }
    tracing::info!(certificate_id = %id, "Certificate deleted");
    Ok(StatusCode::NO_CONTENT)
}
