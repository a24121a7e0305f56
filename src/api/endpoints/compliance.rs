//! Requirement derivation and compliance endpoints.
//!
//! - `POST /api/requirements`: route → requirement set
//! - `POST /api/compliance/auto-confirm`: certificates → confirmed ids
//! - `POST /api/compliance/evaluate`: confirmed ids → verdict

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, EntityRef};
use crate::compliance::{self, ComplianceVerdict, RequirementSet, RouteAttributes};
use crate::models::Certificate;

/// `POST /api/requirements`
pub async fn requirements(
    State(ctx): State<ApiContext>,
    Json(route): Json<RouteAttributes>,
) -> Result<Json<RequirementSet>, ApiError> {
    Ok(Json(ctx.core.engine().derive(&route)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoConfirmRequest {
    pub requirements: RequirementSet,
    /// Certificates supplied inline.
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    /// Entities whose stored certificates are added to the inline ones.
    #[serde(default)]
    pub entities: Vec<EntityRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoConfirmResponse {
    pub confirmed_ids: Vec<String>,
}

/// `POST /api/compliance/auto-confirm`
pub async fn auto_confirm(
    State(ctx): State<ApiContext>,
    Json(req): Json<AutoConfirmRequest>,
) -> Result<Json<AutoConfirmResponse>, ApiError> {
    let mut certificates = req.certificates;
    certificates.extend(ctx.certificates_for(&req.entities)?);

    let confirmed_ids = compliance::auto_confirm(
        ctx.core.matcher(),
        &req.requirements,
        &certificates,
        ctx.core.manager().now(),
    );
    Ok(Json(AutoConfirmResponse { confirmed_ids }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    #[serde(default)]
    pub requirements: Option<RequirementSet>,
    #[serde(default)]
    pub confirmed_ids: Vec<String>,
}

/// `POST /api/compliance/evaluate`
pub async fn evaluate(Json(req): Json<EvaluateRequest>) -> Json<ComplianceVerdict> {
    Json(compliance::evaluate(req.requirements.as_ref(), &req.confirmed_ids))
}
