//! Transport creation gate.

use std::collections::HashSet;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, EntityRef};
use crate::compliance::{self, ComplianceVerdict, GateOptions, RequirementDocument, RequirementSet, RouteAttributes};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportCheckRequest {
    pub route: RouteAttributes,
    #[serde(default)]
    pub entities: Vec<EntityRef>,
    /// Documents the user ticked off by hand.
    #[serde(default)]
    pub manual_confirmed_ids: Vec<String>,
    #[serde(default)]
    pub synthesize_border_document: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportCheckResponse {
    pub allowed: bool,
    pub requirements: RequirementSet,
    pub auto_confirmed_ids: Vec<String>,
    pub verdict: ComplianceVerdict,
    pub blocking: Vec<RequirementDocument>,
}

/// `POST /api/transports/check`: 200 when the transport may be created,
/// 409 with the same body when documents are missing.
pub async fn check(
    State(ctx): State<ApiContext>,
    Json(req): Json<TransportCheckRequest>,
) -> Result<(StatusCode, Json<TransportCheckResponse>), ApiError> {
    let requirements = ctx.core.engine().derive(&req.route);
    let certificates = ctx.certificates_for(&req.entities)?;
    let auto_confirmed_ids = compliance::auto_confirm(
        ctx.core.matcher(),
        &requirements,
        &certificates,
        ctx.core.manager().now(),
    );

    let mut seen = HashSet::new();
    let confirmed: Vec<String> = auto_confirmed_ids
        .iter()
        .chain(req.manual_confirmed_ids.iter())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let options = GateOptions {
        synthesize_border_document: req.synthesize_border_document,
    };
    let decision = compliance::check_transport(Some(&requirements), &confirmed, options);

    tracing::info!(
        allowed = decision.allowed,
        missing = decision.verdict.missing.len(),
        blocking = decision.blocking.len(),
        "Transport compliance checked"
    );

    let status = if decision.allowed {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    Ok((
        status,
        Json(TransportCheckResponse {
            allowed: decision.allowed,
            requirements,
            auto_confirmed_ids,
            verdict: decision.verdict,
            blocking: decision.blocking,
        }),
    ))
}
