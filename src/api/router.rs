//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! Layers (outermost first): request tracing, permissive CORS,
//! `Cache-Control: no-store`.

use std::sync::Arc;

use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/requirements", post(endpoints::compliance::requirements))
        .route("/compliance/auto-confirm", post(endpoints::compliance::auto_confirm))
        .route("/compliance/evaluate", post(endpoints::compliance::evaluate))
        .route("/transports/check", post(endpoints::transports::check))
        .route("/certificates", post(endpoints::certificates::create))
        .route(
            "/entities/:entity_type/:entity_id/certificates",
            get(endpoints::certificates::list_for_entity),
        )
        .route("/certificates/:id/retry", post(endpoints::certificates::retry))
        .route("/certificates/:id", delete(endpoints::certificates::delete))
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
