//! fp-api library interface
//!
//! Floor Predictor microservice: fills in missing storey counts for the
//! living buildings of an Urban API scenario. Exposes the router and
//! services for the binary and for integration tests.

pub mod api;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, ServiceError, ServiceResult};

use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::metrics::Metrics;
use crate::services::{FloorPredictorService, UrbanApi};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FloorPredictorService>,
    /// Same client the service uses, for liveness checks
    pub urban_api: Arc<dyn UrbanApi>,
    pub metrics: Arc<Metrics>,
    /// Detailed error bodies
    pub debug: bool,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        service: Arc<FloorPredictorService>,
        urban_api: Arc<dyn UrbanApi>,
        metrics: Arc<Metrics>,
        debug: bool,
    ) -> Self {
        Self {
            service,
            urban_api,
            metrics,
            debug,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::scenario_routes())
        .merge(api::health_routes())
        .layer(CatchPanicLayer::custom(api::handle_panic))
        .layer(middleware::from_fn_with_state(state.clone(), api::handle_errors))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.metrics),
            api::track_metrics,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /metrics
async fn render_metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render(),
    )
}

/// Build the metrics exposition router, served on its own port
pub fn build_metrics_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}
