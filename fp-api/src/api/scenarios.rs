//! Scenario endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::debug;

use crate::api::auth::BearerToken;
use crate::error::{ApiError, ApiResult};
use crate::models::{PredictionResult, ScenarioId};
use crate::AppState;

/// GET /api/v1/scenarios/:scenario_id/predict/floors
///
/// Predicts storey counts for the scenario's living buildings that lack
/// one. Returns every building as GeoJSON plus a summary of predictions.
pub async fn get_predicted_floors(
    State(state): State<AppState>,
    Path(scenario_id): Path<String>,
    token: BearerToken,
) -> ApiResult<Json<PredictionResult>> {
    let scenario_id: ScenarioId = scenario_id.parse().map_err(ApiError::BadRequest)?;
    debug!(scenario_id = scenario_id.get(), "floor prediction requested");

    let outcome = state
        .service
        .predict_floors(scenario_id, token.as_str())
        .await?;

    // GeoJSON assembly is CPU-bound for large scenarios
    let result = state
        .service
        .pool()
        .run(move || Ok(PredictionResult::from(&outcome)))
        .await?;

    Ok(Json(result))
}

/// Build scenario routes
pub fn scenario_routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/scenarios/:scenario_id/predict/floors",
        get(get_predicted_floors),
    )
}
