//! Floor prediction pipeline
//!
//! fetch → parse → infer → merge → summarise, strictly in that order.
//! Parsing and inference run on the [`ComputePool`]; everything else stays
//! on the async runtime. Errors from any step propagate unchanged.

use anyhow::anyhow;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::models::{BuildingPartition, PredictionOutcome, PredictionSummaryRow, ScenarioId};
use crate::services::compute_pool::ComputePool;
use crate::services::data_parser::FeatureParser;
use crate::services::model::PredictionModel;
use crate::services::urban_api::UrbanApi;

/// Round a model estimate to a storey count
///
/// Ties go to the even neighbour (2.5 → 2, 3.5 → 4); negative results are
/// clamped to zero. NaN and infinities are rejected.
pub fn round_storey(estimate: f64) -> ServiceResult<u32> {
    if !estimate.is_finite() {
        return Err(anyhow!("model produced a non-finite estimate: {}", estimate).into());
    }
    let rounded = estimate.round_ties_even().max(0.0);
    if rounded > f64::from(u32::MAX) {
        return Err(anyhow!("model estimate {} is out of range", estimate).into());
    }
    Ok(rounded as u32)
}

/// Coordinates the Urban API client, feature parser and model
pub struct FloorPredictorService {
    urban_api: Arc<dyn UrbanApi>,
    parser: Arc<dyn FeatureParser>,
    model: Arc<dyn PredictionModel>,
    pool: ComputePool,
    min_buildings: Option<usize>,
}

impl FloorPredictorService {
    pub fn new(
        urban_api: Arc<dyn UrbanApi>,
        parser: Arc<dyn FeatureParser>,
        model: Arc<dyn PredictionModel>,
        pool: ComputePool,
    ) -> Self {
        Self {
            urban_api,
            parser,
            model,
            pool,
            min_buildings: None,
        }
    }

    /// Require at least `min_buildings` valid buildings per scenario
    pub fn with_min_buildings(mut self, min_buildings: Option<usize>) -> Self {
        self.min_buildings = min_buildings;
        self
    }

    pub fn pool(&self) -> &ComputePool {
        &self.pool
    }

    /// Predict missing storey counts for every living building of a scenario
    pub async fn predict_floors(
        &self,
        scenario_id: ScenarioId,
        token: &str,
    ) -> ServiceResult<PredictionOutcome> {
        let raw = self
            .urban_api
            .get_scenario_living_buildings(scenario_id, token)
            .await?;
        debug!(scenario_id = scenario_id.get(), records = raw.len(), "scenario fetched");

        let parser = Arc::clone(&self.parser);
        let (to_predict, known) = self.pool.run(move || parser.parse_buildings(raw)).await?;

        if let Some(required) = self.min_buildings {
            let found = to_predict.len() + known.len();
            if found < required {
                return Err(ServiceError::NotEnoughBuildings { found, required });
            }
        }

        let model = Arc::clone(&self.model);
        let (mut to_predict, estimates) = self
            .pool
            .run(move || {
                let estimates = model.predict(&to_predict)?;
                Ok((to_predict, estimates))
            })
            .await?;

        if estimates.len() != to_predict.len() {
            return Err(anyhow!(
                "model returned {} estimates for {} buildings",
                estimates.len(),
                to_predict.len()
            )
            .into());
        }

        for (building, estimate) in to_predict.rows.iter_mut().zip(estimates) {
            building.storey = Some(round_storey(estimate)?);
            building.is_predicted = true;
        }

        let summary = summarize(&to_predict);
        let buildings = to_predict.concat(known);

        info!(
            scenario_id = scenario_id.get(),
            total_buildings = buildings.len(),
            predicted_buildings = summary.len(),
            "Floors predicted"
        );

        Ok(PredictionOutcome { buildings, summary })
    }
}

fn summarize(predicted: &BuildingPartition) -> Vec<PredictionSummaryRow> {
    predicted
        .rows
        .iter()
        .filter_map(|building| {
            building.storey.map(|storey| PredictionSummaryRow {
                building_id: building.building_id,
                is_scenario_object: building.is_scenario_object,
                storey,
            })
        })
        .collect()
}
