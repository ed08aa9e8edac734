//! Trait-level fakes for the prediction pipeline

use async_trait::async_trait;
use fp_api::models::{BuildingPartition, RawBuilding, RawBuildingCollection, Crs, ScenarioId};
use fp_api::services::{
    ComputePool, FeatureParser, FloorPredictorService, GeometryFeatureParser, PredictionModel, UrbanApi,
};
use fp_api::{ServiceError, ServiceResult};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type BuildingsFn = dyn Fn() -> ServiceResult<RawBuildingCollection> + Send + Sync;

/// Urban API answering from a closure
pub struct StubUrbanApi {
    alive: bool,
    buildings: Box<BuildingsFn>,
    pub calls: AtomicUsize,
    pub last_token: Mutex<Option<String>>,
}

impl StubUrbanApi {
    pub fn new(f: impl Fn() -> ServiceResult<RawBuildingCollection> + Send + Sync + 'static) -> Self {
        Self {
            alive: true,
            buildings: Box::new(f),
            calls: AtomicUsize::new(0),
            last_token: Mutex::new(None),
        }
    }

    /// Serve these GeoJSON features on every call
    pub fn with_features(features: Vec<Value>) -> Self {
        Self::new(move || Ok(raw_collection(features.clone())))
    }

    pub fn failing(f: impl Fn() -> ServiceError + Send + Sync + 'static) -> Self {
        Self::new(move || Err(f()))
    }

    pub fn dead(mut self) -> Self {
        self.alive = false;
        self
    }
}

#[async_trait]
impl UrbanApi for StubUrbanApi {
    async fn is_alive(&self) -> bool {
        self.alive
    }

    async fn get_version(&self) -> ServiceResult<String> {
        Ok("stub".to_string())
    }

    async fn get_physical_object_type_id_by_name(&self, _name: &str) -> ServiceResult<i64> {
        Ok(4)
    }

    async fn get_scenario_living_buildings(
        &self,
        _scenario_id: ScenarioId,
        token: &str,
    ) -> ServiceResult<RawBuildingCollection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_token.lock().unwrap() = Some(token.to_string());
        (self.buildings)()
    }
}

/// Model returning fixed estimates regardless of input
pub struct FixedModel {
    estimates: Vec<f64>,
    pub calls: AtomicUsize,
}

impl FixedModel {
    pub fn new(estimates: Vec<f64>) -> Self {
        Self {
            estimates,
            calls: AtomicUsize::new(0),
        }
    }
}

impl PredictionModel for FixedModel {
    fn predict(&self, _buildings: &BuildingPartition) -> ServiceResult<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.estimates.clone())
    }
}

/// Parser that panics, standing in for a malformed row deep in a library
pub struct PanickingParser;

impl FeatureParser for PanickingParser {
    fn parse_buildings(
        &self,
        _raw: RawBuildingCollection,
    ) -> ServiceResult<(BuildingPartition, BuildingPartition)> {
        panic!("unexpected geometry layout");
    }
}

pub fn raw_collection(features: Vec<Value>) -> RawBuildingCollection {
    let records = features
        .into_iter()
        .map(|feature| serde_json::from_value::<RawBuilding>(feature).unwrap())
        .collect();
    RawBuildingCollection::new(Crs::Wgs84, records)
}

/// Service over the real geometry parser with the given stubs
pub fn service_with(urban_api: Arc<dyn UrbanApi>, model: Arc<dyn PredictionModel>) -> FloorPredictorService {
    FloorPredictorService::new(
        urban_api,
        Arc::new(GeometryFeatureParser::new(150.0)),
        model,
        ComputePool::new(2),
    )
}
