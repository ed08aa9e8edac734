//! Prediction inputs, outcomes and response schemas

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::building::{Building, BuildingPartition};
use super::geojson::footprint_to_geojson;

/// Positive scenario identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScenarioId(u64);

impl ScenarioId {
    /// `None` for zero
    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u64 = s
            .parse()
            .map_err(|_| format!("scenario identifier must be a positive integer, got `{}`", s))?;
        ScenarioId::new(id).ok_or_else(|| "scenario identifier must be greater than 0".to_string())
    }
}

/// One predicted building in the user-facing summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSummaryRow {
    pub building_id: u64,
    pub is_scenario_object: bool,
    pub storey: u32,
}

/// Result of one prediction run
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    /// Predicted rows followed by rows that already had a storey count (WGS84)
    pub buildings: BuildingPartition,
    /// One row per predicted building, in model order
    pub summary: Vec<PredictionSummaryRow>,
}

/// Properties of a building feature in the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingFloors {
    pub building_id: u64,
    pub is_scenario_object: bool,
    pub is_living: bool,
    pub storey: Option<u32>,
    pub is_predicted: bool,
}

impl From<&Building> for BuildingFloors {
    fn from(building: &Building) -> Self {
        Self {
            building_id: building.building_id,
            is_scenario_object: building.is_scenario_object,
            is_living: building.is_living,
            storey: building.storey,
            is_predicted: building.is_predicted,
        }
    }
}

/// GeoJSON feature with typed properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<P> {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: Value,
    pub properties: P,
}

/// GeoJSON feature collection with typed properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection<P> {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature<P>>,
}

impl FeatureCollection<BuildingFloors> {
    /// Render a WGS84 partition as GeoJSON
    pub fn from_partition(partition: &BuildingPartition) -> Self {
        let features = partition
            .rows
            .iter()
            .map(|building| Feature {
                feature_type: "Feature".to_string(),
                geometry: footprint_to_geojson(&building.footprint),
                properties: BuildingFloors::from(building),
            })
            .collect();

        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }
}

/// Response of the floor prediction endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub geojson: FeatureCollection<BuildingFloors>,
    pub summary: Vec<PredictionSummaryRow>,
}

impl From<&PredictionOutcome> for PredictionResult {
    fn from(outcome: &PredictionOutcome) -> Self {
        Self {
            geojson: FeatureCollection::from_partition(&outcome.buildings),
            summary: outcome.summary.clone(),
        }
    }
}
