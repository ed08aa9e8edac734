//! Data model for the prediction pipeline

pub mod building;
pub mod geojson;
pub mod predict;
pub mod raw;

pub use building::{Building, BuildingFeatures, BuildingPartition, Crs, Footprint};
pub use predict::{
    BuildingFloors, FeatureCollection, PredictionOutcome, PredictionResult, PredictionSummaryRow,
    ScenarioId,
};
pub use raw::{RawBuilding, RawBuildingCollection};
