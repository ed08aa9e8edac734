//! Services behind the prediction endpoint
//!
//! The Urban API client does network I/O; the feature parser and model are
//! synchronous and run on the compute pool; the floor predictor sequences
//! them.

pub mod compute_pool;
pub mod data_parser;
pub mod floor_predictor;
pub mod model;
pub mod urban_api;

pub use compute_pool::ComputePool;
pub use data_parser::{FeatureParser, GeometryFeatureParser};
pub use floor_predictor::{round_storey, FloorPredictorService};
pub use model::{LinearStoreyModel, ModelError, PredictionModel};
pub use urban_api::{HttpUrbanApiClient, UrbanApi, LIVING_BUILDING_TYPE};
