//! Storey regression model
//!
//! The model artifact is a small JSON document:
//!
//! ```json
//! {
//!   "intercept": 1.2,
//!   "coefficients": { "area_m2": 0.004, "neighbor_mean_storey": 0.8 },
//!   "min_storey": 1.0
//! }
//! ```
//!
//! Coefficient names must be ones [`crate::models::Building::feature`]
//! understands; anything else is rejected at load time.

use anyhow::anyhow;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::error::ServiceResult;
use crate::models::{BuildingFeatures, BuildingPartition};

const DEFAULT_MIN_STOREY: f64 = 1.0;

/// Model loading errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Artifact could not be read
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact is not valid model JSON
    #[error("Invalid model artifact: {0}")]
    Format(#[from] serde_json::Error),

    /// Coefficient refers to a feature the parser does not produce
    #[error("Unknown model feature: {0}")]
    UnknownFeature(String),

    /// Intercept, weight or floor is NaN or infinite
    #[error("Model parameter `{0}` is not a finite number")]
    NonFinite(String),
}

/// Produces one floating point storey estimate per building
pub trait PredictionModel: Send + Sync {
    /// Estimates in the same order as `buildings.rows`
    fn predict(&self, buildings: &BuildingPartition) -> ServiceResult<Vec<f64>>;
}

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    intercept: f64,
    #[serde(default)]
    coefficients: BTreeMap<String, f64>,
    #[serde(default)]
    min_storey: Option<f64>,
}

/// Linear regression over building features, floored at `min_storey`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearStoreyModel {
    intercept: f64,
    coefficients: Vec<(String, f64)>,
    min_storey: f64,
}

impl LinearStoreyModel {
    /// Build a model from parameters, validating feature names
    pub fn new(
        intercept: f64,
        coefficients: impl IntoIterator<Item = (String, f64)>,
        min_storey: f64,
    ) -> Result<Self, ModelError> {
        if !intercept.is_finite() {
            return Err(ModelError::NonFinite("intercept".to_string()));
        }
        if !min_storey.is_finite() {
            return Err(ModelError::NonFinite("min_storey".to_string()));
        }

        let coefficients = coefficients
            .into_iter()
            .map(|(name, weight)| {
                if !BuildingFeatures::NAMES.contains(&name.as_str()) {
                    return Err(ModelError::UnknownFeature(name));
                }
                if !weight.is_finite() {
                    return Err(ModelError::NonFinite(name));
                }
                Ok((name, weight))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            intercept,
            coefficients,
            min_storey,
        })
    }

    /// Parse a JSON model artifact
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_str(json)?;
        Self::new(
            artifact.intercept,
            artifact.coefficients,
            artifact.min_storey.unwrap_or(DEFAULT_MIN_STOREY),
        )
    }

    /// Read a model artifact from disk
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&json)?;

        info!(
            path = %path.display(),
            features = model.coefficients.len(),
            "Storey model loaded"
        );
        Ok(model)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.coefficients.iter().map(|(name, _)| name.as_str())
    }
}

impl PredictionModel for LinearStoreyModel {
    fn predict(&self, buildings: &BuildingPartition) -> ServiceResult<Vec<f64>> {
        buildings
            .rows
            .iter()
            .map(|building| {
                let mut estimate = self.intercept;
                for (name, weight) in &self.coefficients {
                    let value = building.feature(name).ok_or_else(|| {
                        anyhow!("building {} has no feature `{}`", building.building_id, name)
                    })?;
                    estimate += weight * value;
                }
                Ok(estimate.max(self.min_storey))
            })
            .collect()
    }
}
