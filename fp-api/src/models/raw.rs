//! Raw building records as returned by the Urban API

use serde::Deserialize;
use serde_json::{Map, Value};

use super::building::Crs;

/// One GeoJSON feature of the scenario geometry query
///
/// Nothing is validated here; the feature parser decides what is a building.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawBuilding {
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// All raw features of one scenario, with the collection CRS
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBuildingCollection {
    pub crs: Crs,
    pub records: Vec<RawBuilding>,
}

impl RawBuildingCollection {
    pub fn new(crs: Crs, records: Vec<RawBuilding>) -> Self {
        Self { crs, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Body of the scenario geometry query
#[derive(Debug, Deserialize)]
pub(crate) struct RawFeatureCollection {
    #[serde(default)]
    pub features: Vec<RawBuilding>,
}
