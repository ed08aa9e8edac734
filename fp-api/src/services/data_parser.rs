//! Raw building records → model-ready partitions
//!
//! The parser is synchronous and potentially CPU heavy; callers run it on
//! the compute pool.

use geo::{Centroid, CoordsIter, GeodesicArea, HaversineDistance, Point};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::models::geojson::footprint_from_geojson;
use crate::models::{Building, BuildingFeatures, BuildingPartition, Crs, Footprint, RawBuildingCollection};

/// Turns raw records into `(to_predict, known)` partitions
pub trait FeatureParser: Send + Sync {
    /// Fails with [`ServiceError::NoBuildingsFound`] when nothing usable
    /// remains or no building is missing a storey count.
    fn parse_buildings(
        &self,
        raw: RawBuildingCollection,
    ) -> ServiceResult<(BuildingPartition, BuildingPartition)>;
}

/// Geometric and neighbourhood features computed with `geo`
#[derive(Debug, Clone)]
pub struct GeometryFeatureParser {
    neighborhood_radius_m: f64,
}

impl GeometryFeatureParser {
    pub fn new(neighborhood_radius_m: f64) -> Self {
        Self {
            neighborhood_radius_m,
        }
    }
}

/// Non-negative whole number from an integer, integral float or numeric string
fn whole_number(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let float = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<u64>() {
                return Some(n);
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64)
        .then_some(float as u64)
}

fn building_properties(properties: &Map<String, Value>) -> Option<&Map<String, Value>> {
    properties.get("building")?.as_object()
}

fn building_id(properties: &Map<String, Value>) -> Option<u64> {
    building_properties(properties)?
        .get("id")
        .and_then(whole_number)
        .filter(|id| *id > 0)
}

fn storey(properties: &Map<String, Value>) -> Option<u32> {
    building_properties(properties)?
        .get("floors")
        .and_then(whole_number)
        .and_then(|n| u32::try_from(n).ok())
}

fn is_scenario_object(properties: &Map<String, Value>) -> bool {
    properties
        .get("is_scenario_physical_object")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn area_and_perimeter(footprint: &Footprint) -> (f64, f64) {
    match footprint {
        Footprint::Polygon(p) => (p.geodesic_area_unsigned(), p.geodesic_perimeter()),
        Footprint::MultiPolygon(mp) => (mp.geodesic_area_unsigned(), mp.geodesic_perimeter()),
    }
}

fn centroid(footprint: &Footprint) -> Option<Point<f64>> {
    match footprint {
        Footprint::Polygon(p) => p.centroid(),
        Footprint::MultiPolygon(mp) => mp.centroid(),
    }
}

fn vertex_count(footprint: &Footprint) -> usize {
    match footprint {
        Footprint::Polygon(p) => p.coords_count(),
        Footprint::MultiPolygon(mp) => mp.coords_count(),
    }
}

impl GeometryFeatureParser {
    /// Per-building geometric features; neighbourhood fields are filled later
    fn shape_features(footprint: &Footprint) -> BuildingFeatures {
        let (area_m2, perimeter_m) = area_and_perimeter(footprint);
        let compactness = if perimeter_m > 0.0 {
            4.0 * std::f64::consts::PI * area_m2 / (perimeter_m * perimeter_m)
        } else {
            0.0
        };
        let (centroid_lon, centroid_lat) = centroid(footprint)
            .map(|p| (p.x(), p.y()))
            .unwrap_or_default();

        BuildingFeatures {
            area_m2,
            perimeter_m,
            vertex_count: vertex_count(footprint) as f64,
            compactness,
            centroid_lon,
            centroid_lat,
            ..Default::default()
        }
    }

    fn fill_neighbourhood(&self, buildings: &mut [Building]) {
        let centroids: Vec<Point<f64>> = buildings
            .iter()
            .map(|b| Point::new(b.features.centroid_lon, b.features.centroid_lat))
            .collect();

        for i in 0..buildings.len() {
            let mut count = 0usize;
            let mut storey_sum = 0u64;
            let mut storey_count = 0usize;

            for (j, other) in centroids.iter().enumerate() {
                if i == j || centroids[i].haversine_distance(other) > self.neighborhood_radius_m {
                    continue;
                }
                count += 1;
                if let Some(storey) = buildings[j].storey {
                    storey_sum += u64::from(storey);
                    storey_count += 1;
                }
            }

            let features = &mut buildings[i].features;
            features.neighbor_count = count as f64;
            features.neighbor_mean_storey = if storey_count > 0 {
                storey_sum as f64 / storey_count as f64
            } else {
                0.0
            };
        }
    }
}

impl FeatureParser for GeometryFeatureParser {
    fn parse_buildings(
        &self,
        raw: RawBuildingCollection,
    ) -> ServiceResult<(BuildingPartition, BuildingPartition)> {
        let total = raw.len();
        let crs = raw.crs;

        let identified: Vec<_> = raw
            .records
            .into_iter()
            .filter_map(|record| building_id(&record.properties).map(|id| (id, record)))
            .collect();
        if identified.is_empty() {
            debug!(total, "no record carries a building identifier");
            return Err(ServiceError::NoBuildingsFound);
        }

        let mut buildings: Vec<Building> = identified
            .into_iter()
            .filter_map(|(building_id, record)| {
                let footprint = footprint_from_geojson(record.geometry.as_ref()?)?.to_wgs84(crs);
                Some(Building {
                    building_id,
                    is_scenario_object: is_scenario_object(&record.properties),
                    is_living: true,
                    is_predicted: false,
                    storey: storey(&record.properties),
                    features: Self::shape_features(&footprint),
                    footprint,
                })
            })
            .collect();
        if buildings.is_empty() {
            debug!(total, "no identified record has a polygonal geometry");
            return Err(ServiceError::NoBuildingsFound);
        }

        self.fill_neighbourhood(&mut buildings);

        let valid = buildings.len();
        let (to_predict, known): (Vec<_>, Vec<_>) =
            buildings.into_iter().partition(|b| b.storey.is_none());
        debug!(
            total,
            valid,
            to_predict = to_predict.len(),
            known = known.len(),
            "buildings parsed"
        );
        if to_predict.is_empty() {
            return Err(ServiceError::NoBuildingsFound);
        }

        Ok((
            BuildingPartition::new(Crs::Wgs84, to_predict),
            BuildingPartition::new(Crs::Wgs84, known),
        ))
    }
}
