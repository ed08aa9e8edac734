//! Building records and partitions flowing through the prediction pipeline

use geo::{Coord, MapCoords, MultiPolygon, Polygon};

/// Coordinate reference system of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Crs {
    /// EPSG:4326, lon/lat degrees
    #[default]
    Wgs84,
    /// EPSG:3857, metres
    WebMercator,
}

const EARTH_RADIUS_M: f64 = 6_378_137.0;

fn web_mercator_to_wgs84(c: Coord<f64>) -> Coord<f64> {
    let lon = (c.x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (c.y / EARTH_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    Coord { x: lon, y: lat }
}

/// Polygonal building footprint
#[derive(Debug, Clone, PartialEq)]
pub enum Footprint {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Footprint {
    /// Reproject from `from` into WGS84
    pub fn to_wgs84(&self, from: Crs) -> Footprint {
        match from {
            Crs::Wgs84 => self.clone(),
            Crs::WebMercator => match self {
                Footprint::Polygon(p) => Footprint::Polygon(p.map_coords(web_mercator_to_wgs84)),
                Footprint::MultiPolygon(mp) => {
                    Footprint::MultiPolygon(mp.map_coords(web_mercator_to_wgs84))
                }
            },
        }
    }
}

/// Derived per-building features used by the model
///
/// Produced by the feature parser; the orchestrator never looks inside.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildingFeatures {
    pub area_m2: f64,
    pub perimeter_m: f64,
    pub vertex_count: f64,
    pub compactness: f64,
    pub centroid_lon: f64,
    pub centroid_lat: f64,
    pub neighbor_count: f64,
    pub neighbor_mean_storey: f64,
}

impl BuildingFeatures {
    /// Every feature name accepted by [`Building::feature`]
    pub const NAMES: &'static [&'static str] = &[
        "area_m2",
        "perimeter_m",
        "vertex_count",
        "compactness",
        "centroid_lon",
        "centroid_lat",
        "neighbor_count",
        "neighbor_mean_storey",
        "is_scenario_object",
    ];
}

/// One living building of a scenario
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub building_id: u64,
    /// Belongs to the scenario draft rather than the base context
    pub is_scenario_object: bool,
    pub is_living: bool,
    /// Storey count was filled in by the model
    pub is_predicted: bool,
    /// `None` means unknown, to be predicted
    pub storey: Option<u32>,
    pub footprint: Footprint,
    pub features: BuildingFeatures,
}

impl Building {
    /// Look up a model input by name
    pub fn feature(&self, name: &str) -> Option<f64> {
        let f = &self.features;
        let value = match name {
            "area_m2" => f.area_m2,
            "perimeter_m" => f.perimeter_m,
            "vertex_count" => f.vertex_count,
            "compactness" => f.compactness,
            "centroid_lon" => f.centroid_lon,
            "centroid_lat" => f.centroid_lat,
            "neighbor_count" => f.neighbor_count,
            "neighbor_mean_storey" => f.neighbor_mean_storey,
            "is_scenario_object" => {
                if self.is_scenario_object {
                    1.0
                } else {
                    0.0
                }
            }
            _ => return None,
        };
        Some(value)
    }
}

/// Ordered buildings sharing a predicate over `storey`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildingPartition {
    pub crs: Crs,
    pub rows: Vec<Building>,
}

impl BuildingPartition {
    pub fn new(crs: Crs, rows: Vec<Building>) -> Self {
        Self { crs, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same rows, footprints reprojected to WGS84
    pub fn into_wgs84(self) -> BuildingPartition {
        if self.crs == Crs::Wgs84 {
            return self;
        }
        let from = self.crs;
        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                row.footprint = row.footprint.to_wgs84(from);
                row
            })
            .collect();
        BuildingPartition::new(Crs::Wgs84, rows)
    }

    /// Append `other` after `self`, both normalised to WGS84
    pub fn concat(self, other: BuildingPartition) -> BuildingPartition {
        let mut merged = self.into_wgs84();
        merged.rows.extend(other.into_wgs84().rows);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(building_id: u64, storey: Option<u32>) -> Building {
        Building {
            building_id,
            is_scenario_object: false,
            is_living: true,
            is_predicted: false,
            storey,
            footprint: Footprint::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 0.0, y: 1.0),
                (x: 1.0, y: 1.0),
                (x: 1.0, y: 0.0),
            ]),
            features: BuildingFeatures::default(),
        }
    }

    #[test]
    fn test_feature_lookup() {
        let mut building = square(1, None);
        building.features.area_m2 = 120.0;
        building.is_scenario_object = true;

        assert_eq!(building.feature("area_m2"), Some(120.0));
        assert_eq!(building.feature("is_scenario_object"), Some(1.0));
        assert_eq!(building.feature("height"), None);
    }

    #[test]
    fn test_every_listed_feature_resolves() {
        let building = square(1, None);
        for name in BuildingFeatures::NAMES {
            assert!(building.feature(name).is_some(), "{} should resolve", name);
        }
    }

    #[test]
    fn test_web_mercator_origin_maps_to_null_island() {
        let c = web_mercator_to_wgs84(Coord { x: 0.0, y: 0.0 });
        assert!(c.x.abs() < 1e-9);
        assert!(c.y.abs() < 1e-9);
    }

    #[test]
    fn test_web_mercator_known_point() {
        // Saint Petersburg, roughly 30.3 E 59.95 N
        let c = web_mercator_to_wgs84(Coord {
            x: 3_372_980.0,
            y: 8_388_614.0,
        });
        assert!((c.x - 30.3).abs() < 0.01, "lon was {}", c.x);
        assert!((c.y - 59.95).abs() < 0.01, "lat was {}", c.y);
    }

    #[test]
    fn test_concat_keeps_order_and_normalises_crs() {
        let first = BuildingPartition::new(Crs::Wgs84, vec![square(1, None)]);
        let second = BuildingPartition::new(Crs::WebMercator, vec![square(2, Some(5))]);

        let merged = first.concat(second);

        assert_eq!(merged.crs, Crs::Wgs84);
        let ids: Vec<u64> = merged.rows.iter().map(|b| b.building_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
