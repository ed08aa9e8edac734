//! GeoJSON geometry conversion for building footprints

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};

use super::building::Footprint;

type Position = Vec<f64>;
type Ring = Vec<Position>;

fn ring_to_line_string(ring: &[Position]) -> Option<LineString<f64>> {
    // A closed ring needs at least four positions
    if ring.len() < 4 {
        return None;
    }
    let coords = ring
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x: *x, y: *y }),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(coords))
}

fn rings_to_polygon(rings: &[Ring]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    let exterior = ring_to_line_string(exterior)?;
    let interiors = interiors
        .iter()
        .map(|ring| ring_to_line_string(ring))
        .collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

/// Convert a GeoJSON geometry object into a footprint
///
/// Returns `None` for anything that is not a well-formed Polygon or
/// MultiPolygon.
pub fn footprint_from_geojson(geometry: &Value) -> Option<Footprint> {
    let kind = geometry.get("type")?.as_str()?;
    let coordinates = geometry.get("coordinates")?.clone();

    match kind {
        "Polygon" => {
            let rings: Vec<Ring> = serde_json::from_value(coordinates).ok()?;
            rings_to_polygon(&rings).map(Footprint::Polygon)
        }
        "MultiPolygon" => {
            let polygons: Vec<Vec<Ring>> = serde_json::from_value(coordinates).ok()?;
            if polygons.is_empty() {
                return None;
            }
            let polygons = polygons
                .iter()
                .map(|rings| rings_to_polygon(rings))
                .collect::<Option<Vec<_>>>()?;
            Some(Footprint::MultiPolygon(MultiPolygon::new(polygons)))
        }
        _ => None,
    }
}

fn line_string_coordinates(line: &LineString<f64>) -> Value {
    Value::Array(line.coords().map(|c| json!([c.x, c.y])).collect())
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Value {
    let mut rings = vec![line_string_coordinates(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(line_string_coordinates));
    Value::Array(rings)
}

/// Render a footprint as a GeoJSON geometry object
pub fn footprint_to_geojson(footprint: &Footprint) -> Value {
    match footprint {
        Footprint::Polygon(polygon) => json!({
            "type": "Polygon",
            "coordinates": polygon_coordinates(polygon),
        }),
        Footprint::MultiPolygon(multi) => json!({
            "type": "MultiPolygon",
            "coordinates": Value::Array(multi.iter().map(polygon_coordinates).collect()),
        }),
    }
}
