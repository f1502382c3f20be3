//! Conversion between Esri JSON geometry and [`geo`] types.
//!
//! Esri polygons are a flat list of rings: exterior rings run clockwise
//! and holes counter-clockwise. Rings are grouped into polygons by that
//! orientation; a hole is attached to the most recent exterior ring.

use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde_json::{Value, json};

/// Spatial reference used for every query (WGS84).
pub const WGS84_WKID: u32 = 4326;

/// Reads an Esri JSON geometry (`{"rings": ...}` or `{"x", "y"}`).
///
/// Returns `None` for null, empty, or unsupported geometries.
#[must_use]
pub fn from_esri(value: &Value) -> Option<Geometry<f64>> {
    if let Some(rings) = value.get("rings").and_then(Value::as_array) {
        return rings_to_multipolygon(rings).map(Geometry::MultiPolygon);
    }
    let x = value.get("x").and_then(Value::as_f64)?;
    let y = value.get("y").and_then(Value::as_f64)?;
    Some(Geometry::Point(Point::new(x, y)))
}

/// Serializes a geometry as an Esri JSON query filter.
///
/// Returns the geometry JSON and its `geometryType`, or `None` for
/// geometry types the query interface is not used with here.
#[must_use]
pub fn to_esri(geometry: &Geometry<f64>) -> Option<(Value, &'static str)> {
    let spatial_reference = json!({ "wkid": WGS84_WKID });
    match geometry {
        Geometry::Point(p) => Some((
            json!({ "x": p.x(), "y": p.y(), "spatialReference": spatial_reference }),
            "esriGeometryPoint",
        )),
        Geometry::Polygon(p) => Some((
            json!({ "rings": polygon_rings(p), "spatialReference": spatial_reference }),
            "esriGeometryPolygon",
        )),
        Geometry::MultiPolygon(mp) => {
            let rings: Vec<Value> = mp.0.iter().flat_map(polygon_rings).collect();
            Some((
                json!({ "rings": rings, "spatialReference": spatial_reference }),
                "esriGeometryPolygon",
            ))
        }
        _ => None,
    }
}

/// Normalizes polygonal geometry to a [`MultiPolygon`].
#[must_use]
pub fn as_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        _ => None,
    }
}

fn rings_to_multipolygon(rings: &[Value]) -> Option<MultiPolygon<f64>> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();

    for ring in rings {
        let Some(coords) = parse_ring(ring) else {
            continue;
        };
        let clockwise = signed_area(&coords) < 0.0;
        let line = LineString::from(coords);
        match polygons.last_mut() {
            Some((_, holes)) if !clockwise => holes.push(line),
            _ => polygons.push((line, Vec::new())),
        }
    }

    if polygons.is_empty() {
        return None;
    }

    Some(MultiPolygon(
        polygons
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    ))
}

fn parse_ring(ring: &Value) -> Option<Vec<Coord<f64>>> {
    let coords: Vec<Coord<f64>> = ring
        .as_array()?
        .iter()
        .filter_map(|pt| {
            let pair = pt.as_array()?;
            Some(Coord {
                x: pair.first()?.as_f64()?,
                y: pair.get(1)?.as_f64()?,
            })
        })
        .collect();
    // A closed ring needs at least three distinct vertices plus closure.
    if coords.len() < 4 {
        return None;
    }
    Some(coords)
}

/// Shoelace signed area; negative for clockwise rings.
fn signed_area(coords: &[Coord<f64>]) -> f64 {
    coords
        .windows(2)
        .map(|w| w[0].x.mul_add(w[1].y, -(w[1].x * w[0].y)))
        .sum::<f64>()
        / 2.0
}

/// Esri rings for one polygon: exterior clockwise, holes counter-clockwise.
fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Value> {
    let mut rings = vec![ring_json(polygon.exterior(), true)];
    rings.extend(polygon.interiors().iter().map(|r| ring_json(r, false)));
    rings
}

fn ring_json(ring: &LineString<f64>, clockwise: bool) -> Value {
    let mut coords: Vec<Coord<f64>> = ring.0.clone();
    if (signed_area(&coords) < 0.0) != clockwise {
        coords.reverse();
    }
    Value::Array(coords.iter().map(|c| json!([c.x, c.y])).collect())
}

#[cfg(test)]
mod tests {
    use geo::Area;

    use super::*;

    fn square_cw(x0: f64, y0: f64, size: f64) -> Value {
        json!([
            [x0, y0],
            [x0, y0 + size],
            [x0 + size, y0 + size],
            [x0 + size, y0],
            [x0, y0]
        ])
    }

    fn square_ccw(x0: f64, y0: f64, size: f64) -> Value {
        json!([
            [x0, y0],
            [x0 + size, y0],
            [x0 + size, y0 + size],
            [x0, y0 + size],
            [x0, y0]
        ])
    }

    #[test]
    fn reads_polygon_with_hole() {
        let esri = json!({ "rings": [square_cw(0.0, 0.0, 10.0), square_ccw(2.0, 2.0, 2.0)] });
        let Some(Geometry::MultiPolygon(mp)) = from_esri(&esri) else {
            panic!("expected multipolygon");
        };
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!((mp.unsigned_area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn reads_multiple_exteriors() {
        let esri = json!({ "rings": [square_cw(0.0, 0.0, 1.0), square_cw(5.0, 5.0, 1.0)] });
        let Some(Geometry::MultiPolygon(mp)) = from_esri(&esri) else {
            panic!("expected multipolygon");
        };
        assert_eq!(mp.0.len(), 2);
    }

    #[test]
    fn reads_point_and_rejects_null() {
        assert_eq!(
            from_esri(&json!({ "x": -82.8, "y": 27.9 })),
            Some(Geometry::Point(Point::new(-82.8, 27.9)))
        );
        assert_eq!(from_esri(&Value::Null), None);
        assert_eq!(from_esri(&json!({ "rings": [] })), None);
    }

    #[test]
    fn writes_clockwise_exterior() {
        let esri = json!({ "rings": [square_cw(0.0, 0.0, 4.0)] });
        let geometry = from_esri(&esri).unwrap();
        let (value, geometry_type) = to_esri(&geometry).unwrap();
        assert_eq!(geometry_type, "esriGeometryPolygon");
        assert_eq!(value["spatialReference"]["wkid"], 4326);
        let ring = parse_ring(&value["rings"][0]).unwrap();
        assert!(signed_area(&ring) < 0.0);
    }

    #[test]
    fn writes_point_filter() {
        let (value, geometry_type) = to_esri(&Geometry::Point(Point::new(1.5, 2.5))).unwrap();
        assert_eq!(geometry_type, "esriGeometryPoint");
        assert_eq!(value["x"], 1.5);
        assert_eq!(value["y"], 2.5);
    }
}
