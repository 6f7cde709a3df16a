//! GeoJSON inspection: geometry kind inference and bounding boxes.
//!
//! Both functions work on untyped [`serde_json::Value`] documents so that
//! payloads with irregular nesting or stray non-numeric members can still be
//! inspected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Broad geometry class of a layer, deciding which paint layers it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Unknown,
}

/// Infers the geometry kind from the first geometry in the document.
///
/// For a FeatureCollection this is the first feature carrying a geometry;
/// for a Feature, its geometry; for a bare geometry, itself. Mixed
/// collections are classified by that first geometry alone.
pub fn infer_geometry_kind(geojson: &Value) -> GeometryKind {
    let geometry = match geojson.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => geojson
            .get("features")
            .and_then(Value::as_array)
            .and_then(|features| features.iter().find_map(feature_geometry)),
        Some("Feature") => feature_geometry(geojson),
        Some(_) => Some(geojson),
        None => None,
    };

    match geometry.and_then(|g| g.get("type")).and_then(Value::as_str) {
        Some("Polygon" | "MultiPolygon") => GeometryKind::Polygon,
        Some("LineString" | "MultiLineString") => GeometryKind::Line,
        Some("Point" | "MultiPoint") => GeometryKind::Point,
        _ => GeometryKind::Unknown,
    }
}

fn feature_geometry(feature: &Value) -> Option<&Value> {
    feature.get("geometry").filter(|g| g.is_object())
}

// ============================================================================
// BoundingBox
// ============================================================================

/// Axis-aligned bounds in geographic degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// A degenerate box around one position.
    pub fn from_point(lon: f64, lat: f64) -> Self {
        Self {
            west: lon,
            south: lat,
            east: lon,
            north: lat,
        }
    }

    /// Grows the box to include a position.
    pub fn extend(&mut self, lon: f64, lat: f64) {
        self.west = self.west.min(lon);
        self.south = self.south.min(lat);
        self.east = self.east.max(lon);
        self.north = self.north.max(lat);
    }

    /// Returns true if the position lies inside or on the edge of the box.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    /// `[[west, south], [east, north]]`, the renderer's bounds form.
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.west, self.south], [self.east, self.north]]
    }
}

/// Computes the bounds of every position in a GeoJSON document.
///
/// Descends FeatureCollection, Feature, GeometryCollection and bare
/// geometries. Coordinate arrays are walked without regard to geometry type:
/// an array whose first two members are numbers is a position, anything
/// else is descended. Returns `None` when no finite position exists.
pub fn compute_bounding_box(geojson: &Value) -> Option<BoundingBox> {
    let mut bbox = None;

    match geojson.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            for feature in geojson.get("features").and_then(Value::as_array).into_iter().flatten() {
                visit_geometry(feature.get("geometry"), &mut bbox);
            }
        }
        Some("Feature") => visit_geometry(geojson.get("geometry"), &mut bbox),
        Some(_) => visit_geometry(Some(geojson), &mut bbox),
        None => {}
    }

    bbox
}

fn visit_geometry(geometry: Option<&Value>, bbox: &mut Option<BoundingBox>) {
    let Some(geometry) = geometry else {
        return;
    };
    if geometry.get("type").and_then(Value::as_str) == Some("GeometryCollection") {
        for child in geometry.get("geometries").and_then(Value::as_array).into_iter().flatten() {
            visit_geometry(Some(child), bbox);
        }
        return;
    }
    if let Some(coordinates) = geometry.get("coordinates") {
        visit_coordinates(coordinates, bbox);
    }
}

fn visit_coordinates(coordinates: &Value, bbox: &mut Option<BoundingBox>) {
    let Some(items) = coordinates.as_array() else {
        return;
    };

    if let [Value::Number(lon), Value::Number(lat), ..] = items.as_slice() {
        // A position terminates the descent even when it is unusable.
        let (lon, lat) = (lon.as_f64().unwrap_or(f64::NAN), lat.as_f64().unwrap_or(f64::NAN));
        if lon.is_finite() && lat.is_finite() {
            match bbox {
                Some(b) => b.extend(lon, lat),
                None => *bbox = Some(BoundingBox::from_point(lon, lat)),
            }
        }
        return;
    }

    for item in items {
        visit_coordinates(item, bbox);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(geometry: Value) -> Value {
        json!({"type": "Feature", "properties": {}, "geometry": geometry})
    }

    #[test]
    fn kind_from_first_feature_with_geometry() {
        let fc = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": null},
            feature(json!({"type": "MultiPolygon", "coordinates": []})),
            feature(json!({"type": "Point", "coordinates": [0, 0]}))
        ]});
        assert_eq!(infer_geometry_kind(&fc), GeometryKind::Polygon);
    }

    #[test]
    fn kind_mapping() {
        let cases = [
            ("Point", GeometryKind::Point),
            ("MultiPoint", GeometryKind::Point),
            ("LineString", GeometryKind::Line),
            ("MultiLineString", GeometryKind::Line),
            ("Polygon", GeometryKind::Polygon),
            ("GeometryCollection", GeometryKind::Unknown),
        ];
        for (ty, expected) in cases {
            assert_eq!(
                infer_geometry_kind(&feature(json!({"type": ty}))),
                expected,
                "{ty}"
            );
            assert_eq!(infer_geometry_kind(&json!({"type": ty})), expected, "bare {ty}");
        }
    }

    #[test]
    fn kind_unknown_for_empty_or_garbage() {
        assert_eq!(
            infer_geometry_kind(&json!({"type": "FeatureCollection", "features": []})),
            GeometryKind::Unknown
        );
        assert_eq!(infer_geometry_kind(&json!(null)), GeometryKind::Unknown);
        assert_eq!(infer_geometry_kind(&json!([1, 2])), GeometryKind::Unknown);
        assert_eq!(
            infer_geometry_kind(&json!({"type": "Feature"})),
            GeometryKind::Unknown
        );
    }

    #[test]
    fn kind_ignores_later_features() {
        let first = feature(json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]}));
        let a = json!({"type": "FeatureCollection", "features": [
            first.clone(),
            feature(json!({"type": "Point", "coordinates": [0, 0]})),
            feature(json!({"type": "Polygon", "coordinates": []}))
        ]});
        let b = json!({"type": "FeatureCollection", "features": [
            first,
            feature(json!({"type": "Polygon", "coordinates": []})),
            feature(json!({"type": "Point", "coordinates": [0, 0]}))
        ]});
        assert_eq!(infer_geometry_kind(&a), infer_geometry_kind(&b));
        assert_eq!(infer_geometry_kind(&a), GeometryKind::Line);
    }

    #[test]
    fn bbox_single_point() {
        let bbox = compute_bounding_box(&feature(json!({"type": "Point", "coordinates": [2.5, 48.1]})));
        assert_eq!(
            bbox,
            Some(BoundingBox {
                west: 2.5,
                south: 48.1,
                east: 2.5,
                north: 48.1
            })
        );
    }

    #[test]
    fn bbox_empty_collection_is_none() {
        assert_eq!(
            compute_bounding_box(&json!({"type": "FeatureCollection", "features": []})),
            None
        );
    }

    #[test]
    fn bbox_mixed_depths_and_collections() {
        let fc = json!({"type": "FeatureCollection", "features": [
            feature(json!({"type": "Polygon", "coordinates": [[[0, 0], [4, 0], [4, 3], [0, 0]]]})),
            feature(json!({"type": "GeometryCollection", "geometries": [
                {"type": "Point", "coordinates": [-2, 1]},
                {"type": "MultiLineString", "coordinates": [[[1, 9], [2, 2]]]}
            ]})),
            {"type": "Feature", "geometry": null}
        ]});
        let bbox = compute_bounding_box(&fc).unwrap();
        assert_eq!(bbox.corners(), [[-2.0, 0.0], [4.0, 9.0]]);
    }

    #[test]
    fn bbox_skips_malformed_coordinates() {
        let geometry = json!({"type": "LineString", "coordinates": [
            ["a", "b"], [1, "x"], {"lon": 3}, [[5, 6]], [7, 8, 100]
        ]});
        let bbox = compute_bounding_box(&geometry).unwrap();
        assert_eq!(bbox.corners(), [[5.0, 6.0], [7.0, 8.0]]);

        let never = json!({"type": "Point", "coordinates": ["1", "2"]});
        assert_eq!(compute_bounding_box(&never), None);
    }
}
