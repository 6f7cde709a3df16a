//! Department intensity overlay.
//!
//! One circle per department, centred on the department, sized and colored
//! by its share of the largest metric. The overlay's circle layer is the
//! anchor every other layer is stacked beneath.
//!
//! # Feature Properties
//!
//! ```json
//! {
//!   "departement": "13",
//!   "name": "Bouches-du-Rhône (13)",
//!   "count": 42,
//!   "surfaceHa": 118.5,
//!   "metric": 42.0,
//!   "intensity": 1.0,
//!   "radius": 26.0,
//!   "color": "rgb(239,68,68)"
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{CompositorError, Result};
use crate::renderer::{LayerType, PaintLayer, PaintProperty, Renderer};
use crate::style::color::color_for_intensity;
use crate::style::expression::Expression;

pub const OVERLAY_SOURCE: &str = "dept-overlay";
pub const OVERLAY_LAYER: &str = "dept-circles";

// ============================================================================
// Departments
// ============================================================================

/// A department the overlay can place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Department {
    pub code: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

pub const DEPARTMENTS: [Department; 6] = [
    Department { code: "04", name: "Alpes-de-Haute-Provence (04)", lat: 44.092, lon: 6.235 },
    Department { code: "05", name: "Hautes-Alpes (05)", lat: 44.559, lon: 6.079 },
    Department { code: "06", name: "Alpes-Maritimes (06)", lat: 43.703, lon: 7.266 },
    Department { code: "13", name: "Bouches-du-Rhône (13)", lat: 43.296, lon: 5.369 },
    Department { code: "83", name: "Var (83)", lat: 43.125, lon: 5.93 },
    Department { code: "84", name: "Vaucluse (84)", lat: 43.949, lon: 4.805 },
];

pub fn department(code: &str) -> Option<&'static Department> {
    DEPARTMENTS.iter().find(|d| d.code == code)
}

// ============================================================================
// Metrics
// ============================================================================

/// Which aggregate drives the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Number of incidents.
    #[default]
    Count,
    /// Burnt surface in hectares.
    Surface,
}

impl MetricKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Count => "nombre",
            Self::Surface => "surface",
        }
    }
}

/// Aggregates for one department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentMetric {
    pub departement: String,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub surface_ha: Option<f64>,
    /// The value the overlay scales by.
    #[serde(default)]
    pub metric: Option<f64>,
}

impl DepartmentMetric {
    /// Builds a metric row, picking the scaling value by `kind`.
    pub fn new(departement: impl Into<String>, count: u64, surface_ha: f64, kind: MetricKind) -> Self {
        let metric = match kind {
            MetricKind::Count => count as f64,
            MetricKind::Surface => surface_ha,
        };
        Self {
            departement: departement.into(),
            count: Some(count),
            surface_ha: Some(surface_ha),
            metric: Some(metric),
        }
    }

    fn metric_value(&self) -> f64 {
        self.metric.filter(|m| m.is_finite()).unwrap_or(0.0)
    }
}

/// Builds the overlay FeatureCollection.
///
/// Rows for unknown departments are dropped. Coordinates are `[lon, lat]`.
/// When `show` is false the collection is empty.
pub fn overlay_geojson(points: &[DepartmentMetric], show: bool) -> Value {
    if !show {
        return json!({"type": "FeatureCollection", "features": []});
    }

    let max = points
        .iter()
        .map(DepartmentMetric::metric_value)
        .fold(0.0, f64::max);

    let features: Vec<Value> = points
        .iter()
        .filter_map(|point| {
            let dept = department(&point.departement)?;
            let intensity = if max > 0.0 { point.metric_value() / max } else { 0.0 };
            Some(json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [dept.lon, dept.lat]},
                "properties": {
                    "departement": point.departement,
                    "name": dept.name,
                    "count": point.count,
                    "surfaceHa": point.surface_ha,
                    "metric": point.metric,
                    "intensity": intensity,
                    "radius": 8.0 + 18.0 * intensity,
                    "color": color_for_intensity(intensity),
                }
            }))
        })
        .collect();

    json!({"type": "FeatureCollection", "features": features})
}

/// Hover text for one overlay feature, line by line.
pub fn tooltip_lines(properties: &Map<String, Value>, kind: MetricKind) -> Vec<String> {
    let name = properties.get("name").and_then(Value::as_str).unwrap_or_default();
    let count = match properties.get("count") {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let surface = match properties.get("surfaceHa") {
        Some(Value::Number(n)) => n.as_f64().map_or_else(|| n.to_string(), |v| format!("{v:.2}")),
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    vec![
        name.to_string(),
        format!("Incendies: {count}"),
        format!("Surface: {surface} ha"),
        format!("Mesure: {}", kind.label()),
    ]
}

// ============================================================================
// Renderer
// ============================================================================

fn overlay_layer() -> PaintLayer {
    let get = |property: &str| Expression::Get(property.to_string());
    PaintLayer::new(OVERLAY_LAYER, LayerType::Circle, OVERLAY_SOURCE)
        .with_paint(PaintProperty::CircleRadius, get("radius"))
        .with_paint(PaintProperty::CircleColor, get("color"))
        .with_paint(PaintProperty::CircleOpacity, 0.55)
        .with_paint(PaintProperty::CircleStrokeColor, get("color"))
        .with_paint(PaintProperty::CircleStrokeWidth, 2.0)
}

/// Creates the overlay source and circle layer, or refreshes the source data.
///
/// Returns true if the overlay was created by this call.
pub fn ensure_overlay<R: Renderer + ?Sized>(data: Arc<Value>, renderer: &mut R) -> Result<bool> {
    if !renderer.is_style_loaded() {
        trace!("overlay deferred; style not loaded");
        return Err(CompositorError::RendererNotReady);
    }

    let created = if renderer.has_source(OVERLAY_SOURCE) {
        renderer.set_source_data(OVERLAY_SOURCE, data)?;
        false
    } else {
        renderer.add_source(OVERLAY_SOURCE, data)?;
        true
    };
    if !renderer.has_layer(OVERLAY_LAYER) {
        debug!("adding department overlay");
        renderer.add_layer(overlay_layer(), None)?;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{MemoryRenderer, Mutation};
    use crate::style::expression::PaintValue;

    fn points() -> Vec<DepartmentMetric> {
        vec![
            DepartmentMetric::new("13", 40, 10.0, MetricKind::Count),
            DepartmentMetric::new("83", 10, 99.0, MetricKind::Count),
            DepartmentMetric::new("2A", 1, 1.0, MetricKind::Count),
        ]
    }

    #[test]
    fn features_scale_by_max_metric() {
        let fc = overlay_geojson(&points(), true);
        let features = fc["features"].as_array().unwrap();
        assert_eq!(features.len(), 2, "unknown department is dropped");

        let top = &features[0]["properties"];
        assert_eq!(top["name"], "Bouches-du-Rhône (13)");
        assert_eq!(top["intensity"], 1.0);
        assert_eq!(top["radius"], 26.0);
        assert_eq!(top["color"], "rgb(239,68,68)");
        assert_eq!(features[0]["geometry"]["coordinates"], json!([5.369, 43.296]));

        let low = &features[1]["properties"];
        assert_eq!(low["intensity"], 0.25);
        assert_eq!(low["radius"], 12.5);
    }

    #[test]
    fn unknown_rows_still_count_towards_max() {
        let mut rows = points();
        rows[2].metric = Some(100.0);
        let fc = overlay_geojson(&rows, true);
        assert_eq!(fc["features"][0]["properties"]["intensity"], 0.4);
    }

    #[test]
    fn zero_max_gives_zero_intensity() {
        let rows = vec![DepartmentMetric::new("04", 0, 0.0, MetricKind::Surface)];
        let fc = overlay_geojson(&rows, true);
        let props = &fc["features"][0]["properties"];
        assert_eq!(props["intensity"], 0.0);
        assert_eq!(props["radius"], 8.0);
        assert_eq!(props["color"], "rgb(245,158,11)");
    }

    #[test]
    fn hidden_overlay_is_empty() {
        let fc = overlay_geojson(&points(), false);
        assert_eq!(fc["features"], json!([]));
    }

    #[test]
    fn metric_json_accepts_missing_fields() {
        let row: DepartmentMetric = serde_json::from_str(r#"{"departement": "05"}"#).unwrap();
        assert_eq!(row.metric, None);
        assert_eq!(row.metric_value(), 0.0);
    }

    #[test]
    fn tooltip_formats_surface() {
        let fc = overlay_geojson(&[DepartmentMetric::new("84", 3, 12.346, MetricKind::Surface)], true);
        let props = fc["features"][0]["properties"].as_object().unwrap();
        assert_eq!(
            tooltip_lines(props, MetricKind::Surface),
            ["Vaucluse (84)", "Incendies: 3", "Surface: 12.35 ha", "Mesure: surface"]
        );
        assert_eq!(tooltip_lines(&Map::new(), MetricKind::Count)[1], "Incendies: -");
    }

    #[test]
    fn ensure_creates_then_updates() {
        let mut renderer = MemoryRenderer::new();
        let data = Arc::new(overlay_geojson(&points(), true));

        assert!(ensure_overlay(Arc::clone(&data), &mut renderer).unwrap());
        assert_eq!(renderer.layer_ids(), [OVERLAY_LAYER]);
        assert_eq!(
            renderer.paint_property(OVERLAY_LAYER, PaintProperty::CircleColor),
            Some(PaintValue::Expression(Expression::Get("color".into())))
        );
        renderer.take_journal();

        assert!(!ensure_overlay(data, &mut renderer).unwrap());
        assert_eq!(renderer.journal(), [Mutation::SetSourceData(OVERLAY_SOURCE.into())]);
    }

    #[test]
    fn ensure_waits_for_style() {
        let mut renderer = MemoryRenderer::loading();
        let err = ensure_overlay(Arc::new(overlay_geojson(&[], true)), &mut renderer).unwrap_err();
        assert_eq!(err, CompositorError::RendererNotReady);
    }
}
