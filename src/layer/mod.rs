//! Dynamic vector layers: what the caller wants drawn, and how each wanted
//! layer maps onto renderer sources and paint layers.
//!
//! # Render State Naming
//!
//! Every layer id owns at most one source and three paint layers:
//!
//! ```text
//! qgis-src-{id}    GeoJSON source
//! qgis-fill-{id}   polygon interiors
//! qgis-line-{id}   outlines and line strings
//! qgis-pt-{id}     point circles
//! ```

pub mod plan;
pub mod stack;

pub use plan::LayerPlan;
pub use stack::{apply_stack_order, stack_order};

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::style::StyleSpec;

// ============================================================================
// LayerSpec
// ============================================================================

/// One externally configured dataset the caller wants drawn.
///
/// The payload is shared, not copied: the compositor and the renderer hold
/// the same `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    /// Unique, stable id.
    pub id: String,
    /// GeoJSON payload; layers without one are not drawn yet.
    pub geojson: Option<Arc<Value>>,
    /// Styling; `None` selects the per-id fallback palette.
    pub style: Option<StyleSpec>,
    /// Draw order, ascending bottom to top. `None` sorts last.
    pub order: Option<f64>,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, geojson: Arc<Value>) -> Self {
        Self {
            id: id.into(),
            geojson: Some(geojson),
            style: None,
            order: None,
        }
    }

    pub fn with_style(mut self, style: StyleSpec) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_order(mut self, order: f64) -> Self {
        self.order = Some(order);
        self
    }
}

/// A wanted layer whose payload is available.
#[derive(Debug, Clone, Copy)]
pub struct DesiredLayer<'a> {
    pub spec: &'a LayerSpec,
    pub geojson: &'a Arc<Value>,
}

/// Filters and orders the wanted layers bottom to top.
///
/// Layers without a payload are dropped. Order is by `order` ascending with
/// missing or non-finite orders last, ties broken by id. A repeated id keeps
/// only its first occurrence in that order.
pub fn desired_layers(specs: &[LayerSpec]) -> Vec<DesiredLayer<'_>> {
    let mut desired: Vec<_> = specs
        .iter()
        .filter_map(|spec| {
            let geojson = spec.geojson.as_ref()?;
            (!spec.id.is_empty()).then_some(DesiredLayer { spec, geojson })
        })
        .collect();

    desired.sort_by(|a, b| compare_order(a.spec, b.spec));

    let mut seen = HashSet::new();
    desired.retain(|d| {
        let first = seen.insert(d.spec.id.as_str());
        if !first {
            tracing::warn!(id = %d.spec.id, "duplicate layer id ignored");
        }
        first
    });
    desired
}

fn compare_order(a: &LayerSpec, b: &LayerSpec) -> Ordering {
    let key = |spec: &LayerSpec| spec.order.filter(|o| o.is_finite());
    match (key(a), key(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

// ============================================================================
// LayerIds
// ============================================================================

/// Renderer ids owned by one layer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerIds {
    pub source: String,
    pub fill: String,
    pub line: String,
    pub point: String,
}

impl LayerIds {
    pub fn for_layer(id: &str) -> Self {
        Self {
            source: format!("qgis-src-{id}"),
            fill: format!("qgis-fill-{id}"),
            line: format!("qgis-line-{id}"),
            point: format!("qgis-pt-{id}"),
        }
    }

    /// The paint layer ids, in removal order.
    pub fn paint_layers(&self) -> [&str; 3] {
        [&self.fill, &self.line, &self.point]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(id: &str, order: Option<f64>) -> LayerSpec {
        LayerSpec {
            id: id.to_string(),
            geojson: Some(Arc::new(json!({"type": "FeatureCollection", "features": []}))),
            style: None,
            order,
        }
    }

    fn ids(desired: &[DesiredLayer<'_>]) -> Vec<String> {
        desired.iter().map(|d| d.spec.id.clone()).collect()
    }

    #[test]
    fn missing_order_sorts_last() {
        let specs = [spec("two", Some(2.0)), spec("none", None), spec("one", Some(1.0))];
        assert_eq!(ids(&desired_layers(&specs)), ["one", "two", "none"]);
    }

    #[test]
    fn ties_break_by_id() {
        let specs = [
            spec("b", Some(1.0)),
            spec("z", None),
            spec("a", Some(1.0)),
            spec("y", Some(f64::NAN)),
        ];
        assert_eq!(ids(&desired_layers(&specs)), ["a", "b", "y", "z"]);
    }

    #[test]
    fn layers_without_payload_are_skipped() {
        let mut pending = spec("pending", Some(0.0));
        pending.geojson = None;
        let specs = [pending, spec("ready", Some(5.0))];
        assert_eq!(ids(&desired_layers(&specs)), ["ready"]);
    }

    #[test]
    fn duplicate_ids_keep_first_in_order() {
        let specs = [spec("a", Some(9.0)), spec("a", Some(1.0))];
        let desired = desired_layers(&specs);
        assert_eq!(desired.len(), 1);
        assert_eq!(desired[0].spec.order, Some(1.0));
    }

    #[test]
    fn render_ids() {
        let ids = LayerIds::for_layer("roads_3");
        assert_eq!(ids.source, "qgis-src-roads_3");
        assert_eq!(
            ids.paint_layers(),
            ["qgis-fill-roads_3", "qgis-line-roads_3", "qgis-pt-roads_3"]
        );
    }
}
