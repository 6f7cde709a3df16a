//! Per-layer paint plan: which paint layers an id needs and with what paint.

use super::{DesiredLayer, LayerIds};
use crate::geometry::{GeometryKind, infer_geometry_kind};
use crate::renderer::{LayerType, PaintLayer, PaintProperty};
use crate::settings::PaintDefaults;
use crate::style::{ResolvedPaint, resolve_paint};

/// The paint layers one wanted layer should have.
///
/// A `None` slot means the paint layer must not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlan {
    pub ids: LayerIds,
    pub kind: GeometryKind,
    pub paint: ResolvedPaint,
    pub fill: Option<PaintLayer>,
    pub line: Option<PaintLayer>,
    pub point: Option<PaintLayer>,
}

impl LayerPlan {
    /// Plans the paint layers of a wanted layer.
    ///
    /// - fill: polygons, unless fill is disabled
    /// - point: points
    /// - line: always, except polygons whose stroke is disabled
    pub fn new(layer: &DesiredLayer<'_>, defaults: &PaintDefaults) -> Self {
        let ids = LayerIds::for_layer(&layer.spec.id);
        let kind = infer_geometry_kind(layer.geojson);
        let paint = resolve_paint(&layer.spec.id, layer.spec.style.as_ref(), defaults);

        let fill = (kind == GeometryKind::Polygon && paint.fill_enabled).then(|| {
            PaintLayer::new(&ids.fill, LayerType::Fill, &ids.source)
                .with_paint(PaintProperty::FillColor, paint.fill_color.clone())
                .with_paint(PaintProperty::FillOpacity, paint.fill_opacity)
        });

        let point = (kind == GeometryKind::Point).then(|| {
            PaintLayer::new(&ids.point, LayerType::Circle, &ids.source)
                .with_paint(PaintProperty::CircleRadius, defaults.circle_radius)
                .with_paint(PaintProperty::CircleColor, paint.fill_color.clone())
                .with_paint(PaintProperty::CircleOpacity, paint.fill_opacity.clamp(0.0, 1.0))
                .with_paint(PaintProperty::CircleStrokeColor, paint.stroke_color.clone())
                .with_paint(PaintProperty::CircleStrokeWidth, defaults.circle_stroke_width)
        });

        let draw_line = kind != GeometryKind::Polygon || paint.stroke_enabled;
        let line = draw_line.then(|| {
            PaintLayer::new(&ids.line, LayerType::Line, &ids.source)
                .with_paint(PaintProperty::LineColor, paint.stroke_color.clone())
                .with_paint(PaintProperty::LineWidth, paint.line_width)
                .with_paint(PaintProperty::LineOpacity, paint.stroke_opacity)
        });

        Self {
            ids,
            kind,
            paint,
            fill,
            line,
            point,
        }
    }

    /// Each paint layer id with its planned definition, in creation order.
    pub fn slots(&self) -> [(&str, Option<&PaintLayer>); 3] {
        [
            (&self.ids.fill, self.fill.as_ref()),
            (&self.ids.point, self.point.as_ref()),
            (&self.ids.line, self.line.as_ref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerSpec;
    use crate::style::StyleSpec;
    use crate::style::expression::PaintValue;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn geojson(ty: &str) -> Arc<Value> {
        Arc::new(json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": ty, "coordinates": []}}
        ]}))
    }

    fn plan(spec: &LayerSpec) -> LayerPlan {
        let layer = DesiredLayer {
            spec,
            geojson: spec.geojson.as_ref().unwrap(),
        };
        LayerPlan::new(&layer, &PaintDefaults::default())
    }

    fn style(value: Value) -> StyleSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn polygon_gets_fill_and_line() {
        let p = plan(&LayerSpec::new("p", geojson("MultiPolygon")));
        assert_eq!(p.kind, GeometryKind::Polygon);
        assert!(p.fill.is_some() && p.line.is_some() && p.point.is_none());
    }

    #[test]
    fn polygon_fill_and_stroke_can_be_disabled() {
        let spec = LayerSpec::new("p", geojson("Polygon")).with_style(style(json!({
            "kind": "simple", "fill": "#fff", "fillEnabled": false, "strokeEnabled": false
        })));
        let p = plan(&spec);
        assert!(p.fill.is_none());
        assert!(p.line.is_none());
    }

    #[test]
    fn stroke_disable_only_affects_polygons() {
        let spec = LayerSpec::new("l", geojson("LineString"))
            .with_style(style(json!({"kind": "simple", "strokeEnabled": false})));
        assert!(plan(&spec).line.is_some());
    }

    #[test]
    fn points_get_circle_and_line() {
        let spec = LayerSpec::new("pt", geojson("Point")).with_style(style(json!({
            "kind": "simple", "fill": "#f00", "stroke": "#000", "fillOpacity": 3.0
        })));
        let p = plan(&spec);
        let circle = p.point.as_ref().unwrap();
        assert_eq!(circle.layer_type, LayerType::Circle);
        assert!(circle.paint.contains(&(PaintProperty::CircleOpacity, PaintValue::Number(1.0))));
        assert!(circle.paint.contains(&(PaintProperty::CircleRadius, PaintValue::Number(4.5))));
        assert!(p.line.is_some());
        assert!(p.fill.is_none());
    }

    #[test]
    fn unknown_kind_draws_line_only() {
        let spec = LayerSpec::new("u", Arc::new(json!({"type": "FeatureCollection", "features": []})));
        let p = plan(&spec);
        assert_eq!(p.kind, GeometryKind::Unknown);
        assert!(p.fill.is_none() && p.point.is_none());
        assert!(p.line.is_some());
    }

    #[test]
    fn paint_layers_reference_the_layer_source() {
        let p = plan(&LayerSpec::new("x", geojson("Polygon")));
        for (_, layer) in p.slots() {
            if let Some(layer) = layer {
                assert_eq!(layer.source, "qgis-src-x");
            }
        }
    }
}
