//! maplayer-compositor: dynamic vector layer compositing for web maps
//!
//! This crate keeps a vector-map renderer's sources and paint layers in
//! line with a list of externally styled GeoJSON layers. It translates
//! QGIS2Web-style styling (simple, categorical, graduated) into renderer
//! paint expressions, keeps a deterministic draw order below a fixed anchor
//! layer across style reloads, and frames the camera once on an anchor
//! dataset.
//!
//! # Example
//!
//! ```
//! use maplayer_compositor::{Compositor, LayerSpec, MemoryRenderer, StyleSpec};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let zones = Arc::new(json!({"type": "FeatureCollection", "features": [
//!     {"type": "Feature", "properties": {"pop": 50},
//!      "geometry": {"type": "Polygon", "coordinates": [[[5, 43], [7, 43], [7, 45], [5, 43]]]}}
//! ]}));
//! let style: StyleSpec = serde_json::from_value(json!({
//!     "kind": "simple", "fill": "rgba(255,0,0,0.5)", "fillOpacity": 0.8
//! })).unwrap();
//!
//! let mut renderer = MemoryRenderer::new();
//! let mut compositor = Compositor::default();
//!
//! // Call on every data change and every style event.
//! let report = compositor
//!     .synchronize(&[LayerSpec::new("zones", zones).with_style(style)], &mut renderer)
//!     .unwrap();
//! assert_eq!(report.layers_added, 2);
//! assert_eq!(renderer.layer_ids(), ["qgis-fill-zones", "qgis-line-zones"]);
//! ```

mod boundary;
mod catalog;
mod compositor;
mod error;
mod geometry;
mod layer;
mod overlay;
mod renderer;
mod settings;
mod style;

pub use boundary::{BoundaryCache, BoundaryLayer, BoundaryStyle, FetchTicket, sync_boundaries};
pub use catalog::{
    LayerCatalog, LayerEntry, LayerPayload, UNLISTED_ORDER, display_name, index_order,
    parse_layer_script,
};
pub use compositor::{Compositor, Configurable, Datasets, RefreshReport, Scene, SyncReport};
pub use error::{CatalogError, CompositorError, RendererError, Result};
pub use geometry::{BoundingBox, GeometryKind, compute_bounding_box, infer_geometry_kind};
pub use layer::{DesiredLayer, LayerIds, LayerPlan, LayerSpec, desired_layers};
pub use overlay::{
    DEPARTMENTS, Department, DepartmentMetric, MetricKind, OVERLAY_LAYER, OVERLAY_SOURCE,
    department, ensure_overlay, overlay_geojson, tooltip_lines,
};
pub use renderer::{
    FitOptions, LayerType, MemoryRenderer, Mutation, PaintLayer, PaintProperty, Renderer,
};
pub use settings::{CompositorSettings, PaintDefaults};
pub use style::color::{
    SplitColor, TRANSPARENT, color_for_intensity, fallback_color, layer_id_hash, split_color_alpha,
};
pub use style::expression::{
    CaseExpression, Expression, MatchExpression, PaintValue, RangeBranch,
    build_categorical_expression, build_graduated_expression,
};
pub use style::{
    CategoricalStyle, CategoryColors, CategoryEntry, Channel, GraduatedRule, GraduatedStyle,
    ResolvedPaint, SimpleStyle, StyleSpec, effective_color, resolve_paint,
};
