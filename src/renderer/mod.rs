//! The vector-map renderer the compositor drives.
//!
//! The compositor never owns a renderer: callers pass a `&mut impl Renderer`
//! into every pass. [`MemoryRenderer`] is a complete in-process
//! implementation for tests and offline planning.

pub mod memory;

pub use memory::{MemoryRenderer, Mutation};

use serde_json::Value;
use std::sync::Arc;

use crate::error::RendererError;
use crate::geometry::BoundingBox;
use crate::style::expression::PaintValue;

// ============================================================================
// Paint Layers
// ============================================================================

/// Drawing primitive of a paint layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Fill,
    Line,
    Circle,
}

impl LayerType {
    /// The renderer's name for this layer type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Line => "line",
            Self::Circle => "circle",
        }
    }
}

/// Paint properties the compositor sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PaintProperty {
    FillColor,
    FillOpacity,
    LineColor,
    LineWidth,
    LineOpacity,
    CircleRadius,
    CircleColor,
    CircleOpacity,
    CircleStrokeColor,
    CircleStrokeWidth,
}

impl PaintProperty {
    /// The renderer's name for this property.
    pub fn name(self) -> &'static str {
        match self {
            Self::FillColor => "fill-color",
            Self::FillOpacity => "fill-opacity",
            Self::LineColor => "line-color",
            Self::LineWidth => "line-width",
            Self::LineOpacity => "line-opacity",
            Self::CircleRadius => "circle-radius",
            Self::CircleColor => "circle-color",
            Self::CircleOpacity => "circle-opacity",
            Self::CircleStrokeColor => "circle-stroke-color",
            Self::CircleStrokeWidth => "circle-stroke-width",
        }
    }

    /// The layer type this property belongs to.
    pub fn layer_type(self) -> LayerType {
        match self {
            Self::FillColor | Self::FillOpacity => LayerType::Fill,
            Self::LineColor | Self::LineWidth | Self::LineOpacity => LayerType::Line,
            Self::CircleRadius
            | Self::CircleColor
            | Self::CircleOpacity
            | Self::CircleStrokeColor
            | Self::CircleStrokeWidth => LayerType::Circle,
        }
    }
}

/// A paint layer definition: one drawing instruction bound to a source.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintLayer {
    pub id: String,
    pub layer_type: LayerType,
    pub source: String,
    pub paint: Vec<(PaintProperty, PaintValue)>,
}

impl PaintLayer {
    pub fn new(id: impl Into<String>, layer_type: LayerType, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            layer_type,
            source: source.into(),
            paint: Vec::new(),
        }
    }

    /// Adds a paint property.
    pub fn with_paint(mut self, property: PaintProperty, value: impl Into<PaintValue>) -> Self {
        self.paint.push((property, value.into()));
        self
    }
}

/// Camera options for [`Renderer::fit_bounds`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Padding around the bounds, in pixels.
    pub padding: f64,
    /// Animation duration; 0 jumps.
    pub duration_ms: u64,
}

// ============================================================================
// Renderer
// ============================================================================

/// The minimal renderer surface the compositor needs.
///
/// Mutations fail with [`RendererError::NotReady`] until the renderer's
/// style has loaded. A full style swap discards every source and layer;
/// the compositor rebuilds them on its next pass.
pub trait Renderer {
    /// Returns true once the current style has loaded.
    fn is_style_loaded(&self) -> bool;

    fn has_source(&self, id: &str) -> bool;

    fn add_source(&mut self, id: &str, data: Arc<Value>) -> Result<(), RendererError>;

    /// Replaces the data of an existing source.
    fn set_source_data(&mut self, id: &str, data: Arc<Value>) -> Result<(), RendererError>;

    fn remove_source(&mut self, id: &str) -> Result<(), RendererError>;

    fn has_layer(&self, id: &str) -> bool;

    /// Adds a paint layer directly below `before`, or on top when `None`.
    fn add_layer(&mut self, layer: PaintLayer, before: Option<&str>) -> Result<(), RendererError>;

    fn remove_layer(&mut self, id: &str) -> Result<(), RendererError>;

    /// Current value of a paint property, if the layer exists and sets it.
    fn paint_property(&self, layer: &str, property: PaintProperty) -> Option<PaintValue>;

    fn set_paint_property(
        &mut self,
        layer: &str,
        property: PaintProperty,
        value: PaintValue,
    ) -> Result<(), RendererError>;

    /// Moves a layer directly below `before`, or to the top when `None`.
    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), RendererError>;

    /// Frames the camera on the bounds.
    fn fit_bounds(&mut self, bounds: BoundingBox, options: FitOptions) -> Result<(), RendererError>;
}
