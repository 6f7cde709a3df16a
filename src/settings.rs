//! Serializable compositor settings.
//!
//! [`CompositorSettings`] captures the fixed reference points of the map
//! (anchor layer, camera anchor dataset) and the paint values used when a
//! layer carries no style of its own.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "anchorLayer": "dept-circles",
//!   "cameraAnchor": "zonePromethee",
//!   "fitPadding": 24.0,
//!   "fitDurationMs": 0,
//!   "paint": {
//!     "weight": 2.2,
//!     "opacity": 1.0,
//!     "fillOpacity": 0.14,
//!     "circleRadius": 4.5,
//!     "circleStrokeWidth": 1.0
//!   }
//! }
//! ```
//!
//! Every field is optional when deserializing; missing fields take the
//! defaults shown above.

use serde::{Deserialize, Serialize};

/// Paint values used where a style leaves a number unspecified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct PaintDefaults {
    /// Line width.
    pub weight: f64,
    /// Line opacity.
    pub opacity: f64,
    /// Fill opacity (also circle opacity for point layers).
    pub fill_opacity: f64,
    /// Circle radius for point layers.
    pub circle_radius: f64,
    /// Circle outline width for point layers.
    pub circle_stroke_width: f64,
}

impl Default for PaintDefaults {
    fn default() -> Self {
        Self {
            weight: 2.2,
            opacity: 1.0,
            fill_opacity: 0.14,
            circle_radius: 4.5,
            circle_stroke_width: 1.0,
        }
    }
}

/// Compositor-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct CompositorSettings {
    /// Always-present layer that dynamic layers are stacked below.
    pub anchor_layer: String,

    /// Dataset whose bounds frame the camera on first load.
    pub camera_anchor: String,

    /// Padding around the fitted bounds, in pixels.
    pub fit_padding: f64,

    /// Camera animation duration for the fit.
    pub fit_duration_ms: u64,

    /// Paint fallbacks for unstyled layers.
    pub paint: PaintDefaults,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            anchor_layer: "dept-circles".to_string(),
            camera_anchor: "zonePromethee".to_string(),
            fit_padding: 24.0,
            fit_duration_ms: 0,
            paint: PaintDefaults::default(),
        }
    }
}

impl CompositorSettings {
    /// Creates settings with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the anchor layer id.
    pub fn with_anchor_layer(mut self, id: impl Into<String>) -> Self {
        self.anchor_layer = id.into();
        self
    }

    /// Sets the camera anchor dataset id.
    pub fn with_camera_anchor(mut self, id: impl Into<String>) -> Self {
        self.camera_anchor = id.into();
        self
    }

    /// Serializes the settings to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the settings to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
