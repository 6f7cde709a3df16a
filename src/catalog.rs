//! QGIS2Web layer catalogs and layer payloads.
//!
//! A catalog lists the layers of one QGIS2Web export; payloads are fetched
//! per layer on demand. Both come from the backend as JSON:
//!
//! ```json
//! {
//!   "export": "qgis2web_2024_05_01",
//!   "layers": [
//!     {
//!       "id": "Communes_3",
//!       "name": "Communes",
//!       "filename": "Communes_3.js",
//!       "kind": "geojson",
//!       "style": { "kind": "simple", "stroke": "#232323", "weight": 1.0 },
//!       "order": 5120
//!     }
//!   ]
//! }
//! ```
//!
//! An export also ships each layer as a script (`var json_Communes_3 = {...};`)
//! which [`parse_layer_script`] reads directly.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::CatalogError;
use crate::layer::LayerSpec;
use crate::style::StyleSpec;

/// Order given to layers the export index does not mention.
pub const UNLISTED_ORDER: f64 = 1_000_000_000.0;

// ============================================================================
// Catalog
// ============================================================================

/// One layer of an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Styles that do not decode read as `None`; the layer then paints
    /// with the fallback palette.
    #[serde(default, deserialize_with = "lenient_style")]
    pub style: Option<StyleSpec>,
    #[serde(default)]
    pub order: Option<f64>,
}

fn default_kind() -> String {
    "geojson".to_string()
}

fn lenient_style<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<StyleSpec>, D::Error> {
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match StyleSpec::deserialize(value) {
        Ok(style) => Ok(Some(style)),
        Err(error) => {
            warn!(%error, "ignoring undecodable layer style");
            Ok(None)
        }
    }
}

impl LayerEntry {
    /// Creates an entry for a layer script file (`{id}.js`), named after
    /// its id and ordered by its position in the export's `index.html`.
    pub fn from_script(filename: &str, index_html: &str) -> Self {
        let id = filename.strip_suffix(".js").unwrap_or(filename);
        Self {
            id: id.to_string(),
            name: display_name(id).to_string(),
            filename: filename.to_string(),
            kind: default_kind(),
            style: None,
            order: Some(index_order(index_html, id).map_or(UNLISTED_ORDER, |p| p as f64)),
        }
    }

    pub fn with_style(mut self, style: StyleSpec) -> Self {
        self.style = Some(style);
        self
    }
}

/// The layers of one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerCatalog {
    #[serde(default)]
    pub export: Option<String>,
    #[serde(default)]
    pub layers: Vec<LayerEntry>,
}

impl LayerCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, id: &str) -> Option<&LayerEntry> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Sorts layers by order (unlisted last), then name, then id.
    pub fn sort(&mut self) {
        let order = |l: &LayerEntry| l.order.filter(|o| o.is_finite()).unwrap_or(UNLISTED_ORDER);
        self.layers.sort_by(|a, b| {
            order(a)
                .total_cmp(&order(b))
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    /// Builds the compositor input for the enabled layers.
    ///
    /// Layers whose payload has not been loaded yet are omitted; they join
    /// on a later pass once their payload arrives.
    pub fn layer_specs(
        &self,
        enabled: &[String],
        payloads: &HashMap<String, Arc<Value>>,
    ) -> Vec<LayerSpec> {
        self.layers
            .iter()
            .filter(|entry| enabled.contains(&entry.id))
            .filter_map(|entry| {
                let geojson = payloads.get(&entry.id)?;
                Some(LayerSpec {
                    id: entry.id.clone(),
                    geojson: Some(Arc::clone(geojson)),
                    style: entry.style.clone(),
                    order: entry.order,
                })
            })
            .collect()
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// The GeoJSON of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPayload {
    #[serde(default)]
    pub export: Option<String>,
    pub id: String,
    pub geojson: Value,
}

impl LayerPayload {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Extracts the GeoJSON object embedded in a QGIS2Web layer script.
///
/// Takes everything from the first `{` through the last `}`.
pub fn parse_layer_script(text: &str) -> Result<Value, CatalogError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(CatalogError::MalformedScript("no object literal".into()));
    };
    if end <= start {
        return Err(CatalogError::MalformedScript("unbalanced braces".into()));
    }
    let value: Value = serde_json::from_str(&text[start..=end])?;
    if !value.is_object() {
        return Err(CatalogError::MalformedScript("payload is not an object".into()));
    }
    Ok(value)
}

/// Strips a trailing `_<digits>` suffix: `Communes_3` reads `Communes`.
///
/// Ids that are nothing but the suffix are returned unchanged.
pub fn display_name(id: &str) -> &str {
    match id.rsplit_once('_') {
        Some((stem, digits))
            if !stem.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            stem
        }
        _ => id,
    }
}

/// Position of the first reference to a layer in the export's `index.html`,
/// as `layer_{id}` or `json_{id}`.
pub fn index_order(index_html: &str, id: &str) -> Option<usize> {
    let layer = index_html.find(&format!("layer_{id}"));
    let json = index_html.find(&format!("json_{id}"));
    layer.into_iter().chain(json).min()
}
