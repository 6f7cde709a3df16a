//! Static administrative boundary layers.
//!
//! Boundaries are fetched once per session, cached, and re-added below the
//! anchor layer after every style reload. Unlike dynamic layers they are
//! add-only: an existing paint layer is never repainted or removed.
//!
//! # Fetch Tickets
//!
//! Fetching happens outside the crate. The caller asks the cache for a
//! [`FetchTicket`] before starting a request and hands the ticket back with
//! the payload:
//!
//! ```
//! use maplayer_compositor::BoundaryCache;
//! use serde_json::json;
//!
//! let mut cache = BoundaryCache::new();
//! let stale = cache.begin_fetch("communes").unwrap();
//! let latest = cache.begin_fetch("communes").unwrap();
//!
//! assert!(!cache.complete(stale, json!({"type": "FeatureCollection", "features": []})));
//! assert!(cache.complete(latest, json!({"type": "FeatureCollection", "features": []})));
//! assert!(cache.get("communes").is_some());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::compositor::Datasets;
use crate::error::{CompositorError, Result};
use crate::renderer::{LayerType, PaintLayer, PaintProperty, Renderer};

// ============================================================================
// Boundary Definitions
// ============================================================================

/// How a boundary is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BoundaryStyle {
    /// Filled area with an outline.
    #[serde(rename_all = "camelCase")]
    Fill {
        fill_color: String,
        line_color: String,
        line_width: f64,
    },
    /// Outline only.
    #[serde(rename_all = "camelCase")]
    Line { line_color: String, line_width: f64 },
}

/// A static boundary dataset served as a GeoJSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryLayer {
    pub id: String,
    pub url: String,
    #[serde(flatten)]
    pub style: BoundaryStyle,
}

impl BoundaryLayer {
    pub fn new(id: impl Into<String>, url: impl Into<String>, style: BoundaryStyle) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            style,
        }
    }

    /// The built-in boundaries, bottom to top.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "zonePromethee",
                "/geo/zonePromethee.simplified.geojson",
                BoundaryStyle::Fill {
                    fill_color: "rgba(56, 189, 248, 0.18)".into(),
                    line_color: "rgba(56, 189, 248, 0.95)".into(),
                    line_width: 2.4,
                },
            ),
            Self::new(
                "departements",
                "/geo/departements.simplified.geojson",
                BoundaryStyle::Line {
                    line_color: "rgba(251, 146, 60, 0.90)".into(),
                    line_width: 2.2,
                },
            ),
            Self::new(
                "communes",
                "/geo/CommunesPromethee.simplified.geojson",
                BoundaryStyle::Line {
                    line_color: "rgba(148, 163, 184, 0.55)".into(),
                    line_width: 1.0,
                },
            ),
        ]
    }

    pub fn source_id(&self) -> String {
        format!("src-{}", self.id)
    }

    pub fn fill_id(&self) -> String {
        format!("fill-{}", self.id)
    }

    pub fn line_id(&self) -> String {
        format!("line-{}", self.id)
    }

    fn paint_layers(&self) -> Vec<PaintLayer> {
        let source = self.source_id();
        let line = |color: &str, width: f64| {
            PaintLayer::new(self.line_id(), LayerType::Line, &source)
                .with_paint(PaintProperty::LineColor, color)
                .with_paint(PaintProperty::LineWidth, width)
        };
        match &self.style {
            BoundaryStyle::Fill {
                fill_color,
                line_color,
                line_width,
            } => vec![
                PaintLayer::new(self.fill_id(), LayerType::Fill, &source)
                    .with_paint(PaintProperty::FillColor, fill_color.as_str())
                    .with_paint(PaintProperty::FillOpacity, 1.0),
                line(line_color.as_str(), *line_width),
            ],
            BoundaryStyle::Line {
                line_color,
                line_width,
            } => vec![line(line_color.as_str(), *line_width)],
        }
    }
}

// ============================================================================
// BoundaryCache
// ============================================================================

/// Proof that a fetch was started; see [`BoundaryCache::begin_fetch`].
#[derive(Debug, PartialEq, Eq)]
pub struct FetchTicket {
    id: String,
    generation: u64,
}

impl FetchTicket {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Session cache of boundary payloads.
#[derive(Debug, Default)]
pub struct BoundaryCache {
    data: HashMap<String, Arc<Value>>,
    latest: HashMap<String, u64>,
    next_generation: u64,
    closed: bool,
}

impl BoundaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Value>> {
        self.data.get(id)
    }

    /// Returns true if `id` has no payload yet and the cache still accepts one.
    pub fn needs_fetch(&self, id: &str) -> bool {
        !self.closed && !self.data.contains_key(id)
    }

    /// Starts a fetch for `id`, superseding any fetch already in flight.
    ///
    /// Returns `None` once the cache is closed.
    pub fn begin_fetch(&mut self, id: &str) -> Option<FetchTicket> {
        if self.closed {
            return None;
        }
        self.next_generation += 1;
        self.latest.insert(id.to_string(), self.next_generation);
        Some(FetchTicket {
            id: id.to_string(),
            generation: self.next_generation,
        })
    }

    /// Stores a fetched payload.
    ///
    /// The payload is discarded when a later fetch for the same id was
    /// started or the cache was closed. Returns true if it was stored.
    pub fn complete(&mut self, ticket: FetchTicket, data: Value) -> bool {
        let current = self.latest.get(&ticket.id) == Some(&ticket.generation);
        if self.closed || !current {
            debug!(id = %ticket.id, generation = ticket.generation, "discarding stale boundary fetch");
            return false;
        }
        self.latest.remove(&ticket.id);
        self.data.insert(ticket.id, Arc::new(data));
        true
    }

    /// Stops accepting payloads. In-flight fetches complete into the void.
    pub fn close(&mut self) {
        self.closed = true;
        self.latest.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Datasets for BoundaryCache {
    fn dataset(&self, id: &str) -> Option<Arc<Value>> {
        self.get(id).cloned()
    }
}

// ============================================================================
// Synchronization
// ============================================================================

/// Adds every cached boundary to the renderer, below `anchor` if it exists.
///
/// Sources receive the cached payload on every pass; paint layers are only
/// added when missing. Boundaries without a payload are skipped. Returns the
/// number of boundaries present in the renderer afterwards.
pub fn sync_boundaries<R: Renderer + ?Sized>(
    boundaries: &[BoundaryLayer],
    cache: &BoundaryCache,
    anchor: &str,
    renderer: &mut R,
) -> Result<usize> {
    if !renderer.is_style_loaded() {
        trace!("boundary sync deferred; style not loaded");
        return Err(CompositorError::RendererNotReady);
    }

    let mut synced = 0;
    for boundary in boundaries {
        let Some(data) = cache.get(&boundary.id) else {
            continue;
        };
        let before = renderer.has_layer(anchor).then_some(anchor);

        let source = boundary.source_id();
        if renderer.has_source(&source) {
            renderer.set_source_data(&source, Arc::clone(data))?;
        } else {
            renderer.add_source(&source, Arc::clone(data))?;
        }

        for layer in boundary.paint_layers() {
            if !renderer.has_layer(&layer.id) {
                debug!(id = %layer.id, "adding boundary layer");
                renderer.add_layer(layer, before)?;
            }
        }
        synced += 1;
    }
    Ok(synced)
}
