//! The layer compositor: reconciles wanted layers with renderer state.

use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::boundary::{BoundaryCache, BoundaryLayer, sync_boundaries};
use crate::error::{CompositorError, Result};
use crate::geometry::compute_bounding_box;
use crate::layer::{LayerIds, LayerPlan, LayerSpec, apply_stack_order, desired_layers, stack_order};
use crate::overlay::ensure_overlay;
use crate::renderer::{FitOptions, PaintLayer, Renderer};
use crate::settings::CompositorSettings;

// ============================================================================
// Traits
// ============================================================================

/// Trait for types that can be configured from [`CompositorSettings`].
pub trait Configurable {
    /// Applies settings to this instance.
    fn apply_settings(&mut self, settings: &CompositorSettings);

    /// Exports the current settings.
    fn export_settings(&self) -> CompositorSettings;
}

/// Lookup of GeoJSON datasets by id, used to find the camera anchor.
pub trait Datasets {
    fn dataset(&self, id: &str) -> Option<Arc<Value>>;
}

impl Datasets for [LayerSpec] {
    fn dataset(&self, id: &str) -> Option<Arc<Value>> {
        self.iter()
            .find(|spec| spec.id == id)
            .and_then(|spec| spec.geojson.clone())
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Renderer mutations performed by one [`Compositor::synchronize`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Ids whose render state was torn down.
    pub removed_ids: Vec<String>,
    pub sources_added: usize,
    pub sources_updated: usize,
    pub layers_added: usize,
    pub layers_removed: usize,
    pub paint_updates: usize,
    /// Moves made by the ordering pass.
    pub moves: usize,
}

/// Inputs of a full [`Compositor::refresh`].
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    /// Department overlay data; `None` leaves the overlay alone.
    pub overlay: Option<&'a Arc<Value>>,
    pub boundaries: &'a [BoundaryLayer],
    pub boundary_data: &'a BoundaryCache,
    pub layers: &'a [LayerSpec],
}

/// Outcome of a [`Compositor::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub overlay_created: bool,
    pub boundaries: usize,
    pub sync: SyncReport,
    pub camera_fitted: bool,
}

// ============================================================================
// Compositor
// ============================================================================

/// Owns the compositor state: the settings, the set of ids with live render
/// state, and the one-shot camera guard.
///
/// The renderer is borrowed per call. Every pass is idempotent and safe to
/// run after any lifecycle event, including a full style swap.
///
/// # Example
///
/// ```
/// use maplayer_compositor::{Compositor, LayerSpec, MemoryRenderer};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let geojson = Arc::new(json!({"type": "FeatureCollection", "features": [
///     {"type": "Feature", "properties": {}, "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
/// ]}));
///
/// let mut renderer = MemoryRenderer::new();
/// let mut compositor = Compositor::default();
/// compositor.synchronize(&[LayerSpec::new("roads", geojson)], &mut renderer).unwrap();
///
/// assert_eq!(renderer.layer_ids(), ["qgis-line-roads"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    settings: CompositorSettings,
    materialized: BTreeSet<String>,
    camera_fitted: bool,
}

impl Compositor {
    pub fn new(settings: CompositorSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// Ids that currently have render state, sorted.
    pub fn materialized(&self) -> impl Iterator<Item = &str> {
        self.materialized.iter().map(String::as_str)
    }

    pub fn camera_fitted(&self) -> bool {
        self.camera_fitted
    }

    /// Brings the renderer in line with `desired`.
    ///
    /// Removes render state of ids no longer wanted, then upserts each
    /// wanted layer's source and paint layers below the anchor layer, then
    /// re-establishes the stack order. Paint properties are only written
    /// when they differ from the renderer's current value.
    ///
    /// Fails with [`CompositorError::RendererNotReady`] without touching the
    /// renderer while its style is loading. A renderer failure midway stops
    /// the pass; the next pass recomputes everything from scratch.
    pub fn synchronize<R: Renderer + ?Sized>(
        &mut self,
        desired: &[LayerSpec],
        renderer: &mut R,
    ) -> Result<SyncReport> {
        if !renderer.is_style_loaded() {
            trace!("sync deferred; style not loaded");
            return Err(CompositorError::RendererNotReady);
        }

        let desired = desired_layers(desired);
        let wanted: BTreeSet<&str> = desired.iter().map(|d| d.spec.id.as_str()).collect();
        let mut report = SyncReport::default();

        let stale: Vec<String> = self
            .materialized
            .iter()
            .filter(|id| !wanted.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            self.teardown(&id, renderer, &mut report)?;
            self.materialized.remove(&id);
            debug!(%id, "removed layer");
            report.removed_ids.push(id);
        }

        let anchor = self.settings.anchor_layer.as_str();
        let before = renderer.has_layer(anchor).then_some(anchor);

        let mut plans = Vec::with_capacity(desired.len());
        for layer in &desired {
            let plan = LayerPlan::new(layer, &self.settings.paint);

            if renderer.has_source(&plan.ids.source) {
                renderer.set_source_data(&plan.ids.source, Arc::clone(layer.geojson))?;
                report.sources_updated += 1;
            } else {
                renderer.add_source(&plan.ids.source, Arc::clone(layer.geojson))?;
                report.sources_added += 1;
            }
            self.materialized.insert(layer.spec.id.clone());

            for (id, target) in plan.slots() {
                match target {
                    Some(target) if renderer.has_layer(id) => {
                        report.paint_updates += update_paint(renderer, target)?;
                    }
                    Some(target) => {
                        debug!(%id, "adding paint layer");
                        renderer.add_layer(target.clone(), before)?;
                        report.layers_added += 1;
                    }
                    None if renderer.has_layer(id) => {
                        debug!(%id, "removing inapplicable paint layer");
                        renderer.remove_layer(id)?;
                        report.layers_removed += 1;
                    }
                    None => {}
                }
            }
            plans.push(plan);
        }

        report.moves = apply_stack_order(renderer, &stack_order(&plans), before)?;
        trace!(?report, "sync complete");
        Ok(report)
    }

    fn teardown<R: Renderer + ?Sized>(
        &self,
        id: &str,
        renderer: &mut R,
        report: &mut SyncReport,
    ) -> Result<()> {
        let ids = LayerIds::for_layer(id);
        for layer in ids.paint_layers() {
            if renderer.has_layer(layer) {
                renderer.remove_layer(layer)?;
                report.layers_removed += 1;
            }
        }
        if renderer.has_source(&ids.source) {
            renderer.remove_source(&ids.source)?;
        }
        Ok(())
    }

    /// Fits the camera to the bounds of dataset `anchor_id`, once per session.
    ///
    /// Returns true if the camera moved. Does nothing when a fit already
    /// happened or the dataset is not available or has no usable bounds.
    pub fn fit_once<R, D>(&mut self, anchor_id: &str, datasets: &D, renderer: &mut R) -> Result<bool>
    where
        R: Renderer + ?Sized,
        D: Datasets + ?Sized,
    {
        if self.camera_fitted {
            return Ok(false);
        }
        if !renderer.is_style_loaded() {
            return Err(CompositorError::RendererNotReady);
        }
        let Some(bounds) = datasets
            .dataset(anchor_id)
            .and_then(|data| compute_bounding_box(&data))
        else {
            trace!(anchor_id, "camera anchor has no bounds yet");
            return Ok(false);
        };

        let options = FitOptions {
            padding: self.settings.fit_padding,
            duration_ms: self.settings.fit_duration_ms,
        };
        renderer.fit_bounds(bounds, options)?;
        self.camera_fitted = true;
        info!(anchor_id, ?bounds, "camera fitted");
        Ok(true)
    }

    /// Runs every pass in dependency order: overlay (the anchor), boundaries,
    /// dynamic layers, then the one-shot camera fit on the configured anchor
    /// dataset, looked up among boundaries first.
    pub fn refresh<R: Renderer + ?Sized>(
        &mut self,
        scene: &Scene<'_>,
        renderer: &mut R,
    ) -> Result<RefreshReport> {
        let overlay_created = match scene.overlay {
            Some(data) => ensure_overlay(Arc::clone(data), renderer)?,
            None => false,
        };
        let boundaries = sync_boundaries(
            scene.boundaries,
            scene.boundary_data,
            &self.settings.anchor_layer,
            renderer,
        )?;
        let sync = self.synchronize(scene.layers, renderer)?;

        let camera_anchor = self.settings.camera_anchor.clone();
        let camera_fitted = if scene.boundary_data.get(&camera_anchor).is_some() {
            self.fit_once(&camera_anchor, scene.boundary_data, renderer)?
        } else {
            self.fit_once(&camera_anchor, scene.layers, renderer)?
        };

        Ok(RefreshReport {
            overlay_created,
            boundaries,
            sync,
            camera_fitted,
        })
    }
}

impl Configurable for Compositor {
    /// Replaces the settings. Takes effect on the next pass.
    fn apply_settings(&mut self, settings: &CompositorSettings) {
        self.settings = settings.clone();
    }

    fn export_settings(&self) -> CompositorSettings {
        self.settings.clone()
    }
}

/// Writes the paint properties of `target` that differ from the renderer's.
fn update_paint<R: Renderer + ?Sized>(renderer: &mut R, target: &PaintLayer) -> Result<usize> {
    let mut updates = 0;
    for (property, value) in &target.paint {
        if renderer.paint_property(&target.id, *property).as_ref() != Some(value) {
            renderer.set_paint_property(&target.id, *property, value.clone())?;
            updates += 1;
        }
    }
    Ok(updates)
}
