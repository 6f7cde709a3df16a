//! In-memory renderer.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{FitOptions, LayerType, PaintLayer, PaintProperty, Renderer};
use crate::error::RendererError;
use crate::geometry::BoundingBox;
use crate::style::expression::PaintValue;

/// A renderer mutation, recorded in [`MemoryRenderer::journal`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddSource(String),
    SetSourceData(String),
    RemoveSource(String),
    AddLayer(String),
    RemoveLayer(String),
    SetPaint(String, PaintProperty),
    MoveLayer(String),
    FitBounds(BoundingBox),
}

/// A renderer that keeps sources and the layer stack in memory.
///
/// Behaves like a browser map renderer in the ways the compositor relies on:
/// mutations are refused until the style is loaded, layers must reference an
/// existing source, a source cannot be removed while a layer uses it, and a
/// style reload drops everything.
#[derive(Debug, Default)]
pub struct MemoryRenderer {
    loaded: bool,
    sources: BTreeMap<String, Arc<Value>>,
    /// Bottom to top.
    layers: Vec<PaintLayer>,
    camera: Option<(BoundingBox, FitOptions)>,
    journal: Vec<Mutation>,
}

impl MemoryRenderer {
    /// Creates a renderer whose style is already loaded.
    pub fn new() -> Self {
        Self {
            loaded: true,
            ..Self::default()
        }
    }

    /// Creates a renderer that is still loading its style.
    pub fn loading() -> Self {
        Self::default()
    }

    /// Marks the style as loaded or not.
    pub fn set_style_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    /// Swaps in a new style: all sources and layers are discarded.
    pub fn reload_style(&mut self) {
        self.sources.clear();
        self.layers.clear();
        self.loaded = true;
    }

    /// Layer ids, bottom to top.
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    /// Source ids, sorted.
    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn layer(&self, id: &str) -> Option<&PaintLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn source(&self, id: &str) -> Option<&Arc<Value>> {
        self.sources.get(id)
    }

    /// The last camera fit, if any.
    pub fn camera(&self) -> Option<(BoundingBox, FitOptions)> {
        self.camera
    }

    /// Every mutation applied since creation or the last [`take_journal`](Self::take_journal).
    pub fn journal(&self) -> &[Mutation] {
        &self.journal
    }

    /// Returns and clears the journal.
    pub fn take_journal(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.journal)
    }

    /// The layer stack as renderer-style JSON, bottom to top.
    pub fn style_json(&self) -> Value {
        let layers: Vec<Value> = self
            .layers
            .iter()
            .map(|layer| {
                let paint: Map<String, Value> = layer
                    .paint
                    .iter()
                    .map(|(p, v)| (p.name().to_string(), v.to_json()))
                    .collect();
                json!({
                    "id": layer.id,
                    "type": layer.layer_type.name(),
                    "source": layer.source,
                    "paint": paint,
                })
            })
            .collect();
        json!({ "sources": self.source_ids(), "layers": layers })
    }

    fn ensure_loaded(&self) -> Result<(), RendererError> {
        if self.loaded {
            Ok(())
        } else {
            Err(RendererError::NotReady)
        }
    }

    fn position(&self, id: &str) -> Result<usize, RendererError> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| RendererError::UnknownLayer(id.to_string()))
    }

    fn insertion_index(&self, before: Option<&str>) -> Result<usize, RendererError> {
        match before {
            Some(before) => self.position(before),
            None => Ok(self.layers.len()),
        }
    }
}

impl Renderer for MemoryRenderer {
    fn is_style_loaded(&self) -> bool {
        self.loaded
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: Arc<Value>) -> Result<(), RendererError> {
        self.ensure_loaded()?;
        if self.sources.contains_key(id) {
            return Err(RendererError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), data);
        self.journal.push(Mutation::AddSource(id.to_string()));
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: Arc<Value>) -> Result<(), RendererError> {
        self.ensure_loaded()?;
        let slot = self
            .sources
            .get_mut(id)
            .ok_or_else(|| RendererError::UnknownSource(id.to_string()))?;
        *slot = data;
        self.journal.push(Mutation::SetSourceData(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), RendererError> {
        self.ensure_loaded()?;
        if let Some(user) = self.layers.iter().find(|l| l.source == id) {
            return Err(RendererError::InvalidInput(format!(
                "source {id} is still used by layer {}",
                user.id
            )));
        }
        self.sources
            .remove(id)
            .ok_or_else(|| RendererError::UnknownSource(id.to_string()))?;
        self.journal.push(Mutation::RemoveSource(id.to_string()));
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn add_layer(&mut self, layer: PaintLayer, before: Option<&str>) -> Result<(), RendererError> {
        self.ensure_loaded()?;
        if self.has_layer(&layer.id) {
            return Err(RendererError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(RendererError::UnknownSource(layer.source));
        }
        if let Some((property, _)) = layer
            .paint
            .iter()
            .find(|(p, _)| p.layer_type() != layer.layer_type)
        {
            return Err(RendererError::InvalidInput(format!(
                "{} is not a {} paint property",
                property.name(),
                layer.layer_type.name()
            )));
        }
        let index = self.insertion_index(before)?;
        self.journal.push(Mutation::AddLayer(layer.id.clone()));
        self.layers.insert(index, layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), RendererError> {
        self.ensure_loaded()?;
        let index = self.position(id)?;
        self.layers.remove(index);
        self.journal.push(Mutation::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn paint_property(&self, layer: &str, property: PaintProperty) -> Option<PaintValue> {
        self.layer(layer)?
            .paint
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, v)| v.clone())
    }

    fn set_paint_property(
        &mut self,
        layer: &str,
        property: PaintProperty,
        value: PaintValue,
    ) -> Result<(), RendererError> {
        self.ensure_loaded()?;
        let index = self.position(layer)?;
        let target = &mut self.layers[index];
        if property.layer_type() != target.layer_type {
            return Err(RendererError::InvalidInput(format!(
                "{} is not a {} paint property",
                property.name(),
                target.layer_type.name()
            )));
        }
        match target.paint.iter_mut().find(|(p, _)| *p == property) {
            Some(slot) => slot.1 = value,
            None => target.paint.push((property, value)),
        }
        self.journal
            .push(Mutation::SetPaint(layer.to_string(), property));
        Ok(())
    }

    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), RendererError> {
        self.ensure_loaded()?;
        let from = self.position(id)?;
        if before == Some(id) {
            return Ok(());
        }
        // Validate the target before detaching the layer.
        self.insertion_index(before)?;
        let layer = self.layers.remove(from);
        let to = self.insertion_index(before)?;
        self.layers.insert(to, layer);
        self.journal.push(Mutation::MoveLayer(id.to_string()));
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: BoundingBox, options: FitOptions) -> Result<(), RendererError> {
        self.ensure_loaded()?;
        self.camera = Some((bounds, options));
        self.journal.push(Mutation::FitBounds(bounds));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Arc<Value> {
        Arc::new(json!({"type": "FeatureCollection", "features": []}))
    }

    fn line(id: &str, source: &str) -> PaintLayer {
        PaintLayer::new(id, LayerType::Line, source).with_paint(PaintProperty::LineWidth, 1.0)
    }

    #[test]
    fn refuses_mutations_until_loaded() {
        let mut renderer = MemoryRenderer::loading();
        assert_eq!(renderer.add_source("s", data()), Err(RendererError::NotReady));

        renderer.set_style_loaded(true);
        assert!(renderer.add_source("s", data()).is_ok());
    }

    #[test]
    fn layers_insert_below_reference() {
        let mut renderer = MemoryRenderer::new();
        renderer.add_source("s", data()).unwrap();
        renderer.add_layer(line("top", "s"), None).unwrap();
        renderer.add_layer(line("a", "s"), Some("top")).unwrap();
        renderer.add_layer(line("b", "s"), Some("top")).unwrap();
        assert_eq!(renderer.layer_ids(), ["a", "b", "top"]);

        renderer.move_layer("b", Some("a")).unwrap();
        assert_eq!(renderer.layer_ids(), ["b", "a", "top"]);

        renderer.move_layer("b", None).unwrap();
        assert_eq!(renderer.layer_ids(), ["a", "top", "b"]);
    }

    #[test]
    fn rejects_inconsistent_requests() {
        let mut renderer = MemoryRenderer::new();
        assert_eq!(
            renderer.add_layer(line("a", "missing"), None),
            Err(RendererError::UnknownSource("missing".into()))
        );

        renderer.add_source("s", data()).unwrap();
        renderer.add_layer(line("a", "s"), None).unwrap();
        assert_eq!(
            renderer.add_layer(line("a", "s"), None),
            Err(RendererError::DuplicateLayer("a".into()))
        );
        assert!(matches!(
            renderer.remove_source("s"),
            Err(RendererError::InvalidInput(_))
        ));
        assert!(matches!(
            renderer.set_paint_property("a", PaintProperty::FillColor, "#fff".into()),
            Err(RendererError::InvalidInput(_))
        ));
        assert_eq!(
            renderer.move_layer("a", Some("nope")),
            Err(RendererError::UnknownLayer("nope".into()))
        );
        assert_eq!(renderer.layer_ids(), ["a"], "failed move leaves the stack intact");
    }

    #[test]
    fn style_reload_discards_everything() {
        let mut renderer = MemoryRenderer::new();
        renderer.add_source("s", data()).unwrap();
        renderer.add_layer(line("a", "s"), None).unwrap();

        renderer.reload_style();
        assert!(renderer.layer_ids().is_empty());
        assert!(renderer.source_ids().is_empty());
        assert!(renderer.is_style_loaded());
    }

    #[test]
    fn paint_updates_are_journaled() {
        let mut renderer = MemoryRenderer::new();
        renderer.add_source("s", data()).unwrap();
        renderer.add_layer(line("a", "s"), None).unwrap();
        renderer.take_journal();

        renderer
            .set_paint_property("a", PaintProperty::LineColor, "#123".into())
            .unwrap();
        assert_eq!(
            renderer.paint_property("a", PaintProperty::LineColor),
            Some(PaintValue::Color("#123".into()))
        );
        assert_eq!(
            renderer.journal(),
            [Mutation::SetPaint("a".into(), PaintProperty::LineColor)]
        );
    }
}
