//! Stack ordering for dynamic paint layers.

use super::LayerPlan;
use crate::error::RendererError;
use crate::geometry::GeometryKind;
use crate::renderer::Renderer;

/// Expected paint layer ids, bottom to top, for plans already in draw order.
///
/// Each layer contributes its ids as a contiguous group: fill then line for
/// polygons, circle then line for points, the line alone otherwise. Ids
/// whose paint layer is disabled are still listed; the ordering pass skips
/// whatever the renderer does not have.
pub fn stack_order(plans: &[LayerPlan]) -> Vec<String> {
    plans
        .iter()
        .flat_map(|plan| {
            let ids = &plan.ids;
            match plan.kind {
                GeometryKind::Polygon => vec![ids.fill.clone(), ids.line.clone()],
                GeometryKind::Point => vec![ids.point.clone(), ids.line.clone()],
                GeometryKind::Line | GeometryKind::Unknown => vec![ids.line.clone()],
            }
        })
        .collect()
}

/// Moves the listed layers into one contiguous block, in list order,
/// directly below `anchor`.
///
/// Without an anchor the topmost listed layer stays where it is and the
/// rest of the block is gathered below it, so layers added above the block
/// later (boundaries, labels) stay above it.
///
/// Walks the list top-down so every move targets a layer already in its
/// final slot; the result does not depend on the starting order. Layers
/// outside the list keep their relative order. Returns the number of moves.
pub fn apply_stack_order<R: Renderer + ?Sized>(
    renderer: &mut R,
    order: &[String],
    anchor: Option<&str>,
) -> Result<usize, RendererError> {
    let mut above = anchor;
    let mut moves = 0;

    for id in order.iter().rev() {
        if !renderer.has_layer(id) {
            continue;
        }
        if above.is_some() {
            renderer.move_layer(id, above)?;
            moves += 1;
        }
        above = Some(id.as_str());
    }

    Ok(moves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{LayerType, MemoryRenderer, PaintLayer};
    use serde_json::json;
    use std::sync::Arc;

    fn renderer_with(ids: &[&str]) -> MemoryRenderer {
        let mut renderer = MemoryRenderer::new();
        renderer
            .add_source("s", Arc::new(json!({"type": "FeatureCollection", "features": []})))
            .unwrap();
        for id in ids {
            renderer
                .add_layer(PaintLayer::new(*id, LayerType::Line, "s"), None)
                .unwrap();
        }
        renderer
    }

    fn owned(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn orders_below_anchor_from_reversed_start() {
        let mut renderer = renderer_with(&["base", "c", "b", "a", "anchor"]);
        let moves = apply_stack_order(&mut renderer, &owned(&["a", "b", "c"]), Some("anchor")).unwrap();

        assert_eq!(moves, 3);
        assert_eq!(renderer.layer_ids(), ["base", "a", "b", "c", "anchor"]);
    }

    #[test]
    fn gathers_scattered_layers_under_anchor() {
        let mut renderer = renderer_with(&["b", "base", "anchor", "a", "label"]);
        apply_stack_order(&mut renderer, &owned(&["a", "b"]), Some("anchor")).unwrap();

        assert_eq!(renderer.layer_ids(), ["base", "a", "b", "anchor", "label"]);
    }

    #[test]
    fn without_anchor_block_gathers_under_topmost() {
        let mut renderer = renderer_with(&["b", "base", "c", "a", "label"]);
        let moves = apply_stack_order(&mut renderer, &owned(&["a", "b", "c"]), None).unwrap();

        assert_eq!(moves, 2, "the topmost layer stays put");
        assert_eq!(renderer.layer_ids(), ["base", "a", "b", "c", "label"]);
    }

    #[test]
    fn without_anchor_ordered_block_is_untouched() {
        let mut renderer = renderer_with(&["a", "b", "label"]);
        apply_stack_order(&mut renderer, &owned(&["a", "b"]), None).unwrap();

        assert_eq!(renderer.layer_ids(), ["a", "b", "label"]);
    }

    #[test]
    fn missing_ids_are_skipped() {
        let mut renderer = renderer_with(&["b", "a", "anchor"]);
        let moves =
            apply_stack_order(&mut renderer, &owned(&["a", "gone", "b"]), Some("anchor")).unwrap();

        assert_eq!(moves, 2);
        assert_eq!(renderer.layer_ids(), ["a", "b", "anchor"]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::renderer::{LayerType, MemoryRenderer, PaintLayer};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    proptest! {
        /// Any starting permutation ends with the block in list order
        /// directly under the anchor.
        #[test]
        fn any_start_converges(start in Just((0..6).collect::<Vec<usize>>()).prop_shuffle()) {
            let mut renderer = MemoryRenderer::new();
            renderer
                .add_source("s", Arc::new(json!({"type": "FeatureCollection", "features": []})))
                .unwrap();
            renderer.add_layer(PaintLayer::new("anchor", LayerType::Circle, "s"), None).unwrap();
            for i in &start {
                renderer
                    .add_layer(PaintLayer::new(format!("l{i}"), LayerType::Line, "s"), Some("anchor"))
                    .unwrap();
            }

            let order: Vec<String> = (0..6).map(|i| format!("l{i}")).collect();
            apply_stack_order(&mut renderer, &order, Some("anchor")).unwrap();

            let mut expected: Vec<&str> = order.iter().map(String::as_str).collect();
            expected.push("anchor");
            prop_assert_eq!(renderer.layer_ids(), expected);
        }
    }
}
