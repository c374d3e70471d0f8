//! Hit testing: workspace point → block lookup.
//!
//! Top stacks are checked last-created first, and within a stack children
//! before their parents, so the block painted on top wins.

use crate::renderer::{Renderer, painted_blocks};
use brick_core::id::BlockId;
use brick_core::workspace::Workspace;
use kurbo::{Point, Rect, Shape};

/// Find the topmost block under `(x, y)` in workspace coordinates.
pub fn hit_test(ws: &Workspace, renderer: &Renderer, x: f64, y: f64) -> Option<BlockId> {
    let point = Point::new(x, y);
    for top in ws.top_blocks(false).into_iter().rev() {
        // Reverse pre-order: every block before its ancestors.
        for id in painted_blocks(ws, top).into_iter().rev() {
            if block_contains(ws, renderer, id, point) {
                return Some(id);
            }
        }
    }
    None
}

fn block_contains(ws: &Workspace, renderer: &Renderer, id: BlockId, point: Point) -> bool {
    let (Some(rendered), Some(block)) = (renderer.rendered(id), ws.block(id)) else {
        return false;
    };
    let local = Point::new(point.x - block.xy.x, point.y - block.xy.y);
    if !rendered.drawing.outline.bounding_box().contains(local) {
        return false;
    }
    // Empty inline inputs are holes in the outline.
    rendered.drawing.outline.contains(local) && !rendered.drawing.inline.contains(local)
}

/// Every block whose outline bounds intersect `rect`. Used for marquee
/// selection.
pub fn hit_test_rect(ws: &Workspace, renderer: &Renderer, rect: Rect) -> Vec<BlockId> {
    ws.top_blocks(true)
        .into_iter()
        .flat_map(|top| painted_blocks(ws, top))
        .filter(|id| {
            renderer
                .block_bounds(ws, *id)
                .is_some_and(|bounds| rect.intersect(bounds).area() > 0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use brick_core::connection::ConnectionRef;
    use brick_core::coordinate::Coordinate;
    use brick_core::options::WorkspaceOptions;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn rendered(setup: impl FnOnce(&mut Workspace)) -> (Workspace, Renderer) {
        let mut ws = Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default());
        setup(&mut ws);
        let mut renderer = Renderer::default();
        renderer.render_all(&mut ws).unwrap();
        (ws, renderer)
    }

    #[test]
    fn hit_background() {
        let (ws, renderer) = rendered(|ws| {
            let n = ws.new_block("math_number").unwrap();
            ws.move_to(n, Coordinate::new(100.0, 100.0)).unwrap();
        });
        assert_eq!(hit_test(&ws, &renderer, 10.0, 10.0), None);
    }

    #[test]
    fn child_wins_over_parent() {
        let mut ids = None;
        let (ws, renderer) = rendered(|ws| {
            let print = ws.new_block("text_print").unwrap();
            let text = ws.new_block("text").unwrap();
            ws.connect(ConnectionRef::output(text), ConnectionRef::input(print, "TEXT"))
                .unwrap();
            ids = Some((print, text));
        });
        let (print, text) = ids.unwrap();
        let text_xy = ws.block(text).unwrap().xy;
        let print_xy = ws.block(print).unwrap().xy;

        // Middle of the child's body.
        let hit = hit_test(&ws, &renderer, text_xy.x + 20.0, text_xy.y + 12.0);
        assert_eq!(hit, Some(text));
        // Left part of the parent, away from the child.
        let hit = hit_test(&ws, &renderer, print_xy.x + 4.0, print_xy.y + 12.0);
        assert_eq!(hit, Some(print));
    }

    #[test]
    fn later_stacks_are_on_top() {
        let mut ids = None;
        let (ws, renderer) = rendered(|ws| {
            let below = ws.new_block("math_number").unwrap();
            let above = ws.new_block("math_number").unwrap();
            ids = Some((below, above));
        });
        let (_, above) = ids.unwrap();
        assert_eq!(hit_test(&ws, &renderer, 20.0, 12.0), Some(above));
    }

    #[test]
    fn empty_inline_input_is_a_hole() {
        let mut ids = None;
        let (ws, renderer) = rendered(|ws| {
            let compare = ws.new_block("logic_compare").unwrap();
            ids = Some(compare);
        });
        let compare = ids.unwrap();
        let info = &renderer.rendered(compare).unwrap().info;
        let (_, input) = info.elements().find(|(_, e)| e.is_inline_input()).unwrap();
        let inside = (input.x + input.width - 4.0, input.centerline);
        assert_eq!(hit_test(&ws, &renderer, inside.0, inside.1), None);
        // The body beside the hole still hits.
        assert_eq!(hit_test(&ws, &renderer, input.x - 2.0, input.centerline), Some(compare));
    }

    #[test]
    fn marquee_selects_intersecting_blocks() {
        let mut ids = None;
        let (ws, renderer) = rendered(|ws| {
            let a = ws.new_block("math_number").unwrap();
            let b = ws.new_block("math_number").unwrap();
            ws.move_to(b, Coordinate::new(500.0, 500.0)).unwrap();
            ids = Some((a, b));
        });
        let (a, _) = ids.unwrap();
        let picked = hit_test_rect(&ws, &renderer, Rect::new(-10.0, -10.0, 50.0, 50.0));
        assert_eq!(picked, vec![a]);
    }
}
