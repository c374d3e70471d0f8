//! Integration tests: render whole programs and check the layout holds
//! together: closed outlines, snapped connections, stable re-renders.

use brick_core::xml::{dom_to_workspace, text_to_dom};
use brick_core::*;
use brick_render::drawer::is_closed;
use brick_render::*;
use pretty_assertions::assert_eq;
use std::rc::Rc;

const PROGRAM: &str = include_str!("fixtures/program.xml");
const SHAPES: &str = include_str!("fixtures/shapes.xml");

// ─── Helpers ─────────────────────────────────────────────────────────────

fn load(text: &str) -> Workspace {
    let mut ws = Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default());
    let dom = text_to_dom(text).expect("fixture parses");
    dom_to_workspace(&dom, &mut ws).expect("fixture loads");
    ws
}

fn render(ws: &mut Workspace) -> Renderer {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut renderer = Renderer::default();
    renderer.render_all(ws).expect("workspace renders");
    renderer
}

fn id(s: &str) -> BlockId {
    BlockId::intern(s)
}

fn assert_all_snapped(ws: &Workspace) {
    for block in ws.all_blocks(false) {
        let Some((parent, link)) = ws.parent_link(block) else {
            continue;
        };
        let anchor = ws
            .connection_position(ConnectionRef::new(parent, link.parent_slot))
            .unwrap();
        let plug = ws
            .connection_position(ConnectionRef::new(block, link.child_slot))
            .unwrap();
        assert!(
            anchor.distance(plug) < 1e-9,
            "{block} hangs at {plug:?} but {parent}.{} is at {anchor:?}",
            link.parent_slot
        );
    }
}

// ─── Layout ──────────────────────────────────────────────────────────────

#[test]
fn every_block_gets_a_closed_outline() {
    for fixture in [PROGRAM, SHAPES] {
        let mut ws = load(fixture);
        let renderer = render(&mut ws);
        assert_eq!(renderer.len(), ws.len());
        for block in ws.all_blocks(false) {
            let rendered = renderer.rendered(block).unwrap();
            assert!(is_closed(&rendered.drawing.outline), "{block} outline is open");
        }
    }
}

#[test]
fn children_hang_from_their_connections() {
    let mut ws = load(PROGRAM);
    render(&mut ws);
    assert_all_snapped(&ws);

    let mut ws = load(SHAPES);
    render(&mut ws);
    assert_all_snapped(&ws);
}

#[test]
fn top_blocks_keep_their_saved_positions() {
    let mut ws = load(PROGRAM);
    render(&mut ws);
    assert_eq!(ws.block(id("init")).unwrap().xy, Coordinate::new(20.0, 20.0));
    assert_eq!(ws.block(id("loose")).unwrap().xy, Coordinate::new(300.0, 10.0));
}

#[test]
fn rendering_twice_changes_nothing() {
    let mut ws = load(SHAPES);
    let mut renderer = render(&mut ws);
    let before: Vec<_> = ws
        .all_blocks(false)
        .into_iter()
        .map(|b| (ws.block(b).unwrap().xy, renderer.rendered(b).unwrap().clone()))
        .collect();
    renderer.render_all(&mut ws).unwrap();
    let after: Vec<_> = ws
        .all_blocks(false)
        .into_iter()
        .map(|b| (ws.block(b).unwrap().xy, renderer.rendered(b).unwrap().clone()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn wider_value_child_widens_the_parent_stack() {
    let mut ws = load(SHAPES);
    let mut renderer = render(&mut ws);
    let before = renderer.rendered(id("wide")).unwrap().stack_size.width;

    ws.set_field_value(id("label"), "TEXT", "a much longer string that pushes everything out")
        .unwrap();
    renderer.render_block(&mut ws, id("label")).unwrap();

    let after = renderer.rendered(id("wide")).unwrap().stack_size.width;
    assert!(after > before, "{after} should exceed {before}");
    assert_all_snapped(&ws);
}

#[test]
fn collapsing_shrinks_the_block() {
    let mut ws = load(SHAPES);
    let mut renderer = render(&mut ws);
    let open = renderer.rendered(id("wide")).unwrap().info.height;

    ws.set_collapsed(id("wide"), true).unwrap();
    renderer.render_block(&mut ws, id("wide")).unwrap();

    let rendered = renderer.rendered(id("wide")).unwrap();
    assert!(rendered.info.height < open);
    assert!(rendered.info.is_collapsed);
    assert!(is_closed(&rendered.drawing.outline));
}

#[test]
fn inherited_disable_reaches_children() {
    let mut ws = load(PROGRAM);
    ws.set_enabled(id("loop"), false).unwrap();
    let renderer = render(&mut ws);
    assert!(renderer.rendered(id("loop")).unwrap().disabled);
    assert!(renderer.rendered(id("say_five")).unwrap().disabled);
    assert!(!renderer.rendered(id("init")).unwrap().disabled);
}

// ─── Export and picking ──────────────────────────────────────────────────

#[test]
fn svg_export_has_one_path_per_block() {
    let mut ws = load(PROGRAM);
    let renderer = render(&mut ws);
    let svg = render_svg(&ws, &renderer);
    // `other_text` is hidden inside the collapsed `say_other`.
    assert_eq!(svg.matches("<path").count(), ws.len() - 1);
    assert!(!svg.contains("data-id=\"other_text\""));
    assert!(svg.contains("opacity=\"0.5\""), "the loose block is disabled");
}

#[test]
fn escaped_text_survives_export() {
    let mut ws = load(SHAPES);
    let renderer = render(&mut ws);
    let svg = render_svg(&ws, &renderer);
    assert!(svg.contains("a &lt;tag&gt; &amp; more"));
}

#[test]
fn picking_finds_the_innermost_block() {
    let mut ws = load(SHAPES);
    let renderer = render(&mut ws);
    let shadow = ws.block(id("one")).unwrap().xy;
    let hit = hit_test(&ws, &renderer, shadow.x + 12.0, shadow.y + 10.0);
    assert_eq!(hit, Some(id("one")));
}
