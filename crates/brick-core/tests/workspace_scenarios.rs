//! Integration tests: connection, disposal, and undo behaviour on a live
//! workspace built from the stock block library.

use brick_core::error::{ConnectionError, IncompatibleReason};
use brick_core::events::EventKind;
use brick_core::xml::{dom_to_text, dom_to_workspace, text_to_dom, workspace_to_dom};
use brick_core::*;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn workspace() -> Workspace {
    Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
}

fn load(ws: &mut Workspace, text: &str) -> Vec<BlockId> {
    let dom = text_to_dom(text).expect("fixture parses");
    dom_to_workspace(&dom, ws).expect("fixture loads")
}

fn snapshot(ws: &Workspace) -> String {
    dom_to_text(&workspace_to_dom(ws, false).expect("workspace serializes"))
}

fn id(s: &str) -> BlockId {
    BlockId::intern(s)
}

// ─── Connecting ──────────────────────────────────────────────────────────

#[test]
fn compare_block_plugs_into_if_condition() {
    let mut ws = workspace();
    let if_block = ws.new_block("controls_if").unwrap();
    let compare = ws.new_block("logic_compare").unwrap();
    let yes = ws.new_block("logic_boolean").unwrap();
    let no = ws.new_block("logic_boolean").unwrap();
    ws.set_field_value(no, "BOOL", "FALSE").unwrap();
    ws.set_field_value(compare, "OP", "EQ").unwrap();
    ws.connect(ConnectionRef::output(yes), ConnectionRef::input(compare, "A"))
        .unwrap();
    ws.connect(ConnectionRef::output(no), ConnectionRef::input(compare, "B"))
        .unwrap();

    ws.connect(ConnectionRef::output(compare), ConnectionRef::input(if_block, "IF0"))
        .unwrap();

    let target = ws.input_target_block(if_block, "IF0").unwrap();
    assert_eq!(ws.block(target).unwrap().block_type, "logic_compare");
    assert_eq!(
        ws.target(ConnectionRef::output(compare)),
        Some(ConnectionRef::input(if_block, "IF0"))
    );
    assert_eq!(
        ws.target(ConnectionRef::input(if_block, "IF0")),
        Some(ConnectionRef::output(compare))
    );
}

#[test]
fn previous_to_previous_is_refused_and_changes_nothing() {
    let mut ws = workspace();
    let a = ws.new_block("text_print").unwrap();
    let b = ws.new_block("text_print").unwrap();
    let err = ws
        .connect(ConnectionRef::previous(a), ConnectionRef::previous(b))
        .unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::Incompatible {
            reason: IncompatibleReason::WrongType,
            ..
        }
    ));
    assert_eq!(ws.target(ConnectionRef::previous(a)), None);
    assert_eq!(ws.target(ConnectionRef::previous(b)), None);
}

#[test]
fn connect_succeeds_exactly_when_compatible() {
    let fixture = include_str!("fixtures/statements.xml");
    let mut probe = workspace();
    load(&mut probe, fixture);
    let connections = probe.all_connections();

    for &a in &connections {
        for &b in &connections {
            let mut ws = workspace();
            load(&mut ws, fixture);
            let compatible = ws.is_compatible(a, b);
            let result = ws.connect(a, b);
            assert_eq!(
                result.is_ok(),
                compatible,
                "connect({a}, {b}) disagreed with is_compatible: {result:?}"
            );
            if compatible {
                assert_eq!(ws.target(a), Some(b), "after connect({a}, {b})");
            }
        }
    }
}

#[test]
fn disconnect_twice_is_a_no_op() {
    let mut ws = workspace();
    load(&mut ws, include_str!("fixtures/statements.xml"));
    let before_undo = {
        assert!(ws.disconnect(ConnectionRef::previous(id("b"))).unwrap());
        ws.history().undo_len()
    };
    assert!(!ws.disconnect(ConnectionRef::previous(id("b"))).unwrap());
    assert_eq!(ws.history().undo_len(), before_undo);
    assert_eq!(ws.parent(id("b")), None);
}

// ─── Disposal ────────────────────────────────────────────────────────────

#[test]
fn disposing_a_stack_top_takes_the_chain() {
    let mut ws = workspace();
    let a = ws.new_block("text_print").unwrap();
    let b = ws.new_block("text_print").unwrap();
    ws.connect(ConnectionRef::next(a), ConnectionRef::previous(b))
        .unwrap();

    ws.dispose_block(a, false).unwrap();

    assert!(!ws.contains(a));
    assert!(!ws.contains(b));
    assert!(ws.is_empty());
}

#[test]
fn healing_dispose_closes_the_stack() {
    let mut ws = workspace();
    load(&mut ws, include_str!("fixtures/statements.xml"));
    ws.dispose_block(id("b"), true).unwrap();
    assert_eq!(ws.next_block(id("a")), Some(id("c")));
    assert!(!ws.contains(id("b")));
}

#[test]
fn connected_block_refuses_plain_dispose() {
    let mut ws = workspace();
    load(&mut ws, include_str!("fixtures/statements.xml"));
    assert_eq!(
        ws.dispose_block(id("b"), false),
        Err(BlockError::ConnectedBlockDelete(id("b")))
    );
    assert!(ws.contains(id("b")));
}

// ─── Undo / redo ─────────────────────────────────────────────────────────

#[test]
fn undoing_a_create_removes_exactly_its_ids() {
    let mut ws = workspace();
    let bystander = ws.new_block("math_number").unwrap();
    let created = Rc::new(RefCell::new(Vec::new()));
    let log = created.clone();
    ws.add_change_listener(Box::new(move |e| {
        if let EventKind::Create { ids, .. } = &e.kind {
            log.borrow_mut().extend(ids.iter().copied());
        }
    }));
    load(
        &mut ws,
        r#"<xml><block type="text_print" id="p"><value name="TEXT"><block type="text" id="t"/></value>
           <next><block type="text_print" id="q"/></next></block></xml>"#,
    );
    let ids = created.borrow().clone();
    assert_eq!(ids, vec![id("p"), id("t"), id("q")]);

    assert!(ws.undo(false));
    for removed in &ids {
        assert!(!ws.contains(*removed), "{removed} survived undo");
    }
    assert!(ws.contains(bystander));
    assert_eq!(ws.len(), 1);
}

#[test]
fn undoing_a_create_keeps_blocks_attached_afterwards() {
    let mut ws = workspace();
    let below = ws.new_block("text_print").unwrap();
    ws.move_to(below, Coordinate::new(10.0, 80.0)).unwrap();
    let above = ws.new_block("text_print").unwrap();
    ws.disable_events();
    ws.connect(ConnectionRef::next(above), ConnectionRef::previous(below))
        .unwrap();
    ws.enable_events();
    assert_eq!(ws.parent(below), Some(above));

    assert!(ws.undo(false));
    assert!(!ws.contains(above));
    assert!(ws.contains(below), "block outside the create event was removed");
    assert_eq!(ws.parent(below), None);
    assert!(ws.top_blocks(false).contains(&below));
}

#[test]
fn undo_all_restores_the_loaded_program_and_redo_replays_it() {
    let mut ws = workspace();
    load(&mut ws, include_str!("fixtures/program.xml"));
    ws.clear_undo();
    let original = snapshot(&ws);

    ws.set_field_value(id("five"), "NUM", "7").unwrap();
    ws.set_collapsed(id("branch"), true).unwrap();
    ws.connect(ConnectionRef::previous(id("loose")), ConnectionRef::input(id("branch"), "DO1"))
        .unwrap();
    ws.dispose_block(id("say_five"), true).unwrap();
    let edited = snapshot(&ws);
    assert_ne!(edited, original);

    while ws.undo(false) {}
    assert_eq!(snapshot(&ws), original);

    while ws.undo(true) {}
    assert_eq!(snapshot(&ws), edited);
}

#[test]
fn mutation_change_undoes_with_its_children() {
    let mut ws = workspace();
    load(&mut ws, include_str!("fixtures/program.xml"));
    ws.clear_undo();
    let original = snapshot(&ws);

    let plain = text_to_dom("<xml><mutation/></xml>").unwrap();
    let mutation = plain.child("mutation").unwrap().clone();
    ws.apply_mutation(id("branch"), &mutation).unwrap();
    // The ELSE arm vanished, so its statement was cut loose.
    assert_eq!(ws.parent(id("say_other")), None);
    assert!(ws.block(id("branch")).unwrap().input("ELSE").is_none());

    assert!(ws.undo(false));
    assert_eq!(ws.parent(id("say_other")), Some(id("branch")));
    assert_eq!(snapshot(&ws), original);
}

#[test]
fn deleting_a_variable_is_one_undo_step() {
    let mut ws = workspace();
    load(&mut ws, include_str!("fixtures/program.xml"));
    ws.clear_undo();
    let original = snapshot(&ws);

    ws.delete_variable(VariableId::intern("count_var")).unwrap();
    assert!(!ws.contains(id("init")));
    assert!(!ws.contains(id("read")));
    assert!(ws.variables().all().is_empty());

    assert!(ws.undo(false));
    assert!(!ws.can_undo());
    assert_eq!(snapshot(&ws), original);
}
