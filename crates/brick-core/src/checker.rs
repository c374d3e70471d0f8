//! Connection compatibility.
//!
//! Two layers: the structural safety check that `connect` enforces, and the
//! extra drag-time rules that decide which nearby connections a dragged
//! block may snap to.

use crate::connection::{ConnectionKind, ConnectionRef};
use crate::coordinate::Coordinate;
use crate::error::IncompatibleReason;
use crate::id::BlockId;
use crate::workspace::Workspace;
use std::collections::HashSet;

/// Safety and type checks, in order: both ends exist, different blocks,
/// opposite kinds, no real block under a shadow, no cycle, checks
/// intersect.
pub fn can_connect_with_reason(
    ws: &Workspace,
    a: ConnectionRef,
    b: ConnectionRef,
) -> Result<(), IncompatibleReason> {
    let (Some(ca), Some(cb)) = (ws.connection(a), ws.connection(b)) else {
        return Err(IncompatibleReason::TargetNull);
    };
    if a.block == b.block {
        return Err(IncompatibleReason::SelfConnection);
    }
    if ca.kind.opposite() != cb.kind {
        return Err(IncompatibleReason::WrongType);
    }
    let (parent, child) = if ca.kind.is_superior() { (a, b) } else { (b, a) };
    let parent_shadow = ws.block(parent.block).is_some_and(|p| p.is_shadow);
    let child_shadow = ws.block(child.block).is_some_and(|c| c.is_shadow);
    if parent_shadow && !child_shadow {
        return Err(IncompatibleReason::ShadowParent);
    }
    if is_ancestor(ws, child.block, parent.block) {
        return Err(IncompatibleReason::Circular);
    }
    if !ca.checks_intersect(cb) {
        return Err(IncompatibleReason::ChecksFailed);
    }
    Ok(())
}

pub fn is_compatible(ws: &Workspace, a: ConnectionRef, b: ConnectionRef) -> bool {
    can_connect_with_reason(ws, a, b).is_ok()
}

/// True if `ancestor` is `block` or sits above it.
fn is_ancestor(ws: &Workspace, ancestor: BlockId, block: BlockId) -> bool {
    let mut current = Some(block);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = ws.parent(id);
    }
    false
}

/// Drag-time rules for snapping `moving` (on the dragged block) to
/// `candidate`, whose position must be within `radius` of `moving_at`.
/// `dragged` holds every block being dragged.
pub fn drag_allowed(
    ws: &Workspace,
    moving: ConnectionRef,
    moving_at: Coordinate,
    candidate: ConnectionRef,
    radius: f64,
    dragged: &HashSet<BlockId>,
) -> bool {
    let Some(candidate_at) = ws.connection_position(candidate) else {
        return false;
    };
    if moving_at.distance(candidate_at) > radius {
        return false;
    }
    if dragged.contains(&candidate.block) {
        return false;
    }
    if !is_compatible(ws, moving, candidate) {
        return false;
    }
    let Some(kind) = ws.connection(candidate).map(|c| c.kind) else {
        return false;
    };
    let candidate_target = ws.target_block(candidate).and_then(|t| ws.block(t));
    match kind {
        // Only an empty previous connection (a free-standing stack top)
        // can take a dragged block's next connection.
        ConnectionKind::PreviousStatement => {
            !ws.is_connected(moving) && candidate_target.is_none()
        }
        ConnectionKind::OutputValue => {
            !ws.is_connected(moving) && candidate_target.is_none()
        }
        ConnectionKind::InputValue => {
            candidate_target.is_none_or(|t| t.is_movable() || t.is_shadow)
        }
        ConnectionKind::NextStatement => {
            let moving_has_next = ws.block(moving.block).is_some_and(|b| b.next.is_some());
            // Don't let a block with no next connection bump other blocks out.
            !candidate_target
                .is_some_and(|t| !moving_has_next && !t.is_shadow && t.next.is_some())
        }
    }
}

/// The nearest connection `moving` may snap to from `moving_at`, scanning
/// every connection in arena order. Ties keep the first found.
pub fn closest_compatible(
    ws: &Workspace,
    moving: ConnectionRef,
    moving_at: Coordinate,
    radius: f64,
    dragged: &HashSet<BlockId>,
) -> Option<(ConnectionRef, f64)> {
    let kind = ws.connection(moving)?.kind.opposite();
    let mut best: Option<(ConnectionRef, f64)> = None;
    for candidate in ws.all_connections() {
        if ws.connection(candidate).map(|c| c.kind) != Some(kind) {
            continue;
        }
        if !drag_allowed(ws, moving, moving_at, candidate, radius, dragged) {
            continue;
        }
        let Some(at) = ws.connection_position(candidate) else {
            continue;
        };
        let distance = moving_at.distance(at);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::stock_registry;
    use crate::options::WorkspaceOptions;
    use std::rc::Rc;

    fn workspace() -> Workspace {
        Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    #[test]
    fn reasons_come_in_order() {
        let mut ws = workspace();
        let a = ws.new_block("controls_if").unwrap();
        let n = ws.new_block("math_number").unwrap();
        let t = ws.new_block("text").unwrap();
        let ghost = ConnectionRef::output(BlockId::intern("ghost"));
        assert_eq!(
            can_connect_with_reason(&ws, ghost, ConnectionRef::input(a, "IF0")),
            Err(IncompatibleReason::TargetNull)
        );
        assert_eq!(
            can_connect_with_reason(&ws, ConnectionRef::previous(a), ConnectionRef::next(a)),
            Err(IncompatibleReason::SelfConnection)
        );
        assert_eq!(
            can_connect_with_reason(&ws, ConnectionRef::output(n), ConnectionRef::next(a)),
            Err(IncompatibleReason::WrongType)
        );
        // IF0 only accepts Boolean.
        assert_eq!(
            can_connect_with_reason(&ws, ConnectionRef::output(t), ConnectionRef::input(a, "IF0")),
            Err(IncompatibleReason::ChecksFailed)
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let mut ws = workspace();
        let outer = ws.new_block("controls_if").unwrap();
        let inner = ws.new_block("controls_if").unwrap();
        ws.connect(ConnectionRef::previous(inner), ConnectionRef::input(outer, "DO0"))
            .unwrap();
        assert_eq!(
            can_connect_with_reason(&ws, ConnectionRef::previous(outer), ConnectionRef::next(inner)),
            Err(IncompatibleReason::Circular)
        );
    }

    #[test]
    fn closest_picks_nearest_in_radius() {
        let mut ws = workspace();
        let near = ws.new_block("logic_negate").unwrap();
        let far = ws.new_block("logic_negate").unwrap();
        let moving = ws.new_block("logic_boolean").unwrap();
        ws.move_to(near, Coordinate::new(0.0, 0.0)).unwrap();
        ws.move_to(far, Coordinate::new(0.0, 15.0)).unwrap();
        ws.set_connection_offset(ConnectionRef::input(near, "BOOL"), Coordinate::new(40.0, 0.0));
        ws.set_connection_offset(ConnectionRef::input(far, "BOOL"), Coordinate::new(40.0, 0.0));
        let dragged = HashSet::from([moving]);
        let (found, d) = closest_compatible(
            &ws,
            ConnectionRef::output(moving),
            Coordinate::new(40.0, 5.0),
            28.0,
            &dragged,
        )
        .unwrap();
        assert_eq!(found, ConnectionRef::input(near, "BOOL"));
        assert_eq!(d, 5.0);
        assert!(
            closest_compatible(
                &ws,
                ConnectionRef::output(moving),
                Coordinate::new(400.0, 5.0),
                28.0,
                &dragged,
            )
            .is_none()
        );
    }
}
