//! Dragging a block stack around the workspace.
//!
//! On start the block is unplugged from its parent with events disabled;
//! while dragging it is only translated. Every move re-runs the connection
//! search and keeps the best candidate as the preview.
//!
//! The preview never reaches the event stream. On drop the tree is put
//! back silently and the drag is replayed as real edits (unplug, move,
//! connect) in one event group, so undo sees exactly what the user did.
//! On cancel the silent restore is all that happens.

use crate::error::EditorError;
use brick_core::checker;
use brick_core::connection::ConnectionRef;
use brick_core::coordinate::Coordinate;
use brick_core::id::BlockId;
use brick_core::workspace::Workspace;
use std::collections::HashSet;

/// A connection the dragged stack would snap to if dropped now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// On the dragged stack.
    pub moving: ConnectionRef,
    /// On a stationary block.
    pub target: ConnectionRef,
    pub distance: f64,
}

/// How a drag finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropOutcome {
    Connected(Candidate),
    /// Left where it was dropped.
    Placed(Coordinate),
}

#[derive(Debug, Clone)]
pub struct BlockDragger {
    block: BlockId,
    start_xy: Coordinate,
    /// Parent-side and block-side connections the block left.
    start_link: Option<(ConnectionRef, ConnectionRef)>,
    heal: bool,
    dragged: HashSet<BlockId>,
    /// Connections on the dragged stack that may snap.
    available: Vec<ConnectionRef>,
    candidate: Option<Candidate>,
}

impl BlockDragger {
    /// Begin dragging `block`. With `heal`, a statement block leaves its
    /// successor behind in its place.
    pub fn start(ws: &mut Workspace, block: BlockId, heal: bool) -> Result<Self, EditorError> {
        let b = ws.require(block)?;
        if !b.is_movable() {
            return Err(EditorError::NotMovable(block));
        }
        let start_xy = b.xy;
        let start_link = ws.parent_link(block).map(|(parent, link)| {
            (
                ConnectionRef::new(parent, link.parent_slot),
                ConnectionRef::new(block, link.child_slot),
            )
        });

        ws.disable_events();
        let unplugged = ws.unplug(block, heal);
        ws.enable_events();
        unplugged?;

        let dragged: HashSet<BlockId> = ws.descendant_ids(block).into_iter().collect();
        let available = available_connections(ws, block);
        log::debug!(
            "drag {block} from {start_xy:?}, {} snap candidates on the stack",
            available.len()
        );
        Ok(Self {
            block,
            start_xy,
            start_link,
            heal,
            dragged,
            available,
            candidate: None,
        })
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn candidate(&self) -> Option<Candidate> {
        self.candidate
    }

    pub fn dragged(&self) -> &HashSet<BlockId> {
        &self.dragged
    }

    /// Move the stack to `start + delta` and refresh the snap preview.
    pub fn drag(&mut self, ws: &mut Workspace, delta: Coordinate) {
        let target = self.start_xy + delta;
        let current = ws.block(self.block).map_or(target, |b| b.xy);
        ws.translate_subtree(self.block, target - current);
        self.candidate = self.find_candidate(ws);
    }

    /// Search every available connection; keep the current candidate
    /// unless another beats it by the preference margin.
    fn find_candidate(&self, ws: &Workspace) -> Option<Candidate> {
        let options = ws.options();
        let radius = if self.candidate.is_some() {
            options.connecting_snap_radius
        } else {
            options.snap_radius
        };

        let mut best: Option<Candidate> = None;
        for &moving in &self.available {
            let Some(moving_at) = ws.connection_position(moving) else {
                continue;
            };
            let limit = best.map_or(radius, |b| b.distance);
            if let Some((target, distance)) =
                checker::closest_compatible(ws, moving, moving_at, limit, &self.dragged)
                && best.is_none_or(|b| distance < b.distance)
            {
                best = Some(Candidate {
                    moving,
                    target,
                    distance,
                });
            }
        }

        let current = self.candidate.and_then(|c| self.revalidate(ws, c, radius));
        match (current, best) {
            (Some(current), Some(best))
                if current.target != best.target
                    && best.distance + options.current_connection_preference > current.distance =>
            {
                Some(current)
            }
            (current, None) => current,
            (_, best) => best,
        }
    }

    fn revalidate(&self, ws: &Workspace, candidate: Candidate, radius: f64) -> Option<Candidate> {
        let moving_at = ws.connection_position(candidate.moving)?;
        checker::drag_allowed(
            ws,
            candidate.moving,
            moving_at,
            candidate.target,
            radius,
            &self.dragged,
        )
        .then(|| {
            let target_at = ws.connection_position(candidate.target)?;
            Some(Candidate {
                distance: moving_at.distance(target_at),
                ..candidate
            })
        })
        .flatten()
    }

    /// Commit the drag. Connection failures are logged and the block stays
    /// where it was dropped.
    pub fn drop(self, ws: &mut Workspace) -> Result<DropOutcome, EditorError> {
        let opened = ws.begin_group();
        let result = self.commit(ws);
        ws.end_group(opened);
        result
    }

    fn commit(self, ws: &mut Workspace) -> Result<DropOutcome, EditorError> {
        let dropped_at = ws.require(self.block)?.xy;
        ws.disable_events();
        let restored = self.restore(ws);
        ws.enable_events();
        restored?;

        if self.start_link.is_some() {
            ws.unplug(self.block, self.heal)?;
        }
        ws.move_to(self.block, dropped_at)?;
        if let Some(candidate) = self.candidate {
            match ws.connect(candidate.moving, candidate.target) {
                Ok(()) => {
                    log::debug!("dropped {} onto {}", candidate.moving, candidate.target);
                    return Ok(DropOutcome::Connected(candidate));
                }
                Err(err) => log::debug!("drop did not connect: {err}"),
            }
        }
        let xy = ws.require(self.block)?.xy;
        Ok(DropOutcome::Placed(xy))
    }

    /// Put everything back without firing events.
    pub fn cancel(self, ws: &mut Workspace) -> Result<(), EditorError> {
        ws.disable_events();
        let result = self.restore(ws);
        ws.enable_events();
        log::debug!("drag of {} cancelled", self.block);
        result
    }

    fn restore(&self, ws: &mut Workspace) -> Result<(), EditorError> {
        match self.start_link {
            // Reconnecting reattaches a healed successor below the stack.
            Some((parent, plug)) => ws.connect(plug, parent)?,
            None => {
                let current = ws.require(self.block)?.xy;
                ws.translate_subtree(self.block, self.start_xy - current);
            }
        }
        Ok(())
    }
}

/// The dragged block's own connections, plus the last next connection of
/// its stack when that differs.
fn available_connections(ws: &Workspace, block: BlockId) -> Vec<ConnectionRef> {
    let mut out: Vec<ConnectionRef> = ws
        .block(block)
        .map(|b| {
            b.slots()
                .into_iter()
                .map(|slot| ConnectionRef::new(block, slot))
                .collect()
        })
        .unwrap_or_default();
    if let Some(last) = ws.last_connection_in_stack(block, false)
        && !out.contains(&last)
    {
        out.push(last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use brick_core::options::WorkspaceOptions;
    use brick_render::Renderer;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn workspace() -> Workspace {
        Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    fn render(ws: &mut Workspace) {
        Renderer::default().render_all(ws).unwrap();
    }

    /// Delta that puts `moving` exactly on `target`.
    fn delta_onto(ws: &Workspace, moving: ConnectionRef, target: ConnectionRef) -> Coordinate {
        ws.connection_position(target).unwrap() - ws.connection_position(moving).unwrap()
    }

    #[test]
    fn drop_near_a_connection_snaps() {
        let mut ws = workspace();
        let first = ws.new_block("text_print").unwrap();
        let second = ws.new_block("text_print").unwrap();
        ws.move_to(second, Coordinate::new(200.0, 200.0)).unwrap();
        render(&mut ws);

        let target = ConnectionRef::next(first);
        let moving = ConnectionRef::previous(second);
        let delta = delta_onto(&ws, moving, target) + Coordinate::new(6.0, 4.0);

        let mut dragger = BlockDragger::start(&mut ws, second, false).unwrap();
        dragger.drag(&mut ws, delta);
        let candidate = dragger.candidate().unwrap();
        assert_eq!((candidate.moving, candidate.target), (moving, target));

        let outcome = dragger.drop(&mut ws).unwrap();
        assert!(matches!(outcome, DropOutcome::Connected(_)));
        assert_eq!(ws.next_block(first), Some(second));
    }

    #[test]
    fn drop_in_open_space_just_moves() {
        let mut ws = workspace();
        let block = ws.new_block("math_number").unwrap();
        render(&mut ws);
        ws.clear_undo();

        let mut dragger = BlockDragger::start(&mut ws, block, false).unwrap();
        dragger.drag(&mut ws, Coordinate::new(100.0, 50.0));
        assert_eq!(dragger.candidate(), None);
        let outcome = dragger.drop(&mut ws).unwrap();
        assert_eq!(outcome, DropOutcome::Placed(Coordinate::new(100.0, 50.0)));

        assert!(ws.undo(false));
        assert_eq!(ws.block(block).unwrap().xy, Coordinate::ZERO);
    }

    #[test]
    fn dragged_stack_never_snaps_to_itself() {
        let mut ws = workspace();
        let top = ws.new_block("text_print").unwrap();
        let below = ws.new_block("text_print").unwrap();
        ws.connect(ConnectionRef::previous(below), ConnectionRef::next(top))
            .unwrap();
        render(&mut ws);

        let mut dragger = BlockDragger::start(&mut ws, top, false).unwrap();
        assert!(dragger.dragged().contains(&below));
        dragger.drag(&mut ws, Coordinate::new(3.0, 3.0));
        assert_eq!(dragger.candidate(), None);
    }

    #[test]
    fn cancel_restores_without_events() {
        let mut ws = workspace();
        let parent = ws.new_block("text_print").unwrap();
        let child = ws.new_block("text_print").unwrap();
        ws.connect(ConnectionRef::previous(child), ConnectionRef::next(parent))
            .unwrap();
        render(&mut ws);
        let home = ws.block(child).unwrap().xy;
        ws.clear_undo();

        let mut dragger = BlockDragger::start(&mut ws, child, false).unwrap();
        assert_eq!(ws.parent(child), None);
        dragger.drag(&mut ws, Coordinate::new(120.0, 80.0));
        dragger.cancel(&mut ws).unwrap();

        assert_eq!(ws.parent(child), Some(parent));
        assert!(ws.block(child).unwrap().xy.distance(home) < 1e-9);
        assert!(!ws.can_undo());
    }

    #[test]
    fn healing_drag_leaves_the_successor_behind() {
        let mut ws = workspace();
        let a = ws.new_block("text_print").unwrap();
        let b = ws.new_block("text_print").unwrap();
        let c = ws.new_block("text_print").unwrap();
        ws.connect(ConnectionRef::previous(b), ConnectionRef::next(a)).unwrap();
        ws.connect(ConnectionRef::previous(c), ConnectionRef::next(b)).unwrap();
        render(&mut ws);
        ws.clear_undo();

        let mut dragger = BlockDragger::start(&mut ws, b, true).unwrap();
        assert_eq!(ws.next_block(a), Some(c));
        dragger.drag(&mut ws, Coordinate::new(300.0, 0.0));
        dragger.drop(&mut ws).unwrap();
        assert_eq!(ws.parent(b), None);

        // One undo step puts the whole chain back.
        assert!(ws.undo(false));
        assert_eq!(ws.next_block(a), Some(b));
        assert_eq!(ws.next_block(b), Some(c));
    }

    #[test]
    fn cancel_after_healing_restores_the_chain() {
        let mut ws = workspace();
        let a = ws.new_block("text_print").unwrap();
        let b = ws.new_block("text_print").unwrap();
        let c = ws.new_block("text_print").unwrap();
        ws.connect(ConnectionRef::previous(b), ConnectionRef::next(a)).unwrap();
        ws.connect(ConnectionRef::previous(c), ConnectionRef::next(b)).unwrap();
        render(&mut ws);

        let dragger = BlockDragger::start(&mut ws, b, true).unwrap();
        dragger.cancel(&mut ws).unwrap();
        assert_eq!(ws.next_block(a), Some(b));
        assert_eq!(ws.next_block(b), Some(c));
    }

    #[test]
    fn current_candidate_is_sticky() {
        let mut ws = workspace();
        let near = ws.new_block("logic_negate").unwrap();
        let far = ws.new_block("logic_negate").unwrap();
        let moving = ws.new_block("logic_boolean").unwrap();
        ws.move_to(far, Coordinate::new(0.0, 20.0)).unwrap();
        ws.move_to(moving, Coordinate::new(300.0, 300.0)).unwrap();
        render(&mut ws);

        let output = ConnectionRef::output(moving);
        let near_in = ConnectionRef::input(near, "BOOL");
        let far_in = ConnectionRef::input(far, "BOOL");
        let mut dragger = BlockDragger::start(&mut ws, moving, false).unwrap();
        let onto_near = delta_onto(&ws, output, near_in);
        dragger.drag(&mut ws, onto_near);
        assert_eq!(dragger.candidate().unwrap().target, near_in);

        // Slightly closer to the other input, but not by the preference margin.
        let near_at = ws.connection_position(near_in).unwrap();
        let far_at = ws.connection_position(far_in).unwrap();
        let midpoint = Coordinate::new(near_at.x, (near_at.y + far_at.y) / 2.0 + 2.0);
        let to_mid = midpoint - ws.connection_position(output).unwrap();
        let total = ws.block(moving).unwrap().xy + to_mid - Coordinate::new(300.0, 300.0);
        dragger.drag(&mut ws, total);
        assert_eq!(dragger.candidate().unwrap().target, near_in);
    }
}
