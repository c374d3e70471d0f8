//! Connecting, disconnecting, and unplugging blocks.
//!
//! All three keep the graph, block positions, shadows, and the event
//! stream consistent. Each opens an event group when none is active so a
//! single user action (which may displace, reattach, or bump other blocks)
//! undoes as one step.

use crate::checker;
use crate::connection::{ConnectionKind, ConnectionRef, ConnectionSlot};
use crate::error::{BlockError, ConnectionError, IncompatibleReason};
use crate::id::BlockId;
use crate::workspace::{Link, Workspace};
use crate::xml;

impl Workspace {
    pub fn can_connect_with_reason(
        &self,
        a: ConnectionRef,
        b: ConnectionRef,
    ) -> Result<(), IncompatibleReason> {
        checker::can_connect_with_reason(self, a, b)
    }

    /// Same predicate `connect` enforces.
    pub fn is_compatible(&self, a: ConnectionRef, b: ConnectionRef) -> bool {
        checker::is_compatible(self, a, b)
    }

    /// Join two connections. Whichever is superior (input or next) becomes
    /// the parent side.
    ///
    /// If the parent slot is occupied, a shadow occupant is deleted; a real
    /// occupant is reattached below the new child where it fits, and bumped
    /// aside otherwise.
    pub fn connect(&mut self, a: ConnectionRef, b: ConnectionRef) -> Result<(), ConnectionError> {
        if let Err(reason) = checker::can_connect_with_reason(self, a, b) {
            return Err(ConnectionError::Incompatible {
                a,
                a_kind: self.connection(a).map(|c| c.kind),
                b,
                b_kind: self.connection(b).map(|c| c.kind),
                reason,
            });
        }
        let a_superior = self.connection(a).is_some_and(|c| c.kind.is_superior());
        let (parent, child) = if a_superior { (a, b) } else { (b, a) };
        if self.target(parent) == Some(child) {
            return Ok(());
        }
        let opened = self.history.begin_group();
        let result = self.connect_inner(parent, child);
        self.history.end_group(opened);
        result
    }

    fn connect_inner(&mut self, parent: ConnectionRef, child: ConnectionRef) -> Result<(), ConnectionError> {
        if let Some((old_parent, link)) = self.parent_link(child.block) {
            self.detach(
                ConnectionRef::new(old_parent, link.parent_slot),
                child,
                true,
            );
        }

        let mut orphan = None;
        if let Some((occupant, link)) = self.child_at(parent) {
            if self.block(occupant).is_some_and(|b| b.is_shadow) {
                // Keep the shadow's current state as the template.
                if let Ok(state) = xml::block_to_dom(self, occupant, false)
                    && let Some(conn) = self.connection_mut(parent)
                {
                    conn.shadow = Some(state);
                }
                self.force_dispose(occupant);
            } else {
                self.detach(parent, ConnectionRef::new(occupant, link.child_slot), false);
                orphan = Some(ConnectionRef::new(occupant, link.child_slot));
            }
        }

        self.link(parent, child);

        if let Some(orphan) = orphan {
            self.reattach_orphan(parent, child.block, orphan)?;
        }
        Ok(())
    }

    /// Add the edge, align the child under the parent connection, and fire
    /// the child's move.
    fn link(&mut self, parent: ConnectionRef, child: ConnectionRef) {
        let old = self.location(child.block);
        if let (Some(p), Some(c)) = (
            self.connection_position(parent),
            self.connection_position(child),
        ) {
            self.translate_subtree(child.block, p - c);
        }
        self.add_link(
            parent.block,
            child.block,
            Link {
                parent_slot: parent.slot,
                child_slot: child.slot,
            },
        );
        log::trace!("connected {child} to {parent}");
        self.fire_move(child.block, old);
    }

    /// Remove the edge between `parent` and `child`, fire the child's move,
    /// and optionally respawn the parent's shadow.
    fn detach(&mut self, parent: ConnectionRef, child: ConnectionRef, respawn: bool) {
        let old = self.location(child.block);
        self.remove_link(child.block);
        log::trace!("disconnected {child} from {parent}");
        self.fire_move(child.block, old);
        let child_is_shadow = self.block(child.block).is_some_and(|b| b.is_shadow);
        if respawn && !child_is_shadow {
            self.respawn_shadow(parent);
        }
    }

    /// Recreate a shadow from the connection's template, if it has one and
    /// nothing is attached.
    pub(crate) fn respawn_shadow(&mut self, parent: ConnectionRef) {
        if self.is_connected(parent) {
            return;
        }
        let Some(template) = self.connection(parent).and_then(|c| c.shadow.clone()) else {
            return;
        };
        let shadow = match xml::dom_to_block(&template, self) {
            Ok(id) => id,
            Err(err) => {
                log::warn!("failed to respawn shadow on {parent}: {err}");
                return;
            }
        };
        let slot = self.block(shadow).and_then(|b| b.parent_facing_slot());
        let attached = slot.is_some_and(|slot| {
            let child = ConnectionRef::new(shadow, slot);
            checker::is_compatible(self, parent, child) && self.connect_inner(parent, child).is_ok()
        });
        if !attached {
            log::warn!("shadow template on {parent} does not fit; discarding");
            self.force_dispose(shadow);
        }
    }

    /// Find a home for a block displaced from `parent` by `new_child`.
    fn reattach_orphan(
        &mut self,
        parent: ConnectionRef,
        new_child: BlockId,
        orphan: ConnectionRef,
    ) -> Result<(), ConnectionError> {
        let spot = match self.connection(orphan).map(|c| c.kind) {
            Some(ConnectionKind::OutputValue) => self.orphan_output_spot(new_child, orphan),
            Some(ConnectionKind::PreviousStatement) => self
                .last_connection_in_stack(new_child, true)
                .filter(|spot| checker::is_compatible(self, orphan, *spot)),
            _ => None,
        };
        match spot {
            Some(spot) => {
                log::debug!("reattaching orphan {} at {spot}", orphan.block);
                self.connect_inner(spot, orphan)
            }
            None => {
                self.bump_away(orphan, parent);
                Ok(())
            }
        }
    }

    /// Follow single compatible value inputs down from `start` until one
    /// is empty or holds only a shadow.
    fn orphan_output_spot(&self, start: BlockId, orphan: ConnectionRef) -> Option<ConnectionRef> {
        let mut block = start;
        loop {
            let spot = self.single_compatible_input(block, orphan)?;
            match self.target_block(spot) {
                None => return Some(spot),
                Some(t) if self.block(t).is_some_and(|b| b.is_shadow) => return Some(spot),
                Some(t) => block = t,
            }
        }
    }

    fn single_compatible_input(&self, block: BlockId, orphan: ConnectionRef) -> Option<ConnectionRef> {
        let mut found = None;
        for slot in self.block(block)?.slots() {
            let candidate = ConnectionRef::new(block, slot);
            let is_value_input = self
                .connection(candidate)
                .is_some_and(|c| c.kind == ConnectionKind::InputValue);
            if is_value_input && checker::is_compatible(self, orphan, candidate) {
                if found.is_some() {
                    return None;
                }
                found = Some(candidate);
            }
        }
        found
    }

    /// Move a disconnected block's stack away from the connection it
    /// failed to rejoin. If the orphan's root can't move, the other stack
    /// moves the opposite way instead.
    pub(crate) fn bump_away(&mut self, moving: ConnectionRef, fixed: ConnectionRef) {
        let (Some(from), Some(anchor)) = (
            self.connection_position(moving),
            self.connection_position(fixed),
        ) else {
            return;
        };
        let mut root = self.root_block(moving.block);
        let mut reverse = false;
        if !self.block(root).is_some_and(|b| b.is_movable()) {
            root = self.root_block(fixed.block);
            if !self.block(root).is_some_and(|b| b.is_movable()) {
                return;
            }
            reverse = true;
        }
        let offset = self.options().bump_offset;
        let dx = anchor.x + offset - from.x;
        let mut dy = anchor.y + offset - from.y;
        if reverse {
            dy = -dy;
        }
        log::debug!("bumping {root} by ({dx}, {dy})");
        if let Err(err) = self.move_by(root, dx, dy) {
            log::warn!("bump failed: {err}");
        }
    }

    /// Break the connection at `conn`. Returns `Ok(false)` without firing
    /// anything when it was not connected.
    pub fn disconnect(&mut self, conn: ConnectionRef) -> Result<bool, ConnectionError> {
        if self.connection(conn).is_none() {
            return Err(ConnectionError::UnknownConnection(conn));
        }
        let Some(target) = self.target(conn) else {
            return Ok(false);
        };
        let (parent, child) = if conn.slot.is_superior() {
            (conn, target)
        } else {
            (target, conn)
        };
        let opened = self.history.begin_group();
        self.detach(parent, child, true);
        self.history.end_group(opened);
        Ok(true)
    }

    /// Detach a block from its parent. With `heal`, the gap closes: a
    /// statement block's successor moves up, and a value block's single
    /// value child takes its place.
    pub fn unplug(&mut self, id: BlockId, heal: bool) -> Result<(), BlockError> {
        let block = self.require(id)?;
        let has_output = block.output.is_some();
        let has_previous = block.previous.is_some();
        let opened = self.history.begin_group();
        let result = if has_output {
            self.unplug_from_row(id, heal)
        } else if has_previous {
            self.unplug_from_stack(id, heal)
        } else {
            Ok(())
        };
        self.history.end_group(opened);
        result
    }

    fn unplug_from_row(&mut self, id: BlockId, heal: bool) -> Result<(), BlockError> {
        let output = ConnectionRef::output(id);
        let parent = self.target(output);
        if parent.is_some() {
            self.disconnect(output)?;
        }
        let Some(parent) = parent.filter(|_| heal) else {
            return Ok(());
        };
        let Some(input) = self.require(id)?.only_value_input().map(|i| i.name) else {
            return Ok(());
        };
        let slot = ConnectionRef::new(id, ConnectionSlot::Input(input));
        let Some(child) = self.target(slot) else {
            return Ok(());
        };
        if self.block(child.block).is_some_and(|b| b.is_shadow) {
            return Ok(());
        }
        self.disconnect(child)?;
        if checker::is_compatible(self, child, parent) {
            self.connect(child, parent)?;
        } else {
            self.bump_away(child, parent);
        }
        Ok(())
    }

    fn unplug_from_stack(&mut self, id: BlockId, heal: bool) -> Result<(), BlockError> {
        let previous = ConnectionRef::previous(id);
        let previous_target = self.target(previous);
        if previous_target.is_some() {
            self.disconnect(previous)?;
        }
        if !heal {
            return Ok(());
        }
        let Some(next_target) = self.target(ConnectionRef::next(id)) else {
            return Ok(());
        };
        if self.block(next_target.block).is_some_and(|b| b.is_shadow) {
            return Ok(());
        }
        self.disconnect(next_target)?;
        if let Some(previous_target) = previous_target
            && checker::is_compatible(self, previous_target, next_target)
        {
            self.connect(previous_target, next_target)?;
        }
        Ok(())
    }
}
