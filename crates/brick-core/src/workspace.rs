//! The workspace: every block, the connections between them, the
//! variable table, and the event history.
//!
//! Blocks live in a `StableDiGraph` arena. An edge runs from a parent block
//! to a child block and records which slot on each side it joins, so the
//! graph is the single source of truth for "what is this connection
//! attached to". A block with no incoming edge is a top-level block.
//!
//! Block coordinates are absolute. A connection's position is its block's
//! origin plus the connection's offset, which the renderer fills in.

use crate::block::Block;
use crate::connection::{Connection, ConnectionRef, ConnectionSlot};
use crate::coordinate::Coordinate;
use crate::dom::XmlElement;
use crate::error::{BlockError, RegistryError, VariableError};
use crate::events::{ChangeElement, Event, EventKind, Location};
use crate::field::FieldKind;
use crate::history::{EventHistory, Listener, ListenerId};
use crate::id::{BlockId, Name, VariableId, WorkspaceId};
use crate::options::WorkspaceOptions;
use crate::registry::BlockRegistry;
use crate::variables::{VariableMap, VariableModel};
use crate::xml;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::rc::Rc;

/// Edge weight: which slot on the parent holds which slot on the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub parent_slot: ConnectionSlot,
    pub child_slot: ConnectionSlot,
}

#[derive(Debug)]
pub struct Workspace {
    id: WorkspaceId,
    graph: StableDiGraph<Block, Link>,
    /// Index from BlockId → NodeIndex for fast lookup.
    id_index: HashMap<BlockId, NodeIndex>,
    /// Top-level blocks in creation order.
    top_blocks: Vec<BlockId>,
    variables: VariableMap,
    registry: Rc<BlockRegistry>,
    options: WorkspaceOptions,
    pub(crate) history: EventHistory,
}

impl Workspace {
    pub fn new(registry: Rc<BlockRegistry>, options: WorkspaceOptions) -> Self {
        let history = EventHistory::new(options.max_undo);
        Self {
            id: WorkspaceId::generate(),
            graph: StableDiGraph::new(),
            id_index: HashMap::new(),
            top_blocks: Vec::new(),
            variables: VariableMap::new(),
            registry,
            options,
            history,
        }
    }

    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    pub fn options(&self) -> &WorkspaceOptions {
        &self.options
    }

    pub fn registry(&self) -> &Rc<BlockRegistry> {
        &self.registry
    }

    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    pub(crate) fn variables_mut(&mut self) -> &mut VariableMap {
        &mut self.variables
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    pub fn contains(&self, id: BlockId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.id_index.get(&id).map(|ix| &self.graph[*ix])
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.id_index
            .get(&id)
            .copied()
            .map(|ix| &mut self.graph[ix])
    }

    pub fn require(&self, id: BlockId) -> Result<&Block, BlockError> {
        self.block(id).ok_or(BlockError::UnknownBlock(id))
    }

    pub(crate) fn require_mut(&mut self, id: BlockId) -> Result<&mut Block, BlockError> {
        self.block_mut(id).ok_or(BlockError::UnknownBlock(id))
    }

    pub fn len(&self) -> usize {
        self.id_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_index.is_empty()
    }

    /// Top-level blocks. `ordered` sorts top to bottom, then left to right;
    /// otherwise creation order.
    pub fn top_blocks(&self, ordered: bool) -> Vec<BlockId> {
        let mut blocks = self.top_blocks.clone();
        if ordered {
            blocks.sort_by(|a, b| {
                let (pa, pb) = (self.xy(*a), self.xy(*b));
                pa.y.total_cmp(&pb.y).then(pa.x.total_cmp(&pb.x))
            });
        }
        blocks
    }

    /// Every block, each top-level stack followed by its descendants.
    pub fn all_blocks(&self, ordered: bool) -> Vec<BlockId> {
        self.top_blocks(ordered)
            .into_iter()
            .flat_map(|id| self.descendant_ids(id))
            .collect()
    }

    pub fn blocks_by_type(&self, block_type: &str, ordered: bool) -> Vec<BlockId> {
        self.all_blocks(ordered)
            .into_iter()
            .filter(|id| self.block(*id).is_some_and(|b| b.block_type == block_type))
            .collect()
    }

    fn xy(&self, id: BlockId) -> Coordinate {
        self.block(id).map(|b| b.xy).unwrap_or_default()
    }

    // ─── Tree queries ────────────────────────────────────────────────────

    /// The parent block and the link that joins them.
    pub fn parent_link(&self, id: BlockId) -> Option<(BlockId, Link)> {
        let ix = *self.id_index.get(&id)?;
        self.graph
            .edges_directed(ix, Direction::Incoming)
            .next()
            .map(|e| (self.graph[e.source()].id, *e.weight()))
    }

    pub fn parent(&self, id: BlockId) -> Option<BlockId> {
        self.parent_link(id).map(|(parent, _)| parent)
    }

    /// The block attached below `parent` at a superior slot.
    pub fn child_at(&self, parent: ConnectionRef) -> Option<(BlockId, Link)> {
        let ix = *self.id_index.get(&parent.block)?;
        self.graph
            .edges_directed(ix, Direction::Outgoing)
            .find(|e| e.weight().parent_slot == parent.slot)
            .map(|e| (self.graph[e.target()].id, *e.weight()))
    }

    /// The connection on the other end of `conn`, if any.
    pub fn target(&self, conn: ConnectionRef) -> Option<ConnectionRef> {
        if conn.slot.is_superior() {
            self.child_at(conn)
                .map(|(child, link)| ConnectionRef::new(child, link.child_slot))
        } else {
            self.parent_link(conn.block)
                .filter(|(_, link)| link.child_slot == conn.slot)
                .map(|(parent, link)| ConnectionRef::new(parent, link.parent_slot))
        }
    }

    pub fn target_block(&self, conn: ConnectionRef) -> Option<BlockId> {
        self.target(conn).map(|t| t.block)
    }

    pub fn is_connected(&self, conn: ConnectionRef) -> bool {
        self.target(conn).is_some()
    }

    /// Direct children: inputs in order, then the next block.
    pub fn children(&self, id: BlockId) -> Vec<BlockId> {
        let Some(block) = self.block(id) else {
            return Vec::new();
        };
        block
            .slots()
            .into_iter()
            .filter(|slot| slot.is_superior())
            .filter_map(|slot| self.child_at(ConnectionRef::new(id, slot)))
            .map(|(child, _)| child)
            .collect()
    }

    /// The block and everything below it, depth first, parent before child.
    pub fn descendant_ids(&self, id: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            let mut children = self.children(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    pub fn root_block(&self, id: BlockId) -> BlockId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    pub fn next_block(&self, id: BlockId) -> Option<BlockId> {
        self.target_block(ConnectionRef::next(id))
    }

    /// The block whose next connection holds this one.
    pub fn previous_block(&self, id: BlockId) -> Option<BlockId> {
        self.parent_link(id)
            .filter(|(_, link)| link.parent_slot == ConnectionSlot::Next)
            .map(|(parent, _)| parent)
    }

    /// The block above this one in its stack, or the block it is
    /// plugged into.
    pub fn surround_parent(&self, id: BlockId) -> Option<BlockId> {
        let mut current = id;
        loop {
            let prev = self.previous_block(current);
            match prev {
                Some(p) => current = p,
                None => return self.parent(current),
            }
        }
    }

    pub fn input_target_block(&self, id: BlockId, input: &str) -> Option<BlockId> {
        self.target_block(ConnectionRef::input(id, input))
    }

    /// The name of the input on `parent` that holds `child`.
    pub fn input_with_block(&self, parent: BlockId, child: BlockId) -> Option<Name> {
        match self.parent_link(child) {
            Some((p, link)) if p == parent => match link.parent_slot {
                ConnectionSlot::Input(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Walk the next-chain below `id` and return the first free next
    /// connection. With `ignore_shadows`, a shadow in the chain counts as
    /// free.
    pub fn last_connection_in_stack(&self, id: BlockId, ignore_shadows: bool) -> Option<ConnectionRef> {
        let mut current = id;
        loop {
            self.block(current)?.next.as_ref()?;
            let next = ConnectionRef::next(current);
            match self.target_block(next) {
                None => return Some(next),
                Some(b) if ignore_shadows && self.block(b).is_some_and(|b| b.is_shadow) => {
                    return Some(next);
                }
                Some(b) => current = b,
            }
        }
    }

    /// True if this block or any ancestor is disabled.
    pub fn is_inherited_disabled(&self, id: BlockId) -> bool {
        let mut current = Some(id);
        while let Some(block_id) = current {
            if self.block(block_id).is_some_and(|b| b.flags.disabled) {
                return true;
            }
            current = self.parent(block_id);
        }
        false
    }

    // ─── Connections ─────────────────────────────────────────────────────

    pub fn connection(&self, conn: ConnectionRef) -> Option<&Connection> {
        self.block(conn.block)?.connection(conn.slot)
    }

    pub(crate) fn connection_mut(&mut self, conn: ConnectionRef) -> Option<&mut Connection> {
        self.block_mut(conn.block)?.connection_mut(conn.slot)
    }

    /// Absolute position of a connection.
    pub fn connection_position(&self, conn: ConnectionRef) -> Option<Coordinate> {
        let block = self.block(conn.block)?;
        let c = block.connection(conn.slot)?;
        Some(block.xy + c.offset)
    }

    /// Every connection on every block, in arena order.
    pub fn all_connections(&self) -> Vec<ConnectionRef> {
        self.graph
            .node_indices()
            .flat_map(|ix| {
                let block = &self.graph[ix];
                block
                    .slots()
                    .into_iter()
                    .map(move |slot| ConnectionRef::new(block.id, slot))
            })
            .collect()
    }

    /// Renderer hook: record where a connection sits relative to its block.
    pub fn set_connection_offset(&mut self, conn: ConnectionRef, offset: Coordinate) -> bool {
        match self.connection_mut(conn) {
            Some(c) => {
                c.offset = offset;
                true
            }
            None => false,
        }
    }

    /// Renderer hook: place a block without firing events. Children are
    /// positioned by the renderer itself.
    pub fn set_block_xy(&mut self, id: BlockId, xy: Coordinate) -> bool {
        match self.block_mut(id) {
            Some(b) => {
                b.xy = xy;
                true
            }
            None => false,
        }
    }

    /// Shift a block and its descendants without firing events. Drag
    /// previews use this; the drop commits with `move_to` or `connect`.
    pub fn translate_subtree(&mut self, id: BlockId, delta: Coordinate) {
        for block_id in self.descendant_ids(id) {
            if let Some(b) = self.block_mut(block_id) {
                b.xy = b.xy + delta;
            }
        }
    }

    // ─── Raw graph edits (no events) ─────────────────────────────────────

    pub(crate) fn insert_block(&mut self, block: Block) -> BlockId {
        let id = block.id;
        let ix = self.graph.add_node(block);
        self.id_index.insert(id, ix);
        self.top_blocks.push(id);
        id
    }

    pub(crate) fn add_link(&mut self, parent: BlockId, child: BlockId, link: Link) {
        let (Some(&p), Some(&c)) = (self.id_index.get(&parent), self.id_index.get(&child)) else {
            return;
        };
        self.graph.add_edge(p, c, link);
        self.top_blocks.retain(|b| *b != child);
    }

    /// Remove the link above `child`. Returns the former parent link.
    pub(crate) fn remove_link(&mut self, child: BlockId) -> Option<(BlockId, Link)> {
        let ix = *self.id_index.get(&child)?;
        let edge = self.graph.edges_directed(ix, Direction::Incoming).next()?;
        let (edge_id, parent, link) = (edge.id(), self.graph[edge.source()].id, *edge.weight());
        self.graph.remove_edge(edge_id);
        self.top_blocks.push(child);
        Some((parent, link))
    }

    /// Delete a block and its descendants from the arena.
    pub(crate) fn remove_subtree(&mut self, id: BlockId) {
        for block_id in self.descendant_ids(id) {
            if let Some(ix) = self.id_index.remove(&block_id) {
                self.graph.remove_node(ix);
            }
            self.top_blocks.retain(|b| *b != block_id);
        }
    }

    // ─── Events ──────────────────────────────────────────────────────────

    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event {
            kind,
            workspace_id: self.id,
            group: self.history.group(),
            record_undo: self.history.record_undo(),
        }
    }

    pub(crate) fn fire(&mut self, kind: EventKind) {
        if self.history.is_enabled() {
            let event = self.event(kind);
            self.history.fire(event);
        }
    }

    pub fn events_enabled(&self) -> bool {
        self.history.is_enabled()
    }

    /// Suppress events. Pair with [`enable_events`](Self::enable_events).
    pub fn disable_events(&mut self) {
        self.history.disable();
    }

    pub fn enable_events(&mut self) {
        self.history.enable();
    }

    /// Open an event group unless one is active. Pass the result to
    /// [`end_group`](Self::end_group).
    pub fn begin_group(&mut self) -> bool {
        self.history.begin_group()
    }

    pub fn end_group(&mut self, opened: bool) {
        self.history.end_group(opened);
    }

    pub fn set_group(&mut self, group: Option<crate::id::GroupId>) {
        self.history.set_group(group);
    }

    pub fn add_change_listener(&mut self, listener: Listener) -> ListenerId {
        self.history.add_listener(listener)
    }

    pub fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        self.history.remove_listener(id)
    }

    /// Where a block currently sits, for move events.
    pub fn location(&self, id: BlockId) -> Location {
        match self.parent_link(id) {
            Some((parent, link)) => Location {
                parent_id: Some(parent),
                input_name: match link.parent_slot {
                    ConnectionSlot::Input(name) => Some(name),
                    _ => None,
                },
                coordinate: None,
            },
            None => Location {
                parent_id: None,
                input_name: None,
                coordinate: Some(self.xy(id)),
            },
        }
    }

    pub(crate) fn fire_move(&mut self, id: BlockId, old: Location) {
        let new = self.location(id);
        self.fire(EventKind::Move {
            block_id: id,
            old,
            new,
        });
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    /// Undo (or redo) the most recent event group. Returns false when the
    /// stack is empty.
    pub fn undo(&mut self, redo: bool) -> bool {
        let step = self.history.take_step(redo);
        if step.is_empty() {
            return false;
        }
        let events = crate::events::filter(&step, redo);
        log::debug!(
            "{} {} event(s)",
            if redo { "redo" } else { "undo" },
            events.len()
        );
        let previous = self.history.set_record_undo(false);
        for event in &events {
            if let Err(err) = event.run(self, redo) {
                log::warn!("failed to replay {} event: {err}", event.kind.name());
            }
        }
        self.history.set_record_undo(previous);
        true
    }

    pub fn clear_undo(&mut self) {
        self.history.clear();
    }

    pub fn can_undo(&self) -> bool {
        self.history.undo_len() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history.redo_len() > 0
    }

    // ─── Block lifecycle ─────────────────────────────────────────────────

    /// Create a block of a registered type and fire a create event.
    pub fn new_block(&mut self, block_type: &str) -> Result<BlockId, BlockError> {
        self.new_block_with_id(block_type, None)
    }

    /// As [`new_block`](Self::new_block), reusing `id` when it is free.
    pub fn new_block_with_id(
        &mut self,
        block_type: &str,
        id: Option<BlockId>,
    ) -> Result<BlockId, BlockError> {
        let opened = self.history.begin_group();
        let result = self.new_block_inner(block_type, id).and_then(|id| {
            self.ensure_default_variables(id)?;
            let xml = xml::block_to_dom_with_xy(self, id, false)?;
            self.fire(EventKind::Create {
                block_id: id,
                xml,
                ids: vec![id],
            });
            Ok(id)
        });
        self.history.end_group(opened);
        result
    }

    /// Construct and insert a block without events or default variables.
    pub(crate) fn new_block_inner(
        &mut self,
        block_type: &str,
        id: Option<BlockId>,
    ) -> Result<BlockId, BlockError> {
        let definition = self
            .registry
            .get(block_type)
            .ok_or_else(|| RegistryError::UnknownType {
                block_type: block_type.to_string(),
                block_id: id,
            })?;
        let id = match id {
            Some(id) if !self.contains(id) => id,
            _ => loop {
                let fresh = BlockId::generate();
                if !self.contains(fresh) {
                    break fresh;
                }
            },
        };
        let mut block = Block::new(id, block_type);
        definition.init(&mut block)?;
        block.inputs_inline_default = block.inputs_inline;
        log::trace!("new block {id} ({block_type})");
        Ok(self.insert_block(block))
    }

    /// Give every unset variable field a variable, creating its default
    /// name if needed.
    pub(crate) fn ensure_default_variables(&mut self, id: BlockId) -> Result<(), BlockError> {
        let pending: Vec<(Name, String, String)> = self
            .require(id)?
            .fields()
            .filter_map(|f| match &f.kind {
                FieldKind::Variable {
                    variable: None,
                    default_name,
                    variable_type,
                } => f.name.map(|n| (n, default_name.clone(), variable_type.clone())),
                _ => None,
            })
            .collect();
        for (field, default_name, var_type) in pending {
            let name = if default_name.is_empty() {
                self.variables.unique_name()
            } else {
                default_name
            };
            let model = self.create_variable(&name, &var_type, None)?;
            if let Some(f) = self.require_mut(id)?.field_mut(field.as_str()) {
                f.set_value(model.id.as_str())?;
            }
        }
        Ok(())
    }

    /// Delete a block and its descendants.
    ///
    /// A block that still has a parent can only be deleted with `heal`,
    /// which first unplugs it and reconnects whatever was below it.
    pub fn dispose_block(&mut self, id: BlockId, heal: bool) -> Result<(), BlockError> {
        self.require(id)?;
        if self.parent(id).is_some() && !heal {
            return Err(BlockError::ConnectedBlockDelete(id));
        }
        let opened = self.history.begin_group();
        let result = self.dispose_inner(id, heal);
        self.history.end_group(opened);
        result
    }

    /// Used by event replay: never refuses.
    pub(crate) fn force_dispose(&mut self, id: BlockId) {
        let opened = self.history.begin_group();
        if let Err(err) = self.dispose_inner(id, false) {
            log::warn!("failed to dispose {id}: {err}");
        }
        self.history.end_group(opened);
    }

    fn dispose_inner(&mut self, id: BlockId, heal: bool) -> Result<(), BlockError> {
        // Healing a stack top still detaches its tail, which stays behind.
        if heal || self.parent(id).is_some() {
            self.unplug(id, heal)?;
        }
        let ids = self.descendant_ids(id);
        let old_xml = xml::block_to_dom_with_xy(self, id, false)?;
        self.remove_subtree(id);
        log::trace!("disposed {id} ({} block(s))", ids.len());
        self.fire(EventKind::Delete {
            block_id: id,
            old_xml,
            ids,
        });
        Ok(())
    }

    /// Delete every block and variable.
    pub fn clear(&mut self) {
        let opened = self.history.begin_group();
        for id in self.top_blocks(false) {
            self.force_dispose(id);
        }
        for var in self.variables.all().to_vec() {
            if self.variables.delete(var.id).is_ok() {
                self.fire(EventKind::VarDelete {
                    var_id: var.id,
                    var_type: var.var_type,
                    var_name: var.name,
                });
            }
        }
        self.history.end_group(opened);
    }

    // ─── Property changes ────────────────────────────────────────────────

    fn fire_change(
        &mut self,
        id: BlockId,
        element: ChangeElement,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        if old_value != new_value {
            self.fire(EventKind::Change {
                block_id: id,
                element,
                old_value,
                new_value,
            });
        }
    }

    pub fn set_field_value(&mut self, id: BlockId, field: &str, value: &str) -> Result<(), BlockError> {
        let unknown = || BlockError::UnknownField {
            block: id,
            name: Name::intern(field),
        };
        let is_variable = matches!(
            self.require(id)?.field(field).ok_or_else(unknown)?.kind,
            FieldKind::Variable { .. }
        );
        if is_variable && self.variables.by_id(VariableId::intern(value)).is_none() {
            return Err(BlockError::InvalidFieldValue {
                name: Name::intern(field),
                value: value.to_string(),
            });
        }
        let f = self.require_mut(id)?.field_mut(field).ok_or_else(unknown)?;
        let old = f.value();
        f.set_value(value)?;
        let new = f.value();
        self.fire_change(id, ChangeElement::Field(Name::intern(field)), Some(old), Some(new));
        Ok(())
    }

    pub fn set_collapsed(&mut self, id: BlockId, collapsed: bool) -> Result<(), BlockError> {
        let block = self.require_mut(id)?;
        let old = std::mem::replace(&mut block.flags.collapsed, collapsed);
        self.fire_change(id, ChangeElement::Collapsed, Some(old.to_string()), Some(collapsed.to_string()));
        Ok(())
    }

    pub fn set_enabled(&mut self, id: BlockId, enabled: bool) -> Result<(), BlockError> {
        let block = self.require_mut(id)?;
        let old = std::mem::replace(&mut block.flags.disabled, !enabled);
        self.fire_change(id, ChangeElement::Disabled, Some(old.to_string()), Some((!enabled).to_string()));
        Ok(())
    }

    pub fn set_inputs_inline(&mut self, id: BlockId, inline: bool) -> Result<(), BlockError> {
        let block = self.require_mut(id)?;
        let old = block.is_inline();
        block.inputs_inline = Some(inline);
        self.fire_change(id, ChangeElement::Inline, Some(old.to_string()), Some(inline.to_string()));
        Ok(())
    }

    pub fn set_comment(&mut self, id: BlockId, comment: Option<String>) -> Result<(), BlockError> {
        let comment = comment.filter(|c| !c.is_empty());
        let block = self.require_mut(id)?;
        let old = std::mem::replace(&mut block.comment, comment.clone());
        self.fire_change(id, ChangeElement::Comment, old, comment);
        Ok(())
    }

    pub fn set_deletable(&mut self, id: BlockId, deletable: bool) -> Result<(), BlockError> {
        self.require_mut(id)?.flags.deletable = deletable;
        Ok(())
    }

    pub fn set_movable(&mut self, id: BlockId, movable: bool) -> Result<(), BlockError> {
        self.require_mut(id)?.flags.movable = movable;
        Ok(())
    }

    pub fn set_editable(&mut self, id: BlockId, editable: bool) -> Result<(), BlockError> {
        self.require_mut(id)?.flags.editable = editable;
        Ok(())
    }

    /// Translate a top-level block and its descendants.
    pub fn move_by(&mut self, id: BlockId, dx: f64, dy: f64) -> Result<(), BlockError> {
        self.require(id)?;
        if self.parent(id).is_some() {
            return Err(BlockError::NotTopLevel(id));
        }
        let old = self.location(id);
        self.translate_subtree(id, Coordinate::new(dx, dy));
        self.fire_move(id, old);
        Ok(())
    }

    pub fn move_to(&mut self, id: BlockId, xy: Coordinate) -> Result<(), BlockError> {
        let delta = xy - self.require(id)?.xy;
        self.move_by(id, delta.x, delta.y)
    }

    /// Apply a `<mutation>` element through the block's definition.
    ///
    /// Children left hanging from inputs the mutation removed are detached
    /// to the top level (shadows are deleted).
    pub fn apply_mutation(&mut self, id: BlockId, mutation: &XmlElement) -> Result<(), BlockError> {
        let block_type = self.require(id)?.block_type.clone();
        let definition = self
            .registry
            .get(&block_type)
            .ok_or_else(|| RegistryError::UnknownType {
                block_type: block_type.clone(),
                block_id: Some(id),
            })?;
        let opened = self.history.begin_group();
        let old = definition
            .mutation_to_dom(self.require(id)?)
            .map(|m| m.to_xml_string());
        let result = (|| -> Result<(), BlockError> {
            definition.dom_to_mutation(self.require_mut(id)?, mutation)?;
            self.prune_dangling_links(id)?;
            let new = definition
                .mutation_to_dom(self.require(id)?)
                .map(|m| m.to_xml_string());
            self.fire_change(id, ChangeElement::Mutation, old, new);
            Ok(())
        })();
        self.history.end_group(opened);
        result
    }

    /// Detach children whose parent slot no longer exists.
    pub(crate) fn prune_dangling_links(&mut self, id: BlockId) -> Result<(), BlockError> {
        let Some(&ix) = self.id_index.get(&id) else {
            return Ok(());
        };
        let block = &self.graph[ix];
        let dangling: Vec<(BlockId, Link)> = self
            .graph
            .edges_directed(ix, Direction::Outgoing)
            .filter(|e| block.connection(e.weight().parent_slot).is_none())
            .map(|e| (self.graph[e.target()].id, *e.weight()))
            .collect();
        for (child, _) in dangling {
            let old = self.location(child);
            self.remove_link(child);
            if self.block(child).is_some_and(|b| b.is_shadow) {
                self.remove_subtree(child);
                continue;
            }
            log::debug!("detached {child} from removed input on {id}");
            self.fire_move(child, old);
        }
        Ok(())
    }

    // ─── Variables ───────────────────────────────────────────────────────

    pub fn variable(&self, id: VariableId) -> Option<&VariableModel> {
        self.variables.by_id(id)
    }

    /// Create a variable, or return the existing one with that name.
    pub fn create_variable(
        &mut self,
        name: &str,
        var_type: &str,
        id: Option<VariableId>,
    ) -> Result<VariableModel, VariableError> {
        let (model, created) = self.variables.create(name, var_type, id)?;
        if created {
            self.fire(EventKind::VarCreate {
                var_id: model.id,
                var_type: model.var_type.clone(),
                var_name: model.name.clone(),
            });
        }
        Ok(model)
    }

    pub fn rename_variable(&mut self, id: VariableId, new_name: &str) -> Result<(), VariableError> {
        let old_name = self.variables.rename(id, new_name)?;
        if old_name != new_name {
            self.fire(EventKind::VarRename {
                var_id: id,
                old_name,
                new_name: new_name.to_string(),
            });
        }
        Ok(())
    }

    /// Blocks with a field referring to the variable.
    pub fn variable_uses(&self, id: VariableId) -> Vec<BlockId> {
        self.all_blocks(false)
            .into_iter()
            .filter(|b| {
                self.block(*b)
                    .is_some_and(|block| block.fields().any(|f| f.variable_id() == Some(id)))
            })
            .collect()
    }

    /// Delete a variable and every block that uses it, as one undo step.
    pub fn delete_variable(&mut self, id: VariableId) -> Result<(), BlockError> {
        let model = self
            .variables
            .by_id(id)
            .cloned()
            .ok_or(VariableError::UnknownVariable(id))?;
        let opened = self.history.begin_group();
        let result = (|| -> Result<(), BlockError> {
            for user in self.variable_uses(id) {
                if self.contains(user) {
                    self.dispose_block(user, true)?;
                }
            }
            self.variables.delete(id)?;
            self.fire(EventKind::VarDelete {
                var_id: model.id,
                var_type: model.var_type.clone(),
                var_name: model.name.clone(),
            });
            Ok(())
        })();
        self.history.end_group(opened);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::stock_registry;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn workspace() -> Workspace {
        Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    #[test]
    fn new_block_is_top_level_and_fires_create() {
        let mut ws = workspace();
        let id = ws.new_block("math_number").unwrap();
        assert_eq!(ws.top_blocks(false), vec![id]);
        assert!(ws.can_undo());
        assert!(matches!(
            ws.new_block("no_such_block"),
            Err(BlockError::Registry(RegistryError::UnknownType { .. }))
        ));
    }

    #[test]
    fn requested_id_is_reused_only_when_free() {
        let mut ws = workspace();
        let wanted = BlockId::intern("fixed_id");
        assert_eq!(ws.new_block_with_id("math_number", Some(wanted)).unwrap(), wanted);
        let second = ws.new_block_with_id("math_number", Some(wanted)).unwrap();
        assert_ne!(second, wanted);
    }

    #[test]
    fn ordered_top_blocks_sort_by_position() {
        let mut ws = workspace();
        let low = ws.new_block("math_number").unwrap();
        let high = ws.new_block("math_number").unwrap();
        ws.move_to(low, Coordinate::new(0.0, 100.0)).unwrap();
        ws.move_to(high, Coordinate::new(50.0, 10.0)).unwrap();
        assert_eq!(ws.top_blocks(false), vec![low, high]);
        assert_eq!(ws.top_blocks(true), vec![high, low]);
    }

    #[test]
    fn variable_blocks_get_a_default_variable() {
        let mut ws = workspace();
        let id = ws.new_block("variables_get").unwrap();
        let var = ws.block(id).unwrap().field("VAR").unwrap().variable_id().unwrap();
        assert_eq!(ws.variable(var).unwrap().name, "item");
    }

    #[test]
    fn field_change_fires_only_on_difference() {
        let mut ws = workspace();
        let id = ws.new_block("math_number").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        ws.add_change_listener(Box::new(move |e| log.borrow_mut().push(e.kind.name())));
        ws.set_field_value(id, "NUM", "5").unwrap();
        ws.set_field_value(id, "NUM", "5").unwrap();
        assert_eq!(*seen.borrow(), vec!["change"]);
        assert_eq!(ws.block(id).unwrap().field_value("NUM").as_deref(), Some("5"));
    }

    #[test]
    fn variable_field_rejects_unknown_ids() {
        let mut ws = workspace();
        let id = ws.new_block("variables_get").unwrap();
        assert!(matches!(
            ws.set_field_value(id, "VAR", "nope"),
            Err(BlockError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn undo_and_redo_a_property_change() {
        let mut ws = workspace();
        let id = ws.new_block("math_number").unwrap();
        ws.clear_undo();
        ws.set_collapsed(id, true).unwrap();
        assert!(ws.undo(false));
        assert!(!ws.block(id).unwrap().is_collapsed());
        assert!(ws.undo(true));
        assert!(ws.block(id).unwrap().is_collapsed());
        ws.clear_undo();
        assert!(!ws.undo(false));
    }

    #[test]
    fn undo_create_removes_block_and_redo_restores_it() {
        let mut ws = workspace();
        let id = ws.new_block("math_number").unwrap();
        ws.set_field_value(id, "NUM", "7").unwrap();
        assert!(ws.undo(false));
        assert!(ws.undo(false));
        assert!(!ws.contains(id));
        assert!(ws.undo(true));
        assert!(ws.contains(id));
    }

    #[test]
    fn move_by_requires_top_level() {
        let mut ws = workspace();
        let id = ws.new_block("math_number").unwrap();
        ws.move_by(id, 10.0, 20.0).unwrap();
        assert_eq!(ws.block(id).unwrap().xy, Coordinate::new(10.0, 20.0));
    }

    #[test]
    fn delete_variable_removes_users_in_one_step() {
        let mut ws = workspace();
        let getter = ws.new_block("variables_get").unwrap();
        let var = ws.block(getter).unwrap().field("VAR").unwrap().variable_id().unwrap();
        ws.clear_undo();
        ws.delete_variable(var).unwrap();
        assert!(!ws.contains(getter));
        assert!(ws.variable(var).is_none());
        assert!(ws.undo(false));
        assert!(ws.contains(getter));
        assert!(ws.variable(var).is_some());
    }

    #[test]
    fn clear_empties_workspace() {
        let mut ws = workspace();
        ws.new_block("variables_get").unwrap();
        ws.new_block("math_number").unwrap();
        ws.clear();
        assert!(ws.is_empty());
        assert!(ws.variables().all().is_empty());
    }
}
