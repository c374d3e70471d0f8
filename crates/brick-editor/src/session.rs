//! Editing session: the one place input turns into model edits.
//!
//! `EditorSession` owns a workspace and everything that looks at it (the
//! renderer cache, live gestures, the drag in progress, keyboard cursor,
//! marker, clipboard and selection). Every handler runs to completion in
//! the same order: mutate the workspace (which fires its events), then
//! re-render, then drop any cursor or selection whose block is gone.

use crate::clipboard::Clipboard;
use crate::cursor::{Cursor, Marker};
use crate::dragger::{BlockDragger, Candidate, DropOutcome};
use crate::error::EditorError;
use crate::gesture::{GestureHandler, GestureKind};
use crate::input::{InputEvent, Modifiers, PointerId};
use crate::node::Node;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use brick_core::connection::ConnectionRef;
use brick_core::coordinate::Coordinate;
use brick_core::error::BlockError;
use brick_core::id::BlockId;
use brick_core::options::WorkspaceOptions;
use brick_core::registry::BlockRegistry;
use brick_core::workspace::Workspace;
use brick_core::xml;
use brick_render::{ConstantProvider, Renderer, hit_test, render_svg};
use std::rc::Rc;

pub struct EditorSession {
    workspace: Workspace,
    renderer: Renderer,
    gestures: GestureHandler,
    /// The drag in progress and the pointer driving it.
    drag: Option<(PointerId, BlockDragger)>,
    cursor: Cursor,
    marker: Marker,
    clipboard: Clipboard,
    selected: Option<BlockId>,
}

impl EditorSession {
    pub fn new(registry: Rc<BlockRegistry>, options: WorkspaceOptions) -> Self {
        Self::from_workspace(Workspace::new(registry, options))
    }

    /// Wrap an existing workspace. Nothing is rendered until the first
    /// edit or an explicit [`render`](Self::render).
    pub fn from_workspace(workspace: Workspace) -> Self {
        let options = workspace.options();
        let gestures = GestureHandler::new(options.max_gestures, options.drag_radius);
        Self {
            workspace,
            renderer: Renderer::new(ConstantProvider::default()),
            gestures,
            drag: None,
            cursor: Cursor::default(),
            marker: Marker::new(),
            clipboard: Clipboard::new(),
            selected: None,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Direct access for edits the session has no verb for. Call
    /// [`render`](Self::render) afterwards.
    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn selected(&self) -> Option<BlockId> {
        self.selected
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The connection the current drag would snap to.
    pub fn drag_candidate(&self) -> Option<Candidate> {
        self.drag.as_ref().and_then(|(_, d)| d.candidate())
    }

    // ─── Document ────────────────────────────────────────────────────────

    /// Load blocks from XML text into the workspace and render them.
    pub fn load_xml(&mut self, text: &str) -> Result<Vec<BlockId>, EditorError> {
        let dom = xml::text_to_dom(text)?;
        let ids = xml::dom_to_workspace(&dom, &mut self.workspace)?;
        self.render()?;
        Ok(ids)
    }

    pub fn to_xml(&self) -> Result<String, EditorError> {
        let dom = xml::workspace_to_dom(&self.workspace, false)?;
        Ok(xml::dom_to_pretty_text(&dom))
    }

    pub fn to_svg(&self) -> String {
        render_svg(&self.workspace, &self.renderer)
    }

    /// Re-render everything and forget positions that no longer exist.
    pub fn render(&mut self) -> Result<(), EditorError> {
        self.renderer.render_all(&mut self.workspace)?;
        self.cursor.revalidate(&self.workspace);
        self.marker.revalidate(&self.workspace);
        if self.selected.is_some_and(|id| !self.workspace.contains(id)) {
            self.selected = None;
        }
        Ok(())
    }

    pub fn select(&mut self, id: Option<BlockId>) {
        if self.selected != id {
            log::trace!("select {id:?}");
            self.selected = id;
        }
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Process one input event.
    pub fn handle(&mut self, event: &InputEvent) -> Result<(), EditorError> {
        match event {
            InputEvent::PointerDown {
                pointer, x, y, ..
            } => self.pointer_down(*pointer, Coordinate::new(*x, *y)),
            InputEvent::PointerMove {
                pointer,
                x,
                y,
                modifiers,
            } => self.pointer_move(*pointer, Coordinate::new(*x, *y), *modifiers),
            InputEvent::PointerUp { pointer, x, y } => {
                self.pointer_up(*pointer, Coordinate::new(*x, *y))
            }
            InputEvent::PointerCancel { pointer } => self.pointer_cancel(*pointer),
            InputEvent::Key { key, modifiers } => match ShortcutMap::resolve(key, *modifiers) {
                Some(action) => self.run(action),
                None => Ok(()),
            },
        }
    }

    fn pointer_down(&mut self, pointer: PointerId, at: Coordinate) -> Result<(), EditorError> {
        let target = hit_test(&self.workspace, &self.renderer, at.x, at.y);
        self.gestures.start(pointer, at, target)?;
        self.select(target);
        Ok(())
    }

    fn pointer_move(
        &mut self,
        pointer: PointerId,
        at: Coordinate,
        modifiers: Modifiers,
    ) -> Result<(), EditorError> {
        let Some(gesture) = self.gestures.get_mut(pointer) else {
            return Ok(());
        };
        let became_drag = gesture.update(at);
        let (target, delta) = (gesture.target(), gesture.delta());

        if became_drag
            && self.drag.is_none()
            && let Some(block) = target.and_then(|t| self.draggable(t))
        {
            if self.workspace.options().read_only {
                log::debug!("read-only workspace: not dragging {block}");
            } else {
                let dragger = BlockDragger::start(&mut self.workspace, block, modifiers.command())?;
                self.select(Some(block));
                self.drag = Some((pointer, dragger));
            }
        }

        if let Some((owner, dragger)) = &mut self.drag
            && *owner == pointer
        {
            dragger.drag(&mut self.workspace, delta);
        }
        Ok(())
    }

    fn pointer_up(&mut self, pointer: PointerId, at: Coordinate) -> Result<(), EditorError> {
        let mut gesture = match self.gestures.finish(pointer) {
            Ok(gesture) => gesture,
            Err(err) => {
                log::debug!("ignoring release: {err}");
                return Ok(());
            }
        };
        match gesture.release(at) {
            GestureKind::Drag { .. } => {
                if let Some((_, dragger)) = self.drag.take_if(|(owner, _)| *owner == pointer) {
                    let outcome = dragger.drop(&mut self.workspace)?;
                    if let DropOutcome::Connected(candidate) = outcome {
                        log::debug!("drop connected {} to {}", candidate.moving, candidate.target);
                    }
                    self.render()?;
                }
            }
            GestureKind::Click { target } => self.select(target),
            GestureKind::Cancelled => {}
        }
        Ok(())
    }

    fn pointer_cancel(&mut self, pointer: PointerId) -> Result<(), EditorError> {
        if let Ok(mut gesture) = self.gestures.finish(pointer) {
            gesture.cancel();
        }
        if let Some((_, dragger)) = self.drag.take_if(|(owner, _)| *owner == pointer) {
            dragger.cancel(&mut self.workspace)?;
            self.render()?;
        }
        Ok(())
    }

    /// Shadow blocks drag with their nearest real ancestor.
    fn draggable(&self, id: BlockId) -> Option<BlockId> {
        let mut current = id;
        loop {
            let block = self.workspace.block(current)?;
            if !block.is_shadow {
                return block.is_movable().then_some(current);
            }
            current = self.workspace.parent(current)?;
        }
    }

    // ─── Actions ─────────────────────────────────────────────────────────

    /// Run a shortcut action. While a drag is in progress only `Cancel`
    /// is honoured.
    pub fn run(&mut self, action: ShortcutAction) -> Result<(), EditorError> {
        if self.drag.is_some() && action != ShortcutAction::Cancel {
            log::debug!("{action:?} ignored during a drag");
            return Ok(());
        }
        match action {
            ShortcutAction::Undo => self.undo(false).map(|_| ()),
            ShortcutAction::Redo => self.undo(true).map(|_| ()),
            ShortcutAction::Delete => self.delete_selected().map(|_| ()),
            ShortcutAction::Copy => self.copy(),
            ShortcutAction::Cut => {
                self.copy()?;
                self.delete_selected().map(|_| ())
            }
            ShortcutAction::Paste => self.paste().map(|_| ()),
            ShortcutAction::Duplicate => self.duplicate().map(|_| ()),
            ShortcutAction::In => {
                self.cursor.move_in(&self.workspace);
                Ok(())
            }
            ShortcutAction::Out => {
                self.cursor.move_out(&self.workspace);
                Ok(())
            }
            ShortcutAction::Next => {
                self.cursor.move_next(&self.workspace);
                Ok(())
            }
            ShortcutAction::Previous => {
                self.cursor.move_prev(&self.workspace);
                Ok(())
            }
            ShortcutAction::Mark => {
                self.marker.set_node(self.cursor.node().copied());
                Ok(())
            }
            ShortcutAction::InsertAtMark => self.insert_at_mark().map(|_| ()),
            ShortcutAction::Disconnect => self.disconnect_at_cursor().map(|_| ()),
            ShortcutAction::Cancel => {
                self.cancel();
                Ok(())
            }
        }
    }

    fn check_writable(&self) -> Result<(), EditorError> {
        if self.workspace.options().read_only {
            return Err(EditorError::ReadOnly);
        }
        Ok(())
    }

    /// Undo or redo one step. Returns false when there was nothing to do.
    pub fn undo(&mut self, redo: bool) -> Result<bool, EditorError> {
        self.check_writable()?;
        let done = self.workspace.undo(redo);
        if done {
            self.render()?;
        }
        Ok(done)
    }

    /// Delete the selected block, healing the stack around it.
    pub fn delete_selected(&mut self) -> Result<bool, EditorError> {
        self.check_writable()?;
        let Some(id) = self.selected else {
            return Ok(false);
        };
        if !self.workspace.require(id)?.is_deletable() {
            return Err(BlockError::NotDeletable(id).into());
        }
        self.workspace.dispose_block(id, true)?;
        self.selected = None;
        self.render()?;
        Ok(true)
    }

    pub fn copy(&mut self) -> Result<(), EditorError> {
        match self.selected {
            Some(id) => self.clipboard.copy(&self.workspace, id),
            None => Ok(()),
        }
    }

    /// Paste the clipboard. With the cursor on a connection, the copy is
    /// plugged in there when it fits.
    pub fn paste(&mut self) -> Result<BlockId, EditorError> {
        self.check_writable()?;
        let id = match self.cursor.node().and_then(Node::connection) {
            Some(conn) => self.clipboard.paste_into(&mut self.workspace, conn)?,
            None => self.clipboard.paste(&mut self.workspace)?,
        };
        self.selected = Some(id);
        self.render()?;
        Ok(id)
    }

    pub fn duplicate(&mut self) -> Result<Option<BlockId>, EditorError> {
        self.check_writable()?;
        let Some(id) = self.selected else {
            return Ok(None);
        };
        let copy = Clipboard::duplicate(&mut self.workspace, id)?;
        self.selected = Some(copy);
        self.render()?;
        Ok(Some(copy))
    }

    /// Connect the block under the cursor to the marked connection.
    /// Returns false when the two cannot be joined.
    pub fn insert_at_mark(&mut self) -> Result<bool, EditorError> {
        self.check_writable()?;
        let (Some(marked), Some(cursor)) = (
            self.marker.node().and_then(Node::connection),
            self.cursor.node().copied(),
        ) else {
            return Ok(false);
        };
        let candidates: Vec<ConnectionRef> = match (cursor.connection(), cursor.block()) {
            (Some(conn), _) => vec![conn],
            (None, Some(block)) => self
                .workspace
                .block(block)
                .map(|b| b.slots().into_iter().map(|s| ConnectionRef::new(block, s)).collect())
                .unwrap_or_default(),
            (None, None) => Vec::new(),
        };
        let Some(moving) = candidates
            .into_iter()
            .find(|&c| self.workspace.is_compatible(c, marked))
        else {
            log::debug!("nothing at {cursor} fits {marked}");
            return Ok(false);
        };
        self.workspace.connect(moving, marked)?;
        self.render()?;
        Ok(true)
    }

    /// Pull the block under the cursor off whatever holds it.
    pub fn disconnect_at_cursor(&mut self) -> Result<bool, EditorError> {
        self.check_writable()?;
        let Some(node) = self.cursor.node().copied() else {
            return Ok(false);
        };
        let done = match node.connection() {
            Some(conn) if self.workspace.is_connected(conn) => self.workspace.disconnect(conn)?,
            _ => match node.block() {
                Some(block) if self.workspace.parent(block).is_some() => {
                    self.workspace.unplug(block, false)?;
                    true
                }
                _ => false,
            },
        };
        if done {
            self.render()?;
        }
        Ok(done)
    }

    /// Abort every gesture and any drag, then clear the selection.
    pub fn cancel(&mut self) {
        self.gestures.cancel_all();
        if let Some((_, dragger)) = self.drag.take() {
            let cancelled = dragger
                .cancel(&mut self.workspace)
                .and_then(|()| self.render());
            if let Err(err) = cancelled {
                log::warn!("drag cancel left the workspace unrendered: {err}");
            }
            return;
        }
        self.select(None);
    }

    /// Set a field and re-render the affected stack.
    pub fn set_field_value(&mut self, id: BlockId, field: &str, value: &str) -> Result<(), EditorError> {
        self.check_writable()?;
        self.workspace.set_field_value(id, field, value)?;
        self.renderer.render_block(&mut self.workspace, id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use pretty_assertions::assert_eq;

    fn session() -> EditorSession {
        EditorSession::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    #[test]
    fn read_only_refuses_edits() {
        let options = WorkspaceOptions {
            read_only: true,
            ..WorkspaceOptions::default()
        };
        let mut s = EditorSession::new(Rc::new(stock_registry()), options);
        let block = s.workspace_mut().new_block("math_number").unwrap();
        s.select(Some(block));
        assert_eq!(s.delete_selected(), Err(EditorError::ReadOnly));
        assert_eq!(s.undo(false), Err(EditorError::ReadOnly));
        assert!(s.copy().is_ok());
    }

    #[test]
    fn undeletable_blocks_stay() {
        let mut s = session();
        let block = s.workspace_mut().new_block("math_number").unwrap();
        s.workspace_mut().set_deletable(block, false).unwrap();
        s.select(Some(block));
        assert_eq!(
            s.delete_selected(),
            Err(EditorError::Block(BlockError::NotDeletable(block)))
        );
        assert!(s.workspace().contains(block));
    }

    #[test]
    fn escape_clears_selection() {
        let mut s = session();
        let block = s.workspace_mut().new_block("math_number").unwrap();
        s.select(Some(block));
        s.handle(&InputEvent::key("Escape")).unwrap();
        assert_eq!(s.selected(), None);
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut s = session();
        assert!(s.handle(&InputEvent::mouse_up(1.0, 1.0)).is_ok());
    }

    #[test]
    fn field_edits_rerender_the_block() {
        let mut s = session();
        let number = s.workspace_mut().new_block("math_number").unwrap();
        s.render().unwrap();
        let narrow = s.renderer().rendered(number).unwrap().info.width;
        s.set_field_value(number, "NUM", "1234567890").unwrap();
        let wide = s.renderer().rendered(number).unwrap().info.width;
        assert!(wide > narrow);
    }
}
