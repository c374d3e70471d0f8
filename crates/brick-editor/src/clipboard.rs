//! Copy and paste of block subtrees.
//!
//! Copies are stored as XML without ids, so every paste creates fresh
//! blocks. A paste lands where the original was, stepped diagonally until
//! it no longer sits on top of another block.

use crate::error::EditorError;
use brick_core::checker;
use brick_core::connection::ConnectionRef;
use brick_core::coordinate::Coordinate;
use brick_core::dom::XmlElement;
use brick_core::error::ConnectionError;
use brick_core::id::BlockId;
use brick_core::workspace::Workspace;
use brick_core::xml;
use std::collections::HashSet;

/// Two blocks closer than this on both axes count as stacked on each other.
const COLLIDE_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clipboard {
    xml: Option<XmlElement>,
    source_xy: Coordinate,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.xml.is_none()
    }

    pub fn contents(&self) -> Option<&XmlElement> {
        self.xml.as_ref()
    }

    /// Copy `id` and everything below it.
    pub fn copy(&mut self, ws: &Workspace, id: BlockId) -> Result<(), EditorError> {
        let block = ws.require(id)?;
        let source_xy = block.xy;
        self.xml = Some(xml::block_to_dom(ws, id, true)?);
        self.source_xy = source_xy;
        log::debug!("copied {id} at {source_xy:?}");
        Ok(())
    }

    /// Create a new top-level copy of the clipboard contents.
    pub fn paste(&self, ws: &mut Workspace) -> Result<BlockId, EditorError> {
        let opened = ws.begin_group();
        let result = self.paste_inner(ws);
        ws.end_group(opened);
        result
    }

    fn paste_inner(&self, ws: &mut Workspace) -> Result<BlockId, EditorError> {
        let dom = self.xml.as_ref().ok_or(EditorError::EmptyClipboard)?;
        let id = xml::dom_to_block(dom, ws)?;
        let step = ws.options().snap_radius;
        let mut xy = self.source_xy;
        while collides(ws, id, xy) {
            xy = xy + Coordinate::new(step, step * 2.0);
        }
        ws.move_to(id, xy)?;
        Ok(id)
    }

    /// Paste and plug the copy into `target`. The copy stays top-level if
    /// none of its connections fit.
    pub fn paste_into(&self, ws: &mut Workspace, target: ConnectionRef) -> Result<BlockId, EditorError> {
        ws.connection(target)
            .ok_or(ConnectionError::UnknownConnection(target))?;
        let opened = ws.begin_group();
        let result = self.paste_inner(ws).and_then(|id| {
            if let Some(own) = compatible_connection(ws, id, target) {
                ws.connect(own, target)?;
            }
            Ok(id)
        });
        ws.end_group(opened);
        result
    }

    /// Copy and paste in one step without touching the clipboard.
    pub fn duplicate(ws: &mut Workspace, id: BlockId) -> Result<BlockId, EditorError> {
        let mut scratch = Clipboard::new();
        scratch.copy(ws, id)?;
        scratch.paste(ws)
    }
}

/// Whether a block outside the pasted subtree already sits at `xy`.
fn collides(ws: &Workspace, pasted: BlockId, xy: Coordinate) -> bool {
    let own: HashSet<BlockId> = ws.descendant_ids(pasted).into_iter().collect();
    ws.all_blocks(false).into_iter().filter(|other| !own.contains(other)).any(|other| {
        ws.block(other).is_some_and(|b| {
            (b.xy.x - xy.x).abs() <= COLLIDE_TOLERANCE && (b.xy.y - xy.y).abs() <= COLLIDE_TOLERANCE
        })
    })
}

/// The first connection on `block` that may join `target`.
fn compatible_connection(ws: &Workspace, block: BlockId, target: ConnectionRef) -> Option<ConnectionRef> {
    let slots = ws.block(block)?.slots();
    slots.into_iter().map(|slot| ConnectionRef::new(block, slot)).find(|&own| {
        let compatible = checker::is_compatible(ws, own, target);
        log::debug!("paste into {target}: {own} compatible = {compatible}");
        compatible
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use brick_core::options::WorkspaceOptions;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn workspace() -> Workspace {
        Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    #[test]
    fn paste_without_copy_fails() {
        let mut ws = workspace();
        assert_eq!(
            Clipboard::new().paste(&mut ws).unwrap_err(),
            EditorError::EmptyClipboard
        );
    }

    #[test]
    fn paste_copies_the_whole_subtree_with_new_ids() {
        let mut ws = workspace();
        let print = ws.new_block("text_print").unwrap();
        let text = ws.new_block("text").unwrap();
        ws.connect(ConnectionRef::output(text), ConnectionRef::input(print, "TEXT"))
            .unwrap();
        ws.set_field_value(text, "TEXT", "hello").unwrap();

        let mut clipboard = Clipboard::new();
        clipboard.copy(&ws, print).unwrap();
        let copy = clipboard.paste(&mut ws).unwrap();

        assert_ne!(copy, print);
        assert_eq!(ws.len(), 4);
        let copied_text = ws.input_target_block(copy, "TEXT").unwrap();
        assert_ne!(copied_text, text);
        assert_eq!(
            ws.block(copied_text).unwrap().field_value("TEXT"),
            Some("hello".to_string())
        );
    }

    #[test]
    fn pastes_step_away_from_each_other() {
        let mut ws = workspace();
        let original = ws.new_block("math_number").unwrap();
        let mut clipboard = Clipboard::new();
        clipboard.copy(&ws, original).unwrap();

        let first = clipboard.paste(&mut ws).unwrap();
        let second = clipboard.paste(&mut ws).unwrap();
        assert_eq!(ws.block(first).unwrap().xy, Coordinate::new(28.0, 56.0));
        assert_eq!(ws.block(second).unwrap().xy, Coordinate::new(56.0, 112.0));
    }

    #[test]
    fn paste_is_one_undo_step() {
        let mut ws = workspace();
        let original = ws.new_block("text_print").unwrap();
        ws.clear_undo();
        Clipboard::duplicate(&mut ws, original).unwrap();
        assert_eq!(ws.len(), 2);
        assert!(ws.undo(false));
        assert_eq!(ws.len(), 1);
        assert!(!ws.can_undo());
    }

    #[test]
    fn paste_into_connects_when_compatible() {
        let mut ws = workspace();
        let source = ws.new_block("logic_boolean").unwrap();
        let negate = ws.new_block("logic_negate").unwrap();
        let mut clipboard = Clipboard::new();
        clipboard.copy(&ws, source).unwrap();

        let target = ConnectionRef::input(negate, "BOOL");
        let pasted = clipboard.paste_into(&mut ws, target).unwrap();
        assert_eq!(ws.input_target_block(negate, "BOOL"), Some(pasted));
    }

    #[test]
    fn paste_into_leaves_incompatible_copies_loose() {
        let mut ws = workspace();
        let source = ws.new_block("text_print").unwrap();
        let negate = ws.new_block("logic_negate").unwrap();
        let mut clipboard = Clipboard::new();
        clipboard.copy(&ws, source).unwrap();

        let pasted = clipboard
            .paste_into(&mut ws, ConnectionRef::input(negate, "BOOL"))
            .unwrap();
        assert_eq!(ws.parent(pasted), None);
        assert_eq!(ws.input_target_block(negate, "BOOL"), None);
    }
}
