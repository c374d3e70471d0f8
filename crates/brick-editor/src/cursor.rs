//! Keyboard cursor and marker.
//!
//! A marker is a remembered node. A cursor is a marker that moves through
//! the tree with a `Navigator`. Neither owns or mutates blocks; a node
//! whose block is gone is simply invalid.

use crate::navigator::Navigator;
use crate::node::Node;
use brick_core::workspace::Workspace;
use std::fmt;

/// Called with `(old, new)` whenever a marker changes position.
pub type MarkerListener = Box<dyn FnMut(Option<&Node>, Option<&Node>)>;

#[derive(Default)]
pub struct Marker {
    node: Option<Node>,
    listener: Option<MarkerListener>,
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marker")
            .field("node", &self.node)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl Marker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    pub fn set_listener(&mut self, listener: MarkerListener) {
        self.listener = Some(listener);
    }

    /// Move the marker. The listener only hears about real changes.
    pub fn set_node(&mut self, node: Option<Node>) {
        if self.node == node {
            return;
        }
        let old = std::mem::replace(&mut self.node, node);
        log::trace!("marker {old:?} -> {:?}", self.node);
        if let Some(listener) = &mut self.listener {
            listener(old.as_ref(), self.node.as_ref());
        }
    }

    /// Drop the position if its block no longer exists.
    pub fn revalidate(&mut self, ws: &Workspace) {
        if self.node.is_some_and(|n| !n.is_valid(ws)) {
            self.set_node(None);
        }
    }
}

#[derive(Debug, Default)]
pub struct Cursor {
    marker: Marker,
    navigator: Navigator,
}

impl Cursor {
    pub fn new(navigator: Navigator) -> Self {
        Self {
            marker: Marker::new(),
            navigator,
        }
    }

    pub fn node(&self) -> Option<&Node> {
        self.marker.node()
    }

    pub fn set_node(&mut self, node: Option<Node>) {
        self.marker.set_node(node);
    }

    pub fn set_listener(&mut self, listener: MarkerListener) {
        self.marker.set_listener(listener);
    }

    pub fn revalidate(&mut self, ws: &Workspace) {
        self.marker.revalidate(ws);
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }

    /// Step into the current node. From nowhere, enter the workspace.
    pub fn move_in(&mut self, ws: &Workspace) -> Option<Node> {
        self.step(ws, Navigator::first_child)
    }

    pub fn move_out(&mut self, ws: &Workspace) -> Option<Node> {
        self.step(ws, Navigator::parent)
    }

    pub fn move_next(&mut self, ws: &Workspace) -> Option<Node> {
        self.step(ws, Navigator::next_sibling)
    }

    pub fn move_prev(&mut self, ws: &Workspace) -> Option<Node> {
        self.step(ws, Navigator::previous_sibling)
    }

    /// Apply one navigator move. A failed move leaves the cursor where it
    /// was; a stale cursor restarts from the workspace.
    fn step(
        &mut self,
        ws: &Workspace,
        mv: fn(&Navigator, &Workspace, &Node) -> Option<Node>,
    ) -> Option<Node> {
        self.marker.revalidate(ws);
        let from = self.marker.node().copied().unwrap_or(Node::Workspace);
        let to = match mv(&self.navigator, ws, &from) {
            Some(to) => to,
            None if self.marker.node().is_none() => {
                self.navigator.first_child(ws, &Node::Workspace)?
            }
            None => return None,
        };
        self.marker.set_node(Some(to));
        Some(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use brick_core::connection::ConnectionRef;
    use brick_core::options::WorkspaceOptions;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn workspace() -> Workspace {
        Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    #[test]
    fn listener_hears_only_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut marker = Marker::new();
        marker.set_listener(Box::new(move |old: Option<&Node>, new: Option<&Node>| {
            log.borrow_mut().push((old.copied(), new.copied()));
        }));
        marker.set_node(Some(Node::Workspace));
        marker.set_node(Some(Node::Workspace));
        marker.set_node(None);
        assert_eq!(
            *seen.borrow(),
            vec![(None, Some(Node::Workspace)), (Some(Node::Workspace), None)]
        );
    }

    #[test]
    fn cursor_walks_a_stack() {
        let mut ws = workspace();
        let block = ws.new_block("text_print").unwrap();
        let mut cursor = Cursor::default();

        assert_eq!(cursor.move_in(&ws), Some(Node::Stack(block)));
        assert_eq!(
            cursor.move_in(&ws),
            Some(Node::Connection(ConnectionRef::previous(block)))
        );
        assert_eq!(cursor.move_next(&ws), Some(Node::Block(block)));
        assert_eq!(
            cursor.move_in(&ws),
            Some(Node::Connection(ConnectionRef::input(block, "TEXT")))
        );
        assert_eq!(cursor.move_out(&ws), Some(Node::Block(block)));
        assert_eq!(cursor.move_out(&ws), Some(Node::Stack(block)));
    }

    #[test]
    fn failed_moves_stay_put() {
        let mut ws = workspace();
        let block = ws.new_block("math_number").unwrap();
        let mut cursor = Cursor::default();
        cursor.set_node(Some(Node::Stack(block)));
        assert_eq!(cursor.move_next(&ws), None);
        assert_eq!(cursor.node(), Some(&Node::Stack(block)));
    }

    #[test]
    fn stale_cursor_restarts_from_the_workspace() {
        let mut ws = workspace();
        let gone = ws.new_block("math_number").unwrap();
        let kept = ws.new_block("math_number").unwrap();
        let mut cursor = Cursor::default();
        cursor.set_node(Some(Node::Block(gone)));
        ws.dispose_block(gone, false).unwrap();
        assert_eq!(cursor.move_next(&ws), Some(Node::Stack(kept)));
    }

    #[test]
    fn moving_never_edits_blocks() {
        let mut ws = workspace();
        ws.new_block("text_print").unwrap();
        ws.clear_undo();
        let mut cursor = Cursor::default();
        while cursor.move_in(&ws).is_some() {}
        assert!(!ws.can_undo());
    }
}
