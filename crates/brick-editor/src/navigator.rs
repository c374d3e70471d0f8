//! Keyboard navigation over the block tree.
//!
//! The navigator wraps the raw `Node` moves with a per-kind policy table.
//! A node whose policy says "not navigable" is stepped through rather than
//! stopped on, so structural positions stay in the tree but never hold the
//! cursor.

use crate::node::{Node, NodeKind};
use brick_core::workspace::Workspace;
use std::collections::HashMap;

/// Decides whether a node of one kind may hold the cursor.
pub type Policy = fn(&Workspace, &Node) -> bool;

/// Bound on how many skipped nodes one move may step through.
const MAX_SKIP: usize = 4096;

#[derive(Debug, Clone)]
pub struct Navigator {
    policies: HashMap<NodeKind, Policy>,
}

impl Default for Navigator {
    fn default() -> Self {
        let mut policies: HashMap<NodeKind, Policy> = NodeKind::ALL
            .into_iter()
            .map(|kind| (kind, always as Policy))
            .collect();
        policies.insert(NodeKind::Next, free_next);
        Self { policies }
    }
}

fn always(_: &Workspace, _: &Node) -> bool {
    true
}

/// A connected next connection sits on the same spot as the following
/// block's previous connection; only the latter is visited.
fn free_next(ws: &Workspace, node: &Node) -> bool {
    node.connection().is_none_or(|conn| !ws.is_connected(conn))
}

impl Navigator {
    pub fn set_policy(&mut self, kind: NodeKind, policy: Policy) {
        self.policies.insert(kind, policy);
    }

    pub fn is_navigable(&self, ws: &Workspace, node: &Node) -> bool {
        self.policies
            .get(&node.kind())
            .is_none_or(|policy| policy(ws, node))
    }

    /// First navigable node below `node`. A skipped child is searched
    /// inside first, then along its siblings.
    pub fn first_child(&self, ws: &Workspace, node: &Node) -> Option<Node> {
        let mut candidate = node.inside(ws);
        for _ in 0..MAX_SKIP {
            let current = candidate?;
            if self.is_navigable(ws, &current) {
                return Some(current);
            }
            if let Some(found) = self.first_child(ws, &current) {
                return Some(found);
            }
            candidate = current.after(ws);
        }
        None
    }

    /// Nearest navigable ancestor.
    pub fn parent(&self, ws: &Workspace, node: &Node) -> Option<Node> {
        self.walk(ws, node, Node::outside)
    }

    pub fn next_sibling(&self, ws: &Workspace, node: &Node) -> Option<Node> {
        self.walk(ws, node, Node::after)
    }

    pub fn previous_sibling(&self, ws: &Workspace, node: &Node) -> Option<Node> {
        self.walk(ws, node, Node::before)
    }

    fn walk(&self, ws: &Workspace, node: &Node, step: fn(&Node, &Workspace) -> Option<Node>) -> Option<Node> {
        let mut current = step(node, ws)?;
        for _ in 0..MAX_SKIP {
            if self.is_navigable(ws, &current) {
                return Some(current);
            }
            current = step(&current, ws)?;
        }
        log::warn!("navigation from {node} gave up after {MAX_SKIP} skipped nodes");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use brick_core::connection::ConnectionRef;
    use brick_core::id::BlockId;
    use brick_core::options::WorkspaceOptions;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn chain() -> (Workspace, BlockId, BlockId) {
        let mut ws = Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default());
        let first = ws.new_block("text_print").unwrap();
        let second = ws.new_block("text_print").unwrap();
        ws.connect(ConnectionRef::previous(second), ConnectionRef::next(first))
            .unwrap();
        (ws, first, second)
    }

    #[test]
    fn connected_next_is_stepped_over() {
        let (ws, first, second) = chain();
        let nav = Navigator::default();
        assert_eq!(
            nav.next_sibling(&ws, &Node::Block(first)),
            Some(Node::Connection(ConnectionRef::previous(second)))
        );
        assert_eq!(
            nav.previous_sibling(&ws, &Node::Connection(ConnectionRef::previous(second))),
            Some(Node::Block(first))
        );
        // The last next connection is free, so it stops the cursor.
        assert_eq!(
            nav.next_sibling(&ws, &Node::Block(second)),
            Some(Node::Connection(ConnectionRef::next(second)))
        );
    }

    #[test]
    fn hiding_connections_leaves_only_blocks() {
        let (ws, first, second) = chain();
        let mut nav = Navigator::default();
        for kind in [NodeKind::Previous, NodeKind::Next, NodeKind::Output] {
            nav.set_policy(kind, |_, _| false);
        }
        assert_eq!(nav.first_child(&ws, &Node::Stack(first)), Some(Node::Block(first)));
        assert_eq!(nav.next_sibling(&ws, &Node::Block(first)), Some(Node::Block(second)));
        assert_eq!(nav.previous_sibling(&ws, &Node::Block(second)), Some(Node::Block(first)));
        assert_eq!(nav.next_sibling(&ws, &Node::Block(second)), None);
    }

    #[test]
    fn skipped_parents_are_transparent() {
        let (ws, first, second) = chain();
        let mut nav = Navigator::default();
        nav.set_policy(NodeKind::Stack, |_, _| false);
        assert_eq!(nav.parent(&ws, &Node::Block(second)), Some(Node::Workspace));
        assert_eq!(
            nav.first_child(&ws, &Node::Workspace),
            Some(Node::Connection(ConnectionRef::previous(first)))
        );
    }

    #[test]
    fn policies_can_look_at_the_tree() {
        let (mut ws, first, _) = chain();
        ws.set_collapsed(first, true).unwrap();
        let mut nav = Navigator::default();
        nav.set_policy(NodeKind::Block, |ws, node| {
            node.block()
                .and_then(|id| ws.block(id))
                .is_some_and(|b| !b.is_collapsed())
        });
        assert!(!nav.is_navigable(&ws, &Node::Block(first)));
    }
}
