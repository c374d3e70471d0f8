//! Addressable positions in a block tree for keyboard navigation.
//!
//! A `Node` names something a cursor can sit on. The raw moves here
//! (`inside`, `outside`, `after`, `before`) are pure functions of the tree;
//! `Navigator` layers visibility policies on top.
//!
//! Within a stack the order is:
//!
//! ```text
//! Stack ─in─▶ Previous ─▶ Block ─▶ Next ─▶ Previous (next block) ─▶ …
//!                          │
//!                          in
//!                          ▼
//!              Field ─▶ Field ─▶ Input ─▶ Field ─▶ Input
//!                                  │
//!                                  in
//!                                  ▼
//!                         Output ─▶ Block (child)
//! ```

use brick_core::block::Block;
use brick_core::connection::{ConnectionRef, ConnectionSlot};
use brick_core::id::{BlockId, Name};
use brick_core::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    Workspace,
    /// A top-level stack, named by its top block.
    Stack(BlockId),
    Block(BlockId),
    /// An editable field, by input and position within that input's row.
    Field { block: BlockId, input: Name, index: usize },
    /// Any connection: output, previous, next or an input.
    Connection(ConnectionRef),
}

/// Node categories, used as policy table keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Workspace,
    Stack,
    Block,
    Field,
    Input,
    Output,
    Previous,
    Next,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        Self::Workspace,
        Self::Stack,
        Self::Block,
        Self::Field,
        Self::Input,
        Self::Output,
        Self::Previous,
        Self::Next,
    ];
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workspace => f.write_str("workspace"),
            Self::Stack(id) => write!(f, "stack:{id}"),
            Self::Block(id) => write!(f, "block:{id}"),
            Self::Field { block, input, index } => write!(f, "field:{block}.{input}[{index}]"),
            Self::Connection(conn) => write!(f, "{conn}"),
        }
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Workspace => NodeKind::Workspace,
            Self::Stack(_) => NodeKind::Stack,
            Self::Block(_) => NodeKind::Block,
            Self::Field { .. } => NodeKind::Field,
            Self::Connection(conn) => match conn.slot {
                ConnectionSlot::Input(_) => NodeKind::Input,
                ConnectionSlot::Output => NodeKind::Output,
                ConnectionSlot::Previous => NodeKind::Previous,
                ConnectionSlot::Next => NodeKind::Next,
            },
        }
    }

    /// The block this node belongs to; `None` for the workspace.
    pub fn block(&self) -> Option<BlockId> {
        match self {
            Self::Workspace => None,
            Self::Stack(id) | Self::Block(id) => Some(*id),
            Self::Field { block, .. } => Some(*block),
            Self::Connection(conn) => Some(conn.block),
        }
    }

    pub fn connection(&self) -> Option<ConnectionRef> {
        match self {
            Self::Connection(conn) => Some(*conn),
            _ => None,
        }
    }

    /// Whether the node still exists in `ws`.
    pub fn is_valid(&self, ws: &Workspace) -> bool {
        match self {
            Self::Workspace => true,
            Self::Stack(id) => ws.contains(*id) && ws.parent(*id).is_none(),
            Self::Block(id) => ws.contains(*id),
            Self::Field { block, input, index } => ws
                .block(*block)
                .and_then(|b| b.input(input.as_str()))
                .is_some_and(|i| i.fields.get(*index).is_some_and(|f| f.is_editable())),
            Self::Connection(conn) => ws.connection(*conn).is_some(),
        }
    }

    // ─── Raw moves ───────────────────────────────────────────────────────

    /// Step down one level.
    pub fn inside(&self, ws: &Workspace) -> Option<Node> {
        match *self {
            Self::Workspace => ws.top_blocks(true).first().map(|&id| Self::Stack(id)),
            Self::Stack(id) => Some(top_node(ws.block(id)?)),
            Self::Block(id) => block_elements(ws.block(id)?).into_iter().next(),
            Self::Connection(conn) if matches!(conn.slot, ConnectionSlot::Input(_)) => {
                ws.target(conn).map(Self::Connection)
            }
            _ => None,
        }
    }

    /// Step up one level.
    pub fn outside(&self, ws: &Workspace) -> Option<Node> {
        match *self {
            Self::Workspace => None,
            Self::Stack(_) => Some(Self::Workspace),
            Self::Field { block, .. } => Some(Self::Block(block)),
            Self::Connection(conn) if matches!(conn.slot, ConnectionSlot::Input(_)) => {
                Some(Self::Block(conn.block))
            }
            Self::Block(id) | Self::Connection(ConnectionRef { block: id, .. }) => {
                ws.contains(id).then(|| outside_block(ws, id))
            }
        }
    }

    /// Step to the following sibling.
    pub fn after(&self, ws: &Workspace) -> Option<Node> {
        match *self {
            Self::Workspace => None,
            Self::Stack(id) => neighbour_stack(ws, id, 1),
            Self::Block(id) => ws
                .block(id)?
                .next
                .as_ref()
                .map(|_| Self::Connection(ConnectionRef::next(id))),
            Self::Field { block, .. } => element_step(ws, block, *self, 1),
            Self::Connection(conn) => match conn.slot {
                ConnectionSlot::Input(_) => element_step(ws, conn.block, *self, 1),
                ConnectionSlot::Output | ConnectionSlot::Previous => Some(Self::Block(conn.block)),
                ConnectionSlot::Next => ws.target(conn).map(Self::Connection),
            },
        }
    }

    /// Step to the preceding sibling.
    pub fn before(&self, ws: &Workspace) -> Option<Node> {
        match *self {
            Self::Workspace => None,
            Self::Stack(id) => neighbour_stack(ws, id, -1),
            Self::Block(id) => {
                let block = ws.block(id)?;
                block.parent_facing_slot().map(|slot| Self::Connection(ConnectionRef::new(id, slot)))
            }
            Self::Field { block, .. } => element_step(ws, block, *self, -1),
            Self::Connection(conn) => match conn.slot {
                ConnectionSlot::Input(_) => element_step(ws, conn.block, *self, -1),
                ConnectionSlot::Output => None,
                ConnectionSlot::Previous => ws.target(conn).map(Self::Connection),
                ConnectionSlot::Next => Some(Self::Block(conn.block)),
            },
        }
    }
}

/// The first node inside a stack: its top connection, or the block.
fn top_node(block: &Block) -> Node {
    match block.parent_facing_slot() {
        Some(slot) => Node::Connection(ConnectionRef::new(block.id, slot)),
        None => Node::Block(block.id),
    }
}

/// Editable fields and input connections of a block, in reading order.
/// Collapsed blocks and hidden inputs contribute nothing.
fn block_elements(block: &Block) -> Vec<Node> {
    if block.is_collapsed() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for input in block.inputs.iter().filter(|i| i.visible) {
        for (index, field) in input.fields.iter().enumerate() {
            if field.is_editable() {
                out.push(Node::Field {
                    block: block.id,
                    input: input.name,
                    index,
                });
            }
        }
        if input.connection.is_some() {
            out.push(Node::Connection(ConnectionRef::new(
                block.id,
                ConnectionSlot::Input(input.name),
            )));
        }
    }
    out
}

fn element_step(ws: &Workspace, block: BlockId, from: Node, step: isize) -> Option<Node> {
    let elements = block_elements(ws.block(block)?);
    let at = elements.iter().position(|n| *n == from)?;
    let to = at.checked_add_signed(step)?;
    elements.get(to).copied()
}

fn neighbour_stack(ws: &Workspace, id: BlockId, step: isize) -> Option<Node> {
    let tops = ws.top_blocks(true);
    let at = tops.iter().position(|&t| t == id)?;
    let to = at.checked_add_signed(step)?;
    tops.get(to).map(|&t| Node::Stack(t))
}

/// Leaving a block lands on the input holding its statement run, or on
/// the stack when the run is top-level.
fn outside_block(ws: &Workspace, id: BlockId) -> Node {
    let mut top = id;
    while let Some(prev) = ws.previous_block(top) {
        top = prev;
    }
    match ws.parent_link(top) {
        Some((parent, link)) => Node::Connection(ConnectionRef::new(parent, link.parent_slot)),
        None => Node::Stack(top),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use brick_core::coordinate::Coordinate;
    use brick_core::options::WorkspaceOptions;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn workspace() -> Workspace {
        Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    /// Two printed statements, the first with a text child.
    fn program(ws: &mut Workspace) -> (BlockId, BlockId, BlockId) {
        let first = ws.new_block("text_print").unwrap();
        let second = ws.new_block("text_print").unwrap();
        let text = ws.new_block("text").unwrap();
        ws.connect(ConnectionRef::previous(second), ConnectionRef::next(first))
            .unwrap();
        ws.connect(ConnectionRef::output(text), ConnectionRef::input(first, "TEXT"))
            .unwrap();
        (first, second, text)
    }

    #[test]
    fn stack_order_runs_through_connections() {
        let mut ws = workspace();
        let (first, second, _) = program(&mut ws);

        let stack = Node::Workspace.inside(&ws).unwrap();
        assert_eq!(stack, Node::Stack(first));
        let prev = stack.inside(&ws).unwrap();
        assert_eq!(prev, Node::Connection(ConnectionRef::previous(first)));
        let block = prev.after(&ws).unwrap();
        assert_eq!(block, Node::Block(first));
        let next = block.after(&ws).unwrap();
        assert_eq!(next, Node::Connection(ConnectionRef::next(first)));
        assert_eq!(
            next.after(&ws),
            Some(Node::Connection(ConnectionRef::previous(second)))
        );
        assert_eq!(
            Node::Connection(ConnectionRef::previous(second)).before(&ws),
            Some(next)
        );
    }

    #[test]
    fn inputs_lead_into_child_blocks() {
        let mut ws = workspace();
        let (first, _, text) = program(&mut ws);

        let input = Node::Block(first).inside(&ws).unwrap();
        assert_eq!(input, Node::Connection(ConnectionRef::input(first, "TEXT")));
        let output = input.inside(&ws).unwrap();
        assert_eq!(output, Node::Connection(ConnectionRef::output(text)));
        assert_eq!(output.after(&ws), Some(Node::Block(text)));
        assert_eq!(output.outside(&ws), Some(input));
        assert_eq!(input.outside(&ws), Some(Node::Block(first)));

        let field = Node::Block(text).inside(&ws).unwrap();
        assert_eq!(field.kind(), NodeKind::Field);
        assert_eq!(field.after(&ws), None);
    }

    #[test]
    fn leaving_a_statement_run_goes_to_its_stack() {
        let mut ws = workspace();
        let (first, second, _) = program(&mut ws);
        assert_eq!(Node::Block(second).outside(&ws), Some(Node::Stack(first)));
        assert_eq!(Node::Stack(first).outside(&ws), Some(Node::Workspace));
        assert_eq!(Node::Workspace.outside(&ws), None);
    }

    #[test]
    fn leaving_a_nested_run_goes_to_the_statement_input() {
        let mut ws = workspace();
        let repeat = ws.new_block("controls_repeat_ext").unwrap();
        let a = ws.new_block("text_print").unwrap();
        let b = ws.new_block("text_print").unwrap();
        ws.connect(ConnectionRef::previous(a), ConnectionRef::input(repeat, "DO"))
            .unwrap();
        ws.connect(ConnectionRef::previous(b), ConnectionRef::next(a)).unwrap();
        assert_eq!(
            Node::Block(b).outside(&ws),
            Some(Node::Connection(ConnectionRef::input(repeat, "DO")))
        );
    }

    #[test]
    fn stacks_are_siblings_in_position_order() {
        let mut ws = workspace();
        let low = ws.new_block("math_number").unwrap();
        let high = ws.new_block("math_number").unwrap();
        ws.move_to(low, Coordinate::new(0.0, 100.0)).unwrap();
        assert_eq!(Node::Stack(high).after(&ws), Some(Node::Stack(low)));
        assert_eq!(Node::Stack(high).before(&ws), None);
        assert_eq!(Node::Stack(low).before(&ws), Some(Node::Stack(high)));
    }

    #[test]
    fn collapsed_blocks_have_no_inside() {
        let mut ws = workspace();
        let (first, _, _) = program(&mut ws);
        ws.set_collapsed(first, true).unwrap();
        assert_eq!(Node::Block(first).inside(&ws), None);
    }

    #[test]
    fn deleted_blocks_invalidate_nodes() {
        let mut ws = workspace();
        let (first, second, _) = program(&mut ws);
        let node = Node::Block(second);
        assert!(node.is_valid(&ws));
        assert!(!Node::Stack(second).is_valid(&ws));
        ws.dispose_block(first, false).unwrap();
        assert!(!node.is_valid(&ws));
    }
}
