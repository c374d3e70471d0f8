//! Renderer: measure, draw, and position blocks bottom-up.
//!
//! Children are rendered before their parents so a parent can reserve
//! their measured size. After drawing, each block's connection offsets are
//! written back into the workspace. A second, top-down pass then places
//! every connected child at the absolute position that puts its
//! parent-facing connection on the parent's connection, so rendering an
//! unchanged tree again leaves every coordinate bit-for-bit the same.
//!
//! Results are cached per block. `render_block` re-renders one subtree and
//! then re-measures only the ancestors above it.

use crate::colourer::{Colourer, Paint};
use crate::constants::ConstantProvider;
use crate::drawer::{self, Drawing};
use crate::error::RenderError;
use crate::info::RenderInfo;
use brick_core::connection::ConnectionRef;
use brick_core::id::BlockId;
use brick_core::workspace::Workspace;
use kurbo::{Rect, Size};
use std::collections::HashMap;

/// Cached output for one block.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBlock {
    pub info: RenderInfo,
    pub drawing: Drawing,
    pub colourer: Colourer,
    pub paint: Paint,
    /// The block plus everything chained below it.
    pub stack_size: Size,
    pub disabled: bool,
}

#[derive(Debug, Default)]
pub struct Renderer {
    constants: ConstantProvider,
    cache: HashMap<BlockId, RenderedBlock>,
}

impl Renderer {
    pub fn new(constants: ConstantProvider) -> Self {
        Self {
            constants,
            cache: HashMap::new(),
        }
    }

    pub fn constants(&self) -> &ConstantProvider {
        &self.constants
    }

    pub fn rendered(&self, id: BlockId) -> Option<&RenderedBlock> {
        self.cache.get(&id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Render every top block and drop cache entries for deleted blocks.
    pub fn render_all(&mut self, ws: &mut Workspace) -> Result<(), RenderError> {
        self.cache.retain(|cached, _| ws.contains(*cached));
        for top in ws.top_blocks(false) {
            self.render_subtree(ws, top)?;
            self.place_subtree(ws, top)?;
        }
        log::debug!("rendered {} blocks", self.cache.len());
        Ok(())
    }

    /// Re-render `id` and its descendants, then walk up re-measuring each
    /// ancestor so sizes and child positions stay consistent.
    pub fn render_block(&mut self, ws: &mut Workspace, id: BlockId) -> Result<(), RenderError> {
        self.cache.retain(|cached, _| ws.contains(*cached));
        self.render_subtree(ws, id)?;
        let mut current = id;
        while let Some(parent) = ws.parent(current) {
            self.render_one(ws, parent)?;
            current = parent;
        }
        self.place_subtree(ws, current)
    }

    /// Post-order walk: every block after all of its descendants.
    fn render_subtree(&mut self, ws: &mut Workspace, id: BlockId) -> Result<(), RenderError> {
        let order = ws.descendant_ids(id);
        for block in order.into_iter().rev() {
            self.render_one(ws, block)?;
        }
        Ok(())
    }

    fn render_one(&mut self, ws: &mut Workspace, id: BlockId) -> Result<(), RenderError> {
        let cache = &self.cache;
        let sizes = |child: BlockId| cache.get(&child).map(|r| r.stack_size);
        let info = RenderInfo::measure(ws, id, &self.constants, &sizes)?;
        let drawing = drawer::draw(&info, &self.constants);

        for (slot, offset) in &drawing.connections {
            ws.set_connection_offset(ConnectionRef::new(id, *slot), *offset);
        }

        let block = ws.require(id)?;
        let colourer = Colourer::for_block(&ws.options().theme, block)?;
        let paint = colourer.apply(block.is_shadow);
        let mut stack_size = Size::new(info.width_with_children, info.height);
        if let Some(next) = ws.next_block(id) {
            let below = self
                .cache
                .get(&next)
                .map(|r| r.stack_size)
                .ok_or(RenderError::ChildNotRendered(id, next))?;
            stack_size.width = stack_size.width.max(below.width);
            stack_size.height += below.height - self.constants.notch_height;
        }

        log::trace!("rendered {id} at {:?}, stack {stack_size:?}", block.xy);
        let rendered = RenderedBlock {
            info,
            drawing,
            colourer,
            paint,
            stack_size,
            disabled: ws.is_inherited_disabled(id),
        };
        self.cache.insert(id, rendered);
        Ok(())
    }

    /// Pre-order walk: place each block below `root` so its parent-facing
    /// connection sits on the parent's. Parents are placed before their
    /// children, so every anchor is already final when it is read.
    fn place_subtree(&self, ws: &mut Workspace, root: BlockId) -> Result<(), RenderError> {
        for child in ws.descendant_ids(root).into_iter().skip(1) {
            let Some((parent, link)) = ws.parent_link(child) else {
                continue;
            };
            let Some(anchor) = ws.connection_position(ConnectionRef::new(parent, link.parent_slot))
            else {
                continue;
            };
            let Some(plug) = ws.require(child)?.connection(link.child_slot) else {
                continue;
            };
            ws.set_block_xy(child, anchor - plug.offset);
        }
        Ok(())
    }

    /// A rendered block's outline bounds in workspace coordinates.
    pub fn block_bounds(&self, ws: &Workspace, id: BlockId) -> Option<Rect> {
        let rendered = self.cache.get(&id)?;
        let xy = ws.block(id)?.xy;
        let size = Size::new(rendered.info.width, rendered.info.height);
        Some(Rect::from_origin_size((xy.x, xy.y), size))
    }

    /// The block, its children, and everything chained below it.
    pub fn stack_bounds(&self, ws: &Workspace, id: BlockId) -> Option<Rect> {
        let rendered = self.cache.get(&id)?;
        let xy = ws.block(id)?.xy;
        Some(Rect::from_origin_size((xy.x, xy.y), rendered.stack_size))
    }

    /// Union of every top stack's bounds.
    pub fn workspace_bounds(&self, ws: &Workspace) -> Option<Rect> {
        ws.top_blocks(false)
            .into_iter()
            .filter_map(|id| self.stack_bounds(ws, id))
            .reduce(|a, b| a.union(b))
    }
}

/// Blocks of one stack that are actually painted, parents before children.
/// Blocks plugged into a collapsed block's inputs are hidden; its next
/// block is not.
pub fn painted_blocks(ws: &Workspace, top: BlockId) -> Vec<BlockId> {
    let mut out = Vec::new();
    let mut stack = vec![top];
    while let Some(id) = stack.pop() {
        let Some(block) = ws.block(id) else {
            continue;
        };
        out.push(id);
        let mut children = if block.is_collapsed() {
            ws.next_block(id).into_iter().collect()
        } else {
            ws.children(id)
        };
        children.reverse();
        stack.extend(children);
    }
    out
}
