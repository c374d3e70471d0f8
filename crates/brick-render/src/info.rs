//! RenderInfo: the measured layout of one block.
//!
//! Measuring is a pure function of the block, its constants, and the sizes
//! of the blocks plugged into it. Connected children are never re-walked:
//! the caller hands in their already-measured stack sizes and each one
//! becomes a fixed-size element of the parent's row.
//!
//! The passes run in order: create rows, add in-row spacing, compute
//! bounds, align rows, add between-row spacing, finalize positions.

use crate::constants::ConstantProvider;
use crate::error::RenderError;
use crate::measurables::{ElemKind, FieldInfo, InputInfo, Measurable, Row, RowKind, Side};
use brick_core::block::{Align, Block, Input, InputKind};
use brick_core::field::{Field, FieldKind};
use brick_core::id::BlockId;
use brick_core::workspace::Workspace;
use kurbo::Size;

/// Layout of one block, relative to its own origin.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderInfo {
    pub block: BlockId,
    /// Top row first, bottom row last, spacer rows in between.
    pub rows: Vec<Row>,
    pub output: Option<Measurable>,
    /// Left edge of the body; non-zero when an output tab sticks out.
    pub start_x: f64,
    /// Top edge of the body; non-zero under a hat.
    pub start_y: f64,
    pub width: f64,
    pub height: f64,
    /// Width including value blocks hanging off the right edge.
    pub width_with_children: f64,
    pub statement_edge: f64,
    pub is_inline: bool,
    pub is_collapsed: bool,
    pub is_shadow: bool,
}

impl RenderInfo {
    /// Measure `id`. `stack_size` returns the size of an already-measured
    /// child together with the blocks chained below it.
    pub fn measure(
        ws: &Workspace,
        id: BlockId,
        constants: &ConstantProvider,
        stack_size: &dyn Fn(BlockId) -> Option<Size>,
    ) -> Result<Self, RenderError> {
        let block = ws.require(id)?;
        let mut measurer = Measurer {
            ws,
            block,
            c: constants,
            stack_size,
            info: RenderInfo {
                block: id,
                rows: Vec::new(),
                output: None,
                start_x: 0.0,
                start_y: 0.0,
                width: 0.0,
                height: 0.0,
                width_with_children: 0.0,
                statement_edge: 0.0,
                is_inline: block.is_inline(),
                is_collapsed: block.is_collapsed(),
                is_shadow: block.is_shadow,
            },
        };
        measurer.create_rows()?;
        measurer.add_elem_spacing();
        measurer.compute_bounds();
        measurer.align_row_elements();
        measurer.add_row_spacing();
        measurer.finalize();
        log::trace!(
            "measured {id}: {}x{} in {} rows",
            measurer.info.width,
            measurer.info.height,
            measurer.info.rows.len()
        );
        Ok(measurer.info)
    }

    pub fn top_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn bottom_row(&self) -> Option<&Row> {
        self.rows.last()
    }

    /// Every measurable in row order.
    pub fn elements(&self) -> impl Iterator<Item = (&Row, &Measurable)> {
        self.rows
            .iter()
            .flat_map(|row| row.elements.iter().map(move |elem| (row, elem)))
    }
}

struct Measurer<'a> {
    ws: &'a Workspace,
    block: &'a Block,
    c: &'a ConstantProvider,
    stack_size: &'a dyn Fn(BlockId) -> Option<Size>,
    info: RenderInfo,
}

impl Measurer<'_> {
    // ─── Rows ────────────────────────────────────────────────────────────

    fn create_rows(&mut self) -> Result<(), RenderError> {
        if self.block.output.is_some() {
            let mut output = Measurable::new(
                ElemKind::OutputConnection,
                self.c.tab_width,
                self.c.tab_height,
            );
            output.connection_offset_y = self.c.tab_offset_from_top;
            output.connection_width = self.c.tab_width;
            output.connection_height = self.c.tab_height;
            self.info.output = Some(output);
        }

        let top = self.top_row();
        self.info.rows.push(top);

        let mut active = Row::new(RowKind::Input);
        if self.info.is_collapsed {
            let text = collapsed_text(self.ws, self.block.id, self.c.collapsed_text_length);
            active.elements.push(self.label(text));
            active.elements.push(Measurable::new(
                ElemKind::JaggedEdge,
                self.c.jagged_teeth_width,
                self.c.jagged_teeth_height,
            ));
            active.has_jagged_edge = true;
        } else {
            if self.block.comment.is_some() {
                active
                    .elements
                    .push(Measurable::new(ElemKind::Icon, self.c.icon_size, self.c.icon_size));
            }
            let mut last: Option<&Input> = None;
            for input in self.block.inputs.iter().filter(|i| i.visible) {
                if self.should_start_new_row(input, last) {
                    let done = std::mem::replace(&mut active, Row::new(RowKind::Input));
                    self.info.rows.push(done);
                }
                for field in &input.fields {
                    let elem = self.field(field);
                    active.elements.push(elem);
                }
                self.add_input(input, &mut active)?;
                last = Some(input);
            }
        }
        if !active.elements.is_empty() || active.has_dummy_input {
            self.info.rows.push(active);
        }
        if self.info.rows.len() == 1 {
            // No inputs at all: keep the block from collapsing to a sliver.
            let mut empty = Row::new(RowKind::Input);
            empty.min_height = self.c.empty_block_spacer_height;
            self.info.rows.push(empty);
        }

        let bottom = self.bottom_row();
        self.info.rows.push(bottom);
        Ok(())
    }

    fn has_hat(&self) -> bool {
        self.block.hat && self.block.output.is_none() && self.block.previous.is_none()
    }

    fn top_row(&self) -> Row {
        let mut row = Row::new(RowKind::Top);
        let has_hat = self.has_hat();
        let square = self.block.output.is_some()
            || has_hat
            || self.ws.previous_block(self.block.id).is_some();
        row.elements.push(self.corner(square, Side::Left));

        if has_hat {
            let hat = self.c.shapes().start_hat;
            row.elements
                .push(Measurable::new(ElemKind::Hat, hat.width, hat.height));
        } else if self.block.previous.is_some() {
            row.elements.push(self.notch_connection(ElemKind::PreviousConnection));
        }

        let precedes_statement = self
            .block
            .inputs
            .first()
            .is_some_and(|i| i.kind == InputKind::Statement);
        row.min_height = if precedes_statement && !self.info.is_collapsed {
            self.c.large_padding
        } else {
            self.c.medium_padding
        };
        row
    }

    fn bottom_row(&self) -> Row {
        let mut row = Row::new(RowKind::Bottom);
        let follows_statement = self
            .block
            .inputs
            .last()
            .is_some_and(|i| i.kind == InputKind::Statement);
        row.min_height = if follows_statement && !self.info.is_collapsed {
            self.c.large_padding
        } else {
            self.c.medium_padding - 1.0
        };
        let square =
            self.block.output.is_some() || self.ws.next_block(self.block.id).is_some();
        row.elements.push(self.corner(square, Side::Left));
        if self.block.next.is_some() {
            row.elements.push(self.notch_connection(ElemKind::NextConnection));
        }
        row
    }

    fn corner(&self, square: bool, side: Side) -> Measurable {
        if square {
            Measurable::new(ElemKind::SquareCorner(side), self.c.no_padding, self.c.notch_height)
        } else {
            Measurable::new(
                ElemKind::RoundCorner(side),
                self.c.corner_radius,
                self.c.corner_radius / 2.0,
            )
        }
    }

    fn notch_connection(&self, kind: ElemKind) -> Measurable {
        let mut elem = Measurable::new(kind, self.c.notch_width, self.c.notch_height);
        elem.notch_offset = self.c.notch_offset_left;
        elem
    }

    fn should_start_new_row(&self, input: &Input, last: Option<&Input>) -> bool {
        let Some(last) = last else {
            return false;
        };
        if input.kind == InputKind::Statement || last.kind == InputKind::Statement {
            return true;
        }
        !self.info.is_inline
    }

    fn add_input(&self, input: &Input, row: &mut Row) -> Result<(), RenderError> {
        let info = || -> Result<InputInfo, RenderError> {
            let connected = self.ws.input_target_block(self.block.id, input.name.as_str());
            let size = match connected {
                Some(child) => (self.stack_size)(child)
                    .ok_or(RenderError::ChildNotRendered(self.block.id, child))?,
                None => Size::ZERO,
            };
            Ok(InputInfo {
                name: input.name,
                connected,
                connected_width: size.width,
                connected_height: size.height,
            })
        };
        match input.kind {
            InputKind::Value if self.info.is_inline => {
                let info = info()?;
                let (width, height) = match info.connected {
                    Some(_) => (info.connected_width, info.connected_height),
                    None => (
                        self.c.tab_width + self.c.empty_inline_input_padding,
                        self.c.empty_inline_input_height,
                    ),
                };
                let mut elem = Measurable::new(ElemKind::InlineInput(info), width, height);
                self.tab_geometry(&mut elem);
                row.elements.push(elem);
                row.has_inline_input = true;
            }
            InputKind::Value => {
                let info = info()?;
                let height = match info.connected {
                    Some(_) => {
                        info.connected_height - self.c.tab_offset_from_top - self.c.medium_padding
                    }
                    None => self.c.tab_height,
                };
                let width = self.c.tab_width + self.c.external_value_input_padding;
                let mut elem = Measurable::new(ElemKind::ExternalValueInput(info), width, height);
                self.tab_geometry(&mut elem);
                row.elements.push(elem);
                row.has_external_input = true;
            }
            InputKind::Statement => {
                let info = info()?;
                let height = match info.connected {
                    Some(_) => info.connected_height + self.c.statement_bottom_spacer,
                    None => self.c.empty_statement_input_height,
                };
                let width = self.c.notch_offset_left + self.c.notch_width;
                let mut elem = Measurable::new(ElemKind::StatementInput(info), width, height);
                elem.notch_offset = self.c.notch_offset_left;
                row.elements.push(elem);
                row.has_statement = true;
            }
            InputKind::Dummy => {
                row.min_height = row.min_height.max(self.c.dummy_input_min_height);
                row.has_dummy_input = true;
            }
        }
        row.align = input.align;
        Ok(())
    }

    fn tab_geometry(&self, elem: &mut Measurable) {
        elem.connection_offset_y = self.c.tab_offset_from_top;
        elem.connection_width = self.c.tab_width;
        elem.connection_height = self.c.tab_height;
    }

    fn label(&self, text: String) -> Measurable {
        let width = self.c.text_width(&text);
        Measurable::new(
            ElemKind::Field(FieldInfo {
                name: None,
                text,
                editable: false,
            }),
            width,
            self.c.field_text_height,
        )
    }

    fn field(&self, field: &Field) -> Measurable {
        let text = field_text(self.ws, field);
        let border = 2.0 * self.c.field_border_rect_x_padding;
        let (width, height) = match &field.kind {
            FieldKind::Label { .. } => (self.c.text_width(&text), self.c.field_text_height),
            FieldKind::Checkbox { .. } => (self.c.field_checkbox_size, self.c.field_checkbox_size),
            FieldKind::Image { width, height, .. } => (*width, *height),
            FieldKind::Colour { .. } => (
                self.c.field_border_rect_height + border,
                self.c.field_border_rect_height,
            ),
            FieldKind::Dropdown { .. } | FieldKind::Variable { .. } => (
                self.c.text_width(&text) + border + self.c.field_dropdown_arrow_width,
                self.c.field_border_rect_height,
            ),
            FieldKind::TextInput { .. } | FieldKind::Number { .. } | FieldKind::Angle { .. } => (
                self.c.text_width(&text) + border,
                self.c.field_border_rect_height,
            ),
        };
        Measurable::new(
            ElemKind::Field(FieldInfo {
                name: field.name,
                text,
                editable: field.is_editable(),
            }),
            width,
            height,
        )
    }

    // ─── Spacing ─────────────────────────────────────────────────────────

    fn add_elem_spacing(&mut self) {
        for row in &mut self.info.rows {
            if row.kind == RowKind::Spacer {
                continue;
            }
            let old = std::mem::take(&mut row.elements);
            if old.is_empty() {
                row.elements.push(Measurable::spacer(self.c.no_padding));
                continue;
            }
            if row.starts_with_elem_spacer() {
                row.elements
                    .push(Measurable::spacer(in_row_spacing(self.c, None, old.first())));
            }
            for pair in old.windows(2) {
                row.elements.push(pair[0].clone());
                row.elements
                    .push(Measurable::spacer(in_row_spacing(self.c, Some(&pair[0]), Some(&pair[1]))));
            }
            let last = old[old.len() - 1].clone();
            let end = in_row_spacing(self.c, Some(&last), None);
            row.elements.push(last);
            if row.ends_with_elem_spacer() {
                row.elements.push(Measurable::spacer(end));
            }
        }
    }

    // ─── Bounds and alignment ────────────────────────────────────────────

    fn compute_bounds(&mut self) {
        let mut widest_statement_fields: f64 = 0.0;
        let mut block_width: f64 = 0.0;
        let mut widest_with_children: f64 = 0.0;
        for row in &mut self.info.rows {
            row.measure();
            block_width = block_width.max(row.width);
            if row.has_statement {
                let input_width = row.last_input().map_or(0.0, |i| i.width);
                widest_statement_fields = widest_statement_fields.max(row.width - input_width);
            }
            widest_with_children = widest_with_children.max(row.width_with_connected_blocks);
        }

        self.info.statement_edge = widest_statement_fields;
        self.info.width = block_width.max(self.c.min_block_width);
        for row in self.info.rows.iter_mut().filter(|r| r.has_statement) {
            row.statement_edge = widest_statement_fields;
        }
        self.info.width_with_children = self.info.width.max(widest_with_children);

        if let Some(output) = &self.info.output {
            self.info.start_x = output.width;
            self.info.width += output.width;
            self.info.width_with_children += output.width;
        }
    }

    fn align_row_elements(&mut self) {
        let body_width = self.info.width - self.info.start_x;
        let statement_edge = self.info.statement_edge;
        for row in &mut self.info.rows {
            if row.has_statement {
                align_statement_row(row, statement_edge, body_width);
            } else {
                let missing = body_width - row.width;
                if missing != 0.0 {
                    add_alignment_padding(row, missing);
                }
            }
        }
    }

    fn add_row_spacing(&mut self) {
        let old = std::mem::take(&mut self.info.rows);
        let width = self.info.width - self.info.start_x;
        let count = old.len();
        for (i, row) in old.into_iter().enumerate() {
            let follows_statement = row.has_statement;
            self.info.rows.push(row);
            if i + 1 != count {
                let mut spacer = Row::spacer(width, self.c.medium_padding);
                spacer.follows_statement = follows_statement;
                self.info.rows.push(spacer);
            }
        }
    }

    // ─── Positions ───────────────────────────────────────────────────────

    fn finalize(&mut self) {
        let total: f64 = self.info.rows.iter().map(|r| r.height).sum();
        if total < self.c.min_block_height {
            if let Some(bottom) = self.info.rows.last_mut() {
                bottom.height += self.c.min_block_height - total;
            }
        }

        let mut widest_with_children: f64 = 0.0;
        let mut y = 0.0;
        for row in &mut self.info.rows {
            row.y = y;
            row.x = self.info.start_x;
            y += row.height;
            widest_with_children = widest_with_children.max(row.width_with_connected_blocks);
            record_elem_positions(row);
        }

        self.info.width_with_children = widest_with_children + self.info.start_x;
        self.info.height = y;
        self.info.start_y = self.info.rows.first().map_or(0.0, |top| top.ascender);
        if let Some(bottom) = self.info.rows.last_mut() {
            bottom.baseline = y - bottom.descender;
        }
    }
}

/// Horizontal gap between two neighbours in a row; `None` is a row end.
fn in_row_spacing(c: &ConstantProvider, prev: Option<&Measurable>, next: Option<&Measurable>) -> f64 {
    if let (Some(prev), None) = (prev, next) {
        match prev.kind {
            ElemKind::ExternalValueInput(_) | ElemKind::StatementInput(_) => return c.no_padding,
            ElemKind::InlineInput(_) => return c.large_padding,
            _ => {}
        }
    }
    if let (Some(prev), Some(next)) = (prev, next) {
        if next.is_notch_connection() {
            match prev.kind {
                ElemKind::SquareCorner(Side::Left) => return next.notch_offset,
                ElemKind::RoundCorner(Side::Left) => return next.notch_offset - c.corner_radius,
                _ => {}
            }
        }
    }
    c.medium_padding
}

/// Grow a row by `missing`, spending it on the spacer its alignment calls for.
fn add_alignment_padding(row: &mut Row, missing: f64) {
    let align = if row.kind == RowKind::Input {
        row.align
    } else {
        Align::Left
    };
    let spacers: Vec<usize> = row
        .elements
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_spacer())
        .map(|(i, _)| i)
        .collect();
    let (Some(&first), Some(&last)) = (spacers.first(), spacers.last()) else {
        return;
    };
    match align {
        Align::Right if first != last => row.elements[first].width += missing,
        Align::Centre if first != last => {
            row.elements[first].width += missing / 2.0;
            row.elements[last].width += missing / 2.0;
        }
        _ => row.elements[last].width += missing,
    }
    row.width += missing;
}

fn align_statement_row(row: &mut Row, statement_edge: f64, body_width: f64) {
    let input_width = row.last_input().map_or(0.0, |i| i.width);
    let missing = statement_edge - (row.width - input_width);
    if missing != 0.0 {
        add_alignment_padding(row, missing);
    }
    // The mouth reaches to the right edge of the block.
    let stretch = body_width - row.width;
    if let Some(input) = row.last_input_mut() {
        input.width += stretch;
    }
    row.width += stretch;
    row.width_with_connected_blocks = row
        .width
        .max(statement_edge + row.connected_block_widths);
}

fn record_elem_positions(row: &mut Row) {
    let mut x = row.x;
    let (row_y, row_height, ascender, descender, kind) =
        (row.y, row.height, row.ascender, row.descender, row.kind);
    for elem in &mut row.elements {
        if elem.is_spacer() {
            elem.height = row_height;
        }
        elem.x = x;
        elem.centerline = match kind {
            _ if elem.is_spacer() => row_y + elem.height / 2.0,
            RowKind::Bottom => {
                let baseline = row_y + row_height - descender;
                if matches!(elem.kind, ElemKind::NextConnection) {
                    baseline + elem.height / 2.0
                } else {
                    baseline - elem.height / 2.0
                }
            }
            RowKind::Top => {
                let capline = row_y + ascender;
                if matches!(elem.kind, ElemKind::Hat) {
                    capline - elem.height / 2.0
                } else {
                    capline + elem.height / 2.0
                }
            }
            _ => row_y + row_height / 2.0,
        };
        x += elem.width;
    }
}

/// Display text for a field; variable fields show the variable's name.
pub fn field_text(ws: &Workspace, field: &Field) -> String {
    match &field.kind {
        FieldKind::Variable {
            variable: Some(id), ..
        } => ws
            .variable(*id)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| field.text()),
        _ => field.text(),
    }
}

/// One-line summary of a block and the blocks plugged into its inputs.
pub fn collapsed_text(ws: &Workspace, id: BlockId, max_len: usize) -> String {
    fn walk(ws: &Workspace, id: BlockId, out: &mut Vec<String>) {
        let Some(block) = ws.block(id) else {
            return;
        };
        for input in block.inputs.iter().filter(|i| i.visible) {
            out.extend(
                input
                    .fields
                    .iter()
                    .map(|f| field_text(ws, f))
                    .filter(|t| !t.trim().is_empty()),
            );
            if input.connection.is_none() {
                continue;
            }
            match ws.input_target_block(id, input.name.as_str()) {
                Some(child) => walk(ws, child, out),
                None if input.kind == InputKind::Value => out.push("?".to_string()),
                None => {}
            }
        }
    }
    let mut parts = Vec::new();
    walk(ws, id, &mut parts);
    let text = parts.join(" ");
    if text.chars().count() > max_len {
        let cut: String = text.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}\u{2026}", cut.trim_end())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use brick_core::connection::ConnectionRef;
    use brick_core::options::WorkspaceOptions;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn workspace() -> Workspace {
        Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    fn no_children(_: BlockId) -> Option<Size> {
        None
    }

    fn measure(ws: &Workspace, id: BlockId) -> RenderInfo {
        RenderInfo::measure(ws, id, &ConstantProvider::default(), &no_children).unwrap()
    }

    fn kinds(row: &Row) -> Vec<&'static str> {
        row.elements
            .iter()
            .map(|e| match e.kind {
                ElemKind::Spacer => "spacer",
                ElemKind::RoundCorner(_) => "round",
                ElemKind::SquareCorner(_) => "square",
                ElemKind::Hat => "hat",
                ElemKind::PreviousConnection => "previous",
                ElemKind::NextConnection => "next",
                ElemKind::OutputConnection => "output",
                ElemKind::Field(_) => "field",
                ElemKind::Icon => "icon",
                ElemKind::InlineInput(_) => "inline",
                ElemKind::ExternalValueInput(_) => "external",
                ElemKind::StatementInput(_) => "statement",
                ElemKind::JaggedEdge => "jagged",
            })
            .collect()
    }

    #[test]
    fn statement_block_rows() {
        let mut ws = workspace();
        let print = ws.new_block("text_print").unwrap();
        let info = measure(&ws, print);

        // top, spacer, input, spacer, bottom
        assert_eq!(info.rows.len(), 5);
        assert_eq!(kinds(&info.rows[0]), vec!["round", "spacer", "previous", "spacer"]);
        assert_eq!(kinds(&info.rows[2]), vec!["spacer", "field", "spacer", "external"]);
        assert_eq!(kinds(&info.rows[4]), vec!["round", "spacer", "next", "spacer"]);
        // The notch sits at the same x on top and bottom.
        assert_eq!(info.rows[0].elements[2].x, 15.0);
        assert_eq!(info.rows[4].elements[2].x, 15.0);
        assert_eq!(info.start_x, 0.0);
        assert!(info.height >= ConstantProvider::default().min_block_height);
    }

    #[test]
    fn output_tab_shifts_the_body_right() {
        let mut ws = workspace();
        let number = ws.new_block("math_number").unwrap();
        let info = measure(&ws, number);
        assert_eq!(info.start_x, 8.0);
        assert!(info.output.is_some());
        assert!(info.rows.iter().all(|r| r.x == 8.0));
        assert_eq!(kinds(&info.rows[0]), vec!["square", "spacer"]);
    }

    #[test]
    fn rows_fill_the_block_width() {
        let mut ws = workspace();
        let repeat = ws.new_block("controls_repeat_ext").unwrap();
        let info = measure(&ws, repeat);
        for row in &info.rows {
            let sum: f64 = row.elements.iter().map(|e| e.width).sum();
            assert!((sum - (info.width - info.start_x)).abs() < 1e-9, "{:?}", row.kind);
        }
        let statement_row = info.rows.iter().find(|r| r.has_statement).unwrap();
        assert_eq!(statement_row.statement_edge, info.statement_edge);
    }

    #[test]
    fn inline_inputs_share_a_row() {
        let mut ws = workspace();
        let compare = ws.new_block("logic_compare").unwrap();
        let info = measure(&ws, compare);
        assert!(info.is_inline);
        assert_eq!(
            kinds(&info.rows[2]),
            vec!["spacer", "inline", "spacer", "field", "spacer", "inline", "spacer"]
        );
        assert_eq!(info.rows[2].elements[1].height, 26.0);
    }

    #[test]
    fn connected_child_reserves_its_measured_size() {
        let mut ws = workspace();
        let compare = ws.new_block("logic_compare").unwrap();
        let yes = ws.new_block("logic_boolean").unwrap();
        ws.connect(ConnectionRef::output(yes), ConnectionRef::input(compare, "A"))
            .unwrap();
        let child = Size::new(60.0, 30.0);
        let sizes = move |id: BlockId| (id == yes).then_some(child);
        let info =
            RenderInfo::measure(&ws, compare, &ConstantProvider::default(), &sizes).unwrap();
        let input = &info.rows[2].elements[1];
        assert_eq!((input.width, input.height), (60.0, 30.0));

        // Without the child's size the parent cannot be measured.
        let err = RenderInfo::measure(&ws, compare, &ConstantProvider::default(), &no_children);
        assert_eq!(err, Err(RenderError::ChildNotRendered(compare, yes)));
    }

    #[test]
    fn measuring_twice_is_identical() {
        let mut ws = workspace();
        let if_block = ws.new_block("controls_if").unwrap();
        assert_eq!(measure(&ws, if_block), measure(&ws, if_block));
    }

    #[test]
    fn collapsed_block_is_one_row_with_jagged_edge() {
        let mut ws = workspace();
        let print = ws.new_block("text_print").unwrap();
        ws.set_collapsed(print, true).unwrap();
        let info = measure(&ws, print);
        let row = &info.rows[2];
        assert!(row.has_jagged_edge);
        assert_eq!(kinds(row), vec!["spacer", "field", "spacer", "jagged", "spacer"]);
        match &row.elements[1].kind {
            ElemKind::Field(field) => assert_eq!(field.text, "print ?"),
            other => panic!("expected a label, got {other:?}"),
        }
    }

    #[test]
    fn collapsed_text_is_truncated() {
        let mut ws = workspace();
        let text = ws.new_block("text").unwrap();
        ws.set_field_value(text, "TEXT", "a fairly long string of words").unwrap();
        let summary = collapsed_text(&ws, text, 10);
        assert_eq!(summary.chars().count(), 10);
        assert!(summary.ends_with('\u{2026}'));
    }
}
