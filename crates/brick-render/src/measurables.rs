//! Measurables and rows: the pieces a block's layout is made of.
//!
//! A `Measurable` is one sized element (field, connection, corner, input,
//! spacer). A `Row` is a horizontal run of measurables. Both are plain data;
//! `RenderInfo` creates them and fills in their positions.

use brick_core::block::Align;
use brick_core::id::{BlockId, Name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// An input's link to the block plugged into it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct InputInfo {
    pub name: Name,
    pub connected: Option<BlockId>,
    /// Size of the connected block and everything chained below it.
    pub connected_width: f64,
    pub connected_height: f64,
}

/// What a field looks like once laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: Option<Name>,
    pub text: String,
    /// Editable fields are drawn inside a border rect.
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElemKind {
    Spacer,
    RoundCorner(Side),
    SquareCorner(Side),
    Hat,
    PreviousConnection,
    NextConnection,
    OutputConnection,
    Field(FieldInfo),
    /// The comment icon.
    Icon,
    InlineInput(InputInfo),
    ExternalValueInput(InputInfo),
    StatementInput(InputInfo),
    JaggedEdge,
}

/// One sized element of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurable {
    pub kind: ElemKind,
    pub width: f64,
    pub height: f64,
    /// Left edge, relative to the block origin.
    pub x: f64,
    /// Vertical centre, relative to the block origin.
    pub centerline: f64,
    /// Distance from the row start to the notch (previous/next/statement).
    pub notch_offset: f64,
    /// Where the connection sits inside the element (inputs and output).
    pub connection_offset_y: f64,
    pub connection_width: f64,
    pub connection_height: f64,
}

impl Measurable {
    pub fn new(kind: ElemKind, width: f64, height: f64) -> Self {
        Self {
            kind,
            width,
            height,
            x: 0.0,
            centerline: 0.0,
            notch_offset: 0.0,
            connection_offset_y: 0.0,
            connection_width: 0.0,
            connection_height: 0.0,
        }
    }

    pub fn spacer(width: f64) -> Self {
        Self::new(ElemKind::Spacer, width, 0.0)
    }

    pub fn is_spacer(&self) -> bool {
        matches!(self.kind, ElemKind::Spacer)
    }

    pub fn is_input(&self) -> bool {
        self.input_info().is_some()
    }

    pub fn input_info(&self) -> Option<&InputInfo> {
        match &self.kind {
            ElemKind::InlineInput(info)
            | ElemKind::ExternalValueInput(info)
            | ElemKind::StatementInput(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_statement_input(&self) -> bool {
        matches!(self.kind, ElemKind::StatementInput(_))
    }

    pub fn is_external_input(&self) -> bool {
        matches!(self.kind, ElemKind::ExternalValueInput(_))
    }

    pub fn is_inline_input(&self) -> bool {
        matches!(self.kind, ElemKind::InlineInput(_))
    }

    pub fn is_notch_connection(&self) -> bool {
        matches!(
            self.kind,
            ElemKind::PreviousConnection | ElemKind::NextConnection
        )
    }

    /// Width of the connected block that spills out past this element.
    pub fn connected_block_overflow(&self) -> f64 {
        match &self.kind {
            ElemKind::StatementInput(info) => info.connected_width,
            ElemKind::ExternalValueInput(info) if info.connected_width != 0.0 => {
                info.connected_width - self.connection_width
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Top,
    Bottom,
    Input,
    Spacer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub kind: RowKind,
    pub elements: Vec<Measurable>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub min_width: f64,
    pub min_height: f64,
    pub width_with_connected_blocks: f64,
    pub connected_block_widths: f64,
    pub has_statement: bool,
    pub has_external_input: bool,
    pub has_inline_input: bool,
    pub has_dummy_input: bool,
    pub has_jagged_edge: bool,
    /// Statement rows: where the statement mouth starts.
    pub statement_edge: f64,
    /// Top row: height reserved above the row for a hat.
    pub ascender: f64,
    /// Bottom row: height of the next notch hanging below the baseline.
    pub descender: f64,
    /// Bottom row: y of the bottom edge (excluding the notch).
    pub baseline: f64,
    pub follows_statement: bool,
    pub align: Align,
}

impl Row {
    pub fn new(kind: RowKind) -> Self {
        Self {
            kind,
            elements: Vec::new(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            min_width: 0.0,
            min_height: 0.0,
            width_with_connected_blocks: 0.0,
            connected_block_widths: 0.0,
            has_statement: false,
            has_external_input: false,
            has_inline_input: false,
            has_dummy_input: false,
            has_jagged_edge: false,
            statement_edge: 0.0,
            ascender: 0.0,
            descender: 0.0,
            baseline: 0.0,
            follows_statement: false,
            align: Align::Left,
        }
    }

    /// A between-row gap holding a single spacer.
    pub fn spacer(width: f64, height: f64) -> Self {
        let mut row = Self::new(RowKind::Spacer);
        row.width = width;
        row.height = height;
        row.elements.push(Measurable::spacer(width));
        row
    }

    pub fn starts_with_elem_spacer(&self) -> bool {
        !matches!(self.kind, RowKind::Top | RowKind::Bottom)
    }

    pub fn ends_with_elem_spacer(&self) -> bool {
        match self.kind {
            RowKind::Input => !self.has_external_input && !self.has_statement,
            _ => true,
        }
    }

    pub fn last_input(&self) -> Option<&Measurable> {
        self.elements.iter().rev().find(|e| e.is_input())
    }

    pub fn last_input_mut(&mut self) -> Option<&mut Measurable> {
        self.elements.iter_mut().rev().find(|e| e.is_input())
    }

    pub fn last_spacer_mut(&mut self) -> Option<&mut Measurable> {
        self.elements.iter_mut().rev().find(|e| e.is_spacer())
    }

    /// The previous (top row) or next (bottom row) connection.
    pub fn notch_connection(&self) -> Option<&Measurable> {
        self.elements.iter().find(|e| e.is_notch_connection())
    }

    /// Size the row from its elements.
    pub fn measure(&mut self) {
        match self.kind {
            RowKind::Spacer => {}
            RowKind::Top => {
                let mut width = 0.0;
                let mut height: f64 = 0.0;
                let mut ascender: f64 = 0.0;
                for elem in &self.elements {
                    width += elem.width;
                    match elem.kind {
                        ElemKind::Spacer => {}
                        ElemKind::Hat => ascender = ascender.max(elem.height),
                        _ => height = height.max(elem.height),
                    }
                }
                self.width = self.min_width.max(width);
                self.height = self.min_height.max(height) + ascender;
                self.ascender = ascender;
                self.width_with_connected_blocks = self.width;
            }
            RowKind::Bottom => {
                let mut width = 0.0;
                let mut height: f64 = 0.0;
                let mut descender: f64 = 0.0;
                for elem in &self.elements {
                    width += elem.width;
                    match elem.kind {
                        ElemKind::Spacer => {}
                        // Next connections hang entirely below the baseline.
                        ElemKind::NextConnection => descender = descender.max(elem.height),
                        _ => height = height.max(elem.height),
                    }
                }
                self.width = self.min_width.max(width);
                self.height = self.min_height.max(height) + descender;
                self.descender = descender;
                self.width_with_connected_blocks = self.width;
            }
            RowKind::Input => {
                self.width = self.min_width;
                self.height = self.min_height;
                let mut connected = 0.0;
                for elem in &self.elements {
                    self.width += elem.width;
                    connected += elem.connected_block_overflow();
                    if !elem.is_spacer() {
                        self.height = self.height.max(elem.height);
                    }
                }
                self.connected_block_widths = connected;
                self.width_with_connected_blocks = self.width + connected;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(kind: ElemKind, width: f64, height: f64) -> Measurable {
        Measurable::new(kind, width, height)
    }

    #[test]
    fn top_row_adds_hat_above_its_elements() {
        let mut row = Row::new(RowKind::Top);
        row.min_height = 5.0;
        row.elements = vec![
            sized(ElemKind::SquareCorner(Side::Left), 0.0, 4.0),
            sized(ElemKind::Hat, 100.0, 15.0),
            Measurable::spacer(5.0),
        ];
        row.measure();
        assert_eq!(row.width, 105.0);
        assert_eq!(row.height, 20.0);
        assert_eq!(row.ascender, 15.0);
    }

    #[test]
    fn bottom_row_hangs_next_notch_below() {
        let mut row = Row::new(RowKind::Bottom);
        row.min_height = 4.0;
        row.elements = vec![
            sized(ElemKind::RoundCorner(Side::Left), 8.0, 4.0),
            Measurable::spacer(7.0),
            sized(ElemKind::NextConnection, 15.0, 4.0),
        ];
        row.measure();
        assert_eq!(row.height, 8.0);
        assert_eq!(row.descender, 4.0);
    }

    #[test]
    fn input_row_counts_statement_children_as_overflow() {
        let info = InputInfo {
            name: Name::intern("DO"),
            connected: Some(BlockId::intern("child")),
            connected_width: 120.0,
            connected_height: 40.0,
        };
        let mut row = Row::new(RowKind::Input);
        row.elements = vec![
            Measurable::spacer(5.0),
            sized(ElemKind::StatementInput(info), 30.0, 40.0),
        ];
        row.measure();
        assert_eq!(row.width, 35.0);
        assert_eq!(row.height, 40.0);
        assert_eq!(row.width_with_connected_blocks, 155.0);
    }
}
