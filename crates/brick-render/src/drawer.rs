//! RenderInfo → outline path.
//!
//! Walks the top row left to right, the right edge top to bottom, the
//! bottom row right to left, and the left edge bottom to top, emitting one
//! closed `BezPath`. Inline value inputs become separate closed holes.
//! Connection offsets and field boxes fall out of the same walk.

use crate::constants::{ConstantProvider, PathSeg, Shapes};
use crate::info::RenderInfo;
use crate::measurables::{ElemKind, Measurable, Row, Side};
use brick_core::connection::ConnectionSlot;
use brick_core::coordinate::Coordinate;
use brick_core::id::Name;
use kurbo::{Arc, BezPath, PathEl, Point, Rect, SvgArc, Vec2};

/// Where a field or icon lands inside its block.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlacement {
    pub name: Option<Name>,
    pub text: String,
    pub editable: bool,
    /// `false` for the comment icon.
    pub is_field: bool,
    pub rect: Rect,
}

/// Everything drawn for one block, relative to its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub outline: BezPath,
    /// Holes for empty or occupied inline value inputs.
    pub inline: BezPath,
    pub connections: Vec<(ConnectionSlot, Coordinate)>,
    pub fields: Vec<FieldPlacement>,
}

impl Drawing {
    /// Outline and holes as one SVG path `d` attribute.
    pub fn svg_path(&self) -> String {
        if self.inline.elements().is_empty() {
            self.outline.to_svg()
        } else {
            format!("{} {}", self.outline.to_svg(), self.inline.to_svg())
        }
    }

    /// Offset of one connection, if the block has it.
    pub fn connection(&self, slot: ConnectionSlot) -> Option<Coordinate> {
        self.connections
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, at)| *at)
    }
}

pub fn draw(info: &RenderInfo, constants: &ConstantProvider) -> Drawing {
    let mut drawer = Drawer {
        info,
        shapes: constants.shapes(),
        outline: Pen::default(),
        inline: Pen::default(),
        connections: Vec::new(),
        fields: Vec::new(),
    };
    drawer.draw_outline();
    drawer.draw_internals();
    Drawing {
        outline: drawer.outline.path,
        inline: drawer.inline.path,
        connections: drawer.connections,
        fields: drawer.fields,
    }
}

struct Drawer<'a> {
    info: &'a RenderInfo,
    shapes: Shapes,
    outline: Pen,
    inline: Pen,
    connections: Vec<(ConnectionSlot, Coordinate)>,
    fields: Vec<FieldPlacement>,
}

impl Drawer<'_> {
    fn draw_outline(&mut self) {
        let info = self.info;
        let Some((top, rest)) = info.rows.split_first() else {
            return;
        };
        let Some((bottom, middle)) = rest.split_last() else {
            return;
        };
        self.draw_top(top);
        for row in middle {
            if row.has_jagged_edge {
                self.outline.segs(&self.shapes.jagged_teeth.path);
                self.outline
                    .v_by(row.height - self.shapes.jagged_teeth.height);
            } else if row.has_statement {
                self.draw_statement_input(row);
            } else if row.has_external_input {
                self.draw_value_input(row);
            } else {
                self.outline.v_to(row.y + row.height);
            }
        }
        self.draw_bottom(bottom);
        self.draw_left();
    }

    fn draw_top(&mut self, top: &Row) {
        let rounded = matches!(
            top.elements.first().map(|e| &e.kind),
            Some(ElemKind::RoundCorner(Side::Left))
        );
        let start_y = self.info.start_y
            + if rounded {
                self.shapes.outside_corners.radius
            } else {
                0.0
            };
        self.outline.move_to(Point::new(top.x, start_y));
        for elem in &top.elements {
            match elem.kind {
                ElemKind::RoundCorner(Side::Left) => {
                    self.outline.segs(&self.shapes.outside_corners.top_left)
                }
                ElemKind::PreviousConnection => {
                    self.connections.push((
                        ConnectionSlot::Previous,
                        Coordinate::new(top.x + elem.notch_offset, 0.0),
                    ));
                    self.outline.segs(&self.shapes.notch.path_left);
                }
                ElemKind::Hat => self.outline.segs(&self.shapes.start_hat.path),
                ElemKind::Spacer => self.outline.h_by(elem.width),
                // Square corners need no path.
                _ => {}
            }
        }
        self.outline.v_to(top.y + top.height);
    }

    fn draw_value_input(&mut self, row: &Row) {
        let Some(input) = row.last_input() else {
            return;
        };
        if let Some(name) = input.input_info().map(|i| i.name) {
            self.connections.push((
                ConnectionSlot::Input(name),
                Coordinate::new(row.x + row.width, row.y),
            ));
        }
        self.outline.h_to(input.x + input.width);
        self.outline.segs(&self.shapes.puzzle_tab.path_down);
        self.outline.v_by(row.height - input.connection_height);
    }

    fn draw_statement_input(&mut self, row: &Row) {
        let Some(input) = row.last_input() else {
            return;
        };
        let inside = &self.shapes.inside_corners;
        let notch_start = input.x + input.notch_offset + self.shapes.notch.width;
        self.outline.h_to(notch_start);
        self.outline.segs(&self.shapes.notch.path_right);
        self.outline.h_by(-(input.notch_offset - inside.width));
        self.outline.segs(&inside.path_top);
        self.outline.v_by(row.height - 2.0 * inside.height);
        self.outline.segs(&inside.path_bottom);
        self.outline.h_to(row.x + row.width);

        if let Some(name) = input.input_info().map(|i| i.name) {
            self.connections.push((
                ConnectionSlot::Input(name),
                Coordinate::new(row.x + row.statement_edge + input.notch_offset, row.y),
            ));
        }
    }

    fn draw_bottom(&mut self, bottom: &Row) {
        self.outline.v_to(bottom.baseline);
        for elem in bottom.elements.iter().rev() {
            match elem.kind {
                ElemKind::NextConnection => {
                    self.connections.push((
                        ConnectionSlot::Next,
                        Coordinate::new(elem.x, bottom.baseline),
                    ));
                    self.outline.segs(&self.shapes.notch.path_right);
                }
                ElemKind::SquareCorner(Side::Left) => self.outline.h_to(bottom.x),
                ElemKind::RoundCorner(Side::Left) => {
                    self.outline.segs(&self.shapes.outside_corners.bottom_left)
                }
                ElemKind::Spacer => self.outline.h_by(-elem.width),
                _ => {}
            }
        }
    }

    fn draw_left(&mut self) {
        let info = self.info;
        if let Some(output) = &info.output {
            self.connections.push((
                ConnectionSlot::Output,
                Coordinate::new(info.start_x, output.connection_offset_y),
            ));
            self.outline
                .v_to(output.connection_offset_y + output.height);
            self.outline.segs(&self.shapes.puzzle_tab.path_up);
        }
        self.outline.close();
    }

    fn draw_internals(&mut self) {
        let info = self.info;
        for row in &info.rows {
            for elem in &row.elements {
                match &elem.kind {
                    ElemKind::InlineInput(input) => {
                        let name = input.name;
                        self.draw_inline_input(elem, name);
                    }
                    ElemKind::Field(field) => self.fields.push(FieldPlacement {
                        name: field.name,
                        text: field.text.clone(),
                        editable: field.editable,
                        is_field: true,
                        rect: elem_rect(elem),
                    }),
                    ElemKind::Icon => self.fields.push(FieldPlacement {
                        name: None,
                        text: String::new(),
                        editable: false,
                        is_field: false,
                        rect: elem_rect(elem),
                    }),
                    _ => {}
                }
            }
        }
    }

    fn draw_inline_input(&mut self, input: &Measurable, name: Name) {
        let top = input.centerline - input.height / 2.0;
        let connection_right = input.x + input.connection_width;
        let connection_bottom = input.connection_offset_y + input.connection_height;

        self.inline.move_to(Point::new(connection_right, top));
        self.inline.v_by(input.connection_offset_y);
        self.inline.segs(&self.shapes.puzzle_tab.path_down);
        self.inline.v_by(input.height - connection_bottom);
        self.inline.h_by(input.width - input.connection_width);
        self.inline.v_by(-input.height);
        self.inline.close();

        self.connections.push((
            ConnectionSlot::Input(name),
            Coordinate::new(connection_right, top + input.connection_offset_y),
        ));
    }
}

fn elem_rect(elem: &Measurable) -> Rect {
    let top = elem.centerline - elem.height / 2.0;
    Rect::new(elem.x, top, elem.x + elem.width, top + elem.height)
}

// ─── Pen ─────────────────────────────────────────────────────────────────

/// Relative-move path builder over `BezPath`.
#[derive(Debug, Default)]
struct Pen {
    path: BezPath,
    at: Point,
    start: Point,
    /// Second control point of the last cubic, for smooth curves.
    last_control: Option<Point>,
}

impl Pen {
    fn move_to(&mut self, p: Point) {
        self.path.move_to(p);
        self.at = p;
        self.start = p;
        self.last_control = None;
    }

    fn line_to(&mut self, p: Point) {
        self.path.line_to(p);
        self.at = p;
        self.last_control = None;
    }

    fn h_by(&mut self, dx: f64) {
        self.line_to(self.at + Vec2::new(dx, 0.0));
    }

    fn v_by(&mut self, dy: f64) {
        self.line_to(self.at + Vec2::new(0.0, dy));
    }

    fn h_to(&mut self, x: f64) {
        self.line_to(Point::new(x, self.at.y));
    }

    fn v_to(&mut self, y: f64) {
        self.line_to(Point::new(self.at.x, y));
    }

    fn segs(&mut self, segs: &[PathSeg]) {
        for seg in segs {
            match *seg {
                PathSeg::Line(d) => self.line_to(self.at + d),
                PathSeg::Curve(c1, c2, d) => self.curve(self.at + c1, self.at + c2, self.at + d),
                PathSeg::Smooth(c2, d) => {
                    let c1 = match self.last_control {
                        Some(prev) => self.at + (self.at - prev),
                        None => self.at,
                    };
                    self.curve(c1, self.at + c2, self.at + d);
                }
                PathSeg::Arc { radius, sweep, to } => self.arc(radius, sweep, to),
            }
        }
    }

    fn curve(&mut self, c1: Point, c2: Point, end: Point) {
        self.path.curve_to(c1, c2, end);
        self.at = end;
        self.last_control = Some(c2);
    }

    fn arc(&mut self, radius: f64, sweep: bool, to: Vec2) {
        let end = self.at + to;
        let svg = SvgArc {
            from: self.at,
            to: end,
            radii: Vec2::new(radius, radius),
            x_rotation: 0.0,
            large_arc: false,
            sweep,
        };
        match Arc::from_svg_arc(&svg) {
            Some(arc) => {
                for el in arc.append_iter(0.1) {
                    self.path.push(el);
                }
                self.at = end;
                self.last_control = None;
            }
            // Degenerate (zero radius): a straight line is the arc.
            None => self.line_to(end),
        }
    }

    /// Return to the subpath start and close it.
    fn close(&mut self) {
        if (self.at - self.start).hypot() > 1e-9 {
            self.line_to(self.start);
        }
        self.path.close_path();
        self.at = self.start;
    }
}

/// True if every subpath of `path` ends where it started and is closed.
pub fn is_closed(path: &BezPath) -> bool {
    let mut start: Option<Point> = None;
    let mut last = Point::ZERO;
    let mut open = false;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                if open {
                    return false;
                }
                start = Some(p);
                last = p;
                open = true;
            }
            PathEl::LineTo(p) | PathEl::QuadTo(_, p) | PathEl::CurveTo(_, _, p) => last = p,
            PathEl::ClosePath => {
                let Some(s) = start else {
                    return false;
                };
                if (last - s).hypot() > 1e-6 {
                    return false;
                }
                open = false;
            }
        }
    }
    !open && start.is_some()
}
