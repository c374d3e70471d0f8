//! Renderer constants and the path shapes built from them.
//!
//! Every size the measurer and drawer use comes from a `ConstantProvider`.
//! The defaults reproduce the classic block look; a host can load its own
//! values from JSON and keep the rest at their defaults.

use kurbo::Vec2;
use serde::{Deserialize, Serialize};

/// Render sizes in workspace units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstantProvider {
    pub no_padding: f64,
    pub small_padding: f64,
    pub medium_padding: f64,
    pub medium_large_padding: f64,
    pub large_padding: f64,

    pub tab_height: f64,
    pub tab_offset_from_top: f64,
    pub tab_vertical_overlap: f64,
    pub tab_width: f64,

    pub notch_width: f64,
    pub notch_height: f64,
    pub notch_offset_left: f64,

    pub min_block_width: f64,
    pub min_block_height: f64,
    pub empty_block_spacer_height: f64,
    pub corner_radius: f64,

    pub statement_input_padding_left: f64,
    pub statement_bottom_spacer: f64,
    pub empty_statement_input_height: f64,
    pub dummy_input_min_height: f64,

    pub start_hat_height: f64,
    pub start_hat_width: f64,

    pub empty_inline_input_padding: f64,
    pub empty_inline_input_height: f64,
    pub external_value_input_padding: f64,

    pub jagged_teeth_height: f64,
    pub jagged_teeth_width: f64,

    pub field_text_font_size: f64,
    pub field_text_height: f64,
    /// Average advance of one character; text is measured without a font.
    pub field_char_width: f64,
    pub field_border_rect_x_padding: f64,
    pub field_border_rect_height: f64,
    pub field_border_rect_radius: f64,
    pub field_dropdown_arrow_width: f64,
    pub field_checkbox_size: f64,

    pub icon_size: f64,
    /// Collapsed blocks show at most this many characters of their text.
    pub collapsed_text_length: usize,
}

impl Default for ConstantProvider {
    fn default() -> Self {
        let min_block_height = 24.0;
        let tab_height = 15.0;
        Self {
            no_padding: 0.0,
            small_padding: 3.0,
            medium_padding: 5.0,
            medium_large_padding: 8.0,
            large_padding: 10.0,

            tab_height,
            tab_offset_from_top: 5.0,
            tab_vertical_overlap: 2.5,
            tab_width: 8.0,

            notch_width: 15.0,
            notch_height: 4.0,
            notch_offset_left: 15.0,

            min_block_width: 12.0,
            min_block_height,
            empty_block_spacer_height: 16.0,
            corner_radius: 8.0,

            statement_input_padding_left: 20.0,
            statement_bottom_spacer: 0.0,
            empty_statement_input_height: min_block_height,
            dummy_input_min_height: tab_height,

            start_hat_height: 15.0,
            start_hat_width: 100.0,

            empty_inline_input_padding: 14.5,
            empty_inline_input_height: 26.0,
            external_value_input_padding: 2.0,

            jagged_teeth_height: 12.0,
            jagged_teeth_width: 6.0,

            field_text_font_size: 11.0,
            field_text_height: 16.0,
            field_char_width: 6.6,
            field_border_rect_x_padding: 5.0,
            field_border_rect_height: 16.0,
            field_border_rect_radius: 4.0,
            field_dropdown_arrow_width: 12.0,
            field_checkbox_size: 15.0,

            icon_size: 17.0,
            collapsed_text_length: 30,
        }
    }
}

impl ConstantProvider {
    /// Load from JSON; omitted keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Estimated width of a run of field text.
    pub fn text_width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.field_char_width
    }

    pub fn shapes(&self) -> Shapes {
        Shapes {
            notch: self.make_notch(),
            puzzle_tab: self.make_puzzle_tab(),
            outside_corners: self.make_outside_corners(),
            inside_corners: self.make_inside_corners(),
            start_hat: self.make_start_hat(),
            jagged_teeth: self.make_jagged_teeth(),
        }
    }

    fn make_notch(&self) -> NotchShape {
        let width = self.notch_width;
        let height = self.notch_height;
        let inner_width = 3.0;
        let outer_width = (width - inner_width) / 2.0;
        let path = |dir: f64| {
            vec![
                PathSeg::Line(Vec2::new(dir * outer_width, height)),
                PathSeg::Line(Vec2::new(dir * inner_width, 0.0)),
                PathSeg::Line(Vec2::new(dir * outer_width, -height)),
            ]
        };
        NotchShape {
            width,
            height,
            path_left: path(1.0),
            path_right: path(-1.0),
        }
    }

    fn make_puzzle_tab(&self) -> PuzzleTab {
        let width = self.tab_width;
        let height = self.tab_height;
        // The tab is two mirrored S-curves; `up` flips the vertical sense.
        let path = |up: bool| {
            let forward = if up { -1.0 } else { 1.0 };
            let back = -1.0;
            let overlap = self.tab_vertical_overlap;
            let half_height = height / 2.0;
            let control1_y = half_height + overlap;
            let control2_y = half_height + 0.5;
            let control3_y = overlap;
            vec![
                PathSeg::Curve(
                    Vec2::new(0.0, forward * control1_y),
                    Vec2::new(back * width, -forward * control2_y),
                    Vec2::new(back * width, forward * half_height),
                ),
                PathSeg::Smooth(
                    Vec2::new(-back * width, -forward * control3_y),
                    Vec2::new(-back * width, forward * half_height),
                ),
            ]
        };
        PuzzleTab {
            width,
            height,
            path_down: path(false),
            path_up: path(true),
        }
    }

    fn make_outside_corners(&self) -> OutsideCorners {
        let r = self.corner_radius;
        OutsideCorners {
            radius: r,
            top_left: vec![PathSeg::Arc {
                radius: r,
                sweep: true,
                to: Vec2::new(r, -r),
            }],
            bottom_left: vec![PathSeg::Arc {
                radius: r,
                sweep: true,
                to: Vec2::new(-r, -r),
            }],
        }
    }

    fn make_inside_corners(&self) -> InsideCorners {
        let r = self.corner_radius;
        InsideCorners {
            width: r,
            height: r,
            path_top: vec![PathSeg::Arc {
                radius: r,
                sweep: false,
                to: Vec2::new(-r, r),
            }],
            path_bottom: vec![PathSeg::Arc {
                radius: r,
                sweep: false,
                to: Vec2::new(r, r),
            }],
        }
    }

    fn make_start_hat(&self) -> StartHat {
        let height = self.start_hat_height;
        let width = self.start_hat_width;
        StartHat {
            width,
            height,
            path: vec![PathSeg::Curve(
                Vec2::new(30.0, -height),
                Vec2::new(70.0, -height),
                Vec2::new(width, 0.0),
            )],
        }
    }

    fn make_jagged_teeth(&self) -> JaggedTeeth {
        let width = self.jagged_teeth_width;
        let height = self.jagged_teeth_height;
        JaggedTeeth {
            width,
            height,
            path: vec![
                PathSeg::Line(Vec2::new(width, height / 4.0)),
                PathSeg::Line(Vec2::new(-width * 2.0, height / 2.0)),
                PathSeg::Line(Vec2::new(width, height / 4.0)),
            ],
        }
    }
}

// ─── Shapes ──────────────────────────────────────────────────────────────

/// One relative path segment. Offsets are from the current pen position,
/// like lower-case SVG path commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSeg {
    Line(Vec2),
    /// Cubic with both control points and the end point given.
    Curve(Vec2, Vec2, Vec2),
    /// Cubic whose first control point mirrors the previous curve's last.
    Smooth(Vec2, Vec2),
    /// Circular arc of `radius` ending at `to`.
    Arc { radius: f64, sweep: bool, to: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotchShape {
    pub width: f64,
    pub height: f64,
    /// Drawn left to right along a top edge.
    pub path_left: Vec<PathSeg>,
    /// Drawn right to left along a bottom edge.
    pub path_right: Vec<PathSeg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleTab {
    pub width: f64,
    pub height: f64,
    pub path_down: Vec<PathSeg>,
    pub path_up: Vec<PathSeg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutsideCorners {
    pub radius: f64,
    /// Starts `radius` below the corner and ends `radius` right of it.
    pub top_left: Vec<PathSeg>,
    pub bottom_left: Vec<PathSeg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsideCorners {
    pub width: f64,
    pub height: f64,
    pub path_top: Vec<PathSeg>,
    pub path_bottom: Vec<PathSeg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartHat {
    pub width: f64,
    pub height: f64,
    pub path: Vec<PathSeg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JaggedTeeth {
    pub width: f64,
    pub height: f64,
    pub path: Vec<PathSeg>,
}

/// All shapes derived from one set of constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Shapes {
    pub notch: NotchShape,
    pub puzzle_tab: PuzzleTab,
    pub outside_corners: OutsideCorners,
    pub inside_corners: InsideCorners,
    pub start_hat: StartHat,
    pub jagged_teeth: JaggedTeeth,
}

/// Net displacement of a segment list.
pub fn displacement(segs: &[PathSeg]) -> Vec2 {
    segs.iter().fold(Vec2::ZERO, |acc, seg| {
        acc + match *seg {
            PathSeg::Line(to) | PathSeg::Curve(_, _, to) | PathSeg::Smooth(_, to) => to,
            PathSeg::Arc { to, .. } => to,
        }
    })
}
