//! Static SVG export of a rendered workspace.

use crate::renderer::{Renderer, painted_blocks};
use brick_core::dom::{xml_escape, xml_escape_attr};
use brick_core::id::BlockId;
use brick_core::workspace::Workspace;

const PAD: f64 = 16.0;
const DISABLED_OPACITY: f64 = 0.5;

/// Serialize every rendered block to an SVG document. Blocks are painted
/// stack by stack in creation order, parents before their children.
/// Blocks hidden inside collapsed blocks are skipped.
pub fn render_svg(ws: &Workspace, renderer: &Renderer) -> String {
    let (min_x, min_y, max_x, max_y) = match renderer.workspace_bounds(ws) {
        Some(b) => (b.x0, b.y0, b.x1, b.y1),
        None => (0.0, 0.0, 0.0, 0.0),
    };
    let width = max_x - min_x + PAD * 2.0;
    let height = max_y - min_y + PAD * 2.0;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\n"
    ));
    let font_size = renderer.constants().field_text_font_size;
    svg.push_str("<style>\n");
    svg.push_str(&format!(
        "  text {{ font-family: sans-serif; font-size: {font_size}pt; fill: #fff; }}\n"
    ));
    svg.push_str("  .editable text { fill: #000; }\n");
    svg.push_str("</style>\n");
    svg.push_str(&format!(
        "<g transform=\"translate({}, {})\">\n",
        PAD - min_x,
        PAD - min_y
    ));

    for top in ws.top_blocks(false) {
        for id in painted_blocks(ws, top) {
            render_block_svg(&mut svg, ws, renderer, id);
        }
    }

    svg.push_str("</g>\n</svg>");
    svg
}

fn render_block_svg(out: &mut String, ws: &Workspace, renderer: &Renderer, id: BlockId) {
    let (Some(rendered), Some(block)) = (renderer.rendered(id), ws.block(id)) else {
        return;
    };
    let c = renderer.constants();

    out.push_str(&format!(
        "<g data-id=\"{}\" transform=\"translate({}, {})\"",
        xml_escape_attr(id.as_str()),
        block.xy.x,
        block.xy.y
    ));
    if rendered.disabled {
        out.push_str(&format!(" opacity=\"{DISABLED_OPACITY}\""));
    }
    out.push_str(">\n");

    let stroke = rendered.paint.stroke.as_deref().unwrap_or("none");
    out.push_str(&format!(
        "  <path d=\"{}\" fill=\"{}\" stroke=\"{}\" fill-rule=\"evenodd\" />\n",
        rendered.drawing.svg_path(),
        rendered.paint.fill,
        stroke
    ));

    for field in &rendered.drawing.fields {
        let r = field.rect;
        if !field.is_field {
            out.push_str(&format!(
                "  <circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\" />\n",
                r.center().x,
                r.center().y,
                r.width() / 2.0,
                rendered.colourer.secondary
            ));
            out.push_str(&format!(
                "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" dominant-baseline=\"central\">?</text>\n",
                r.center().x,
                r.center().y
            ));
            continue;
        }
        if field.editable {
            out.push_str(&format!(
                "  <g class=\"editable\"><rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{radius}\" ry=\"{radius}\" fill=\"#fff\" />\n",
                r.x0,
                r.y0,
                r.width(),
                r.height(),
                radius = c.field_border_rect_radius
            ));
        }
        out.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" dominant-baseline=\"central\">{}</text>\n",
            r.x0 + if field.editable { c.field_border_rect_x_padding } else { 0.0 },
            r.center().y,
            xml_escape(&field.text)
        ));
        if field.editable {
            out.push_str("  </g>\n");
        }
    }

    out.push_str("</g>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::blocks::stock_registry;
    use brick_core::connection::ConnectionRef;
    use brick_core::options::WorkspaceOptions;
    use std::rc::Rc;

    fn workspace() -> Workspace {
        Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default())
    }

    #[test]
    fn empty_workspace_is_a_padded_document() {
        let mut ws = workspace();
        let mut renderer = Renderer::default();
        renderer.render_all(&mut ws).unwrap();
        let svg = render_svg(&ws, &renderer);
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"32\" height=\"32\""));
        assert!(svg.ends_with("</svg>"));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn one_path_per_block() {
        let mut ws = workspace();
        let print = ws.new_block("text_print").unwrap();
        let text = ws.new_block("text").unwrap();
        ws.connect(ConnectionRef::output(text), ConnectionRef::input(print, "TEXT"))
            .unwrap();
        ws.new_block("math_number").unwrap();
        let mut renderer = Renderer::default();
        renderer.render_all(&mut ws).unwrap();

        let svg = render_svg(&ws, &renderer);
        assert_eq!(svg.matches("<path").count(), 3);
        assert!(svg.contains(&format!("data-id=\"{print}\"")));
        // Parents are painted before children.
        let parent_at = svg.find(&format!("data-id=\"{print}\"")).unwrap();
        let child_at = svg.find(&format!("data-id=\"{text}\"")).unwrap();
        assert!(parent_at < child_at);
    }

    #[test]
    fn field_text_is_escaped() {
        let mut ws = workspace();
        let text = ws.new_block("text").unwrap();
        ws.set_field_value(text, "TEXT", "a < b & c").unwrap();
        let mut renderer = Renderer::default();
        renderer.render_all(&mut ws).unwrap();

        let svg = render_svg(&ws, &renderer);
        assert!(svg.contains(">a &lt; b &amp; c</text>"));
        assert!(svg.contains("class=\"editable\""));
    }

    #[test]
    fn disabled_blocks_are_faded() {
        let mut ws = workspace();
        let print = ws.new_block("text_print").unwrap();
        ws.set_enabled(print, false).unwrap();
        let mut renderer = Renderer::default();
        renderer.render_all(&mut ws).unwrap();

        let svg = render_svg(&ws, &renderer);
        assert!(svg.contains("opacity=\"0.5\""));
    }
}
