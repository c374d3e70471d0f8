//! Render a Blockly XML file to SVG on stdout.
//!
//! ```sh
//! cargo run -p brick-render --example render_xml -- program.xml > program.svg
//! ```

use brick_core::xml::{dom_to_workspace, text_to_dom};
use brick_core::{Workspace, WorkspaceOptions, stock_registry};
use brick_render::{Renderer, render_svg};
use std::env;
use std::fs;
use std::process;
use std::rc::Rc;

fn main() {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: render_xml <file.xml>");
        process::exit(2);
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{path}: {err}");
            process::exit(1);
        }
    };

    let mut ws = Workspace::new(Rc::new(stock_registry()), WorkspaceOptions::default());
    let loaded = text_to_dom(&text).and_then(|dom| dom_to_workspace(&dom, &mut ws));
    if let Err(err) = loaded {
        eprintln!("{path}: {err}");
        process::exit(1);
    }

    let mut renderer = Renderer::default();
    if let Err(err) = renderer.render_all(&mut ws) {
        eprintln!("{path}: {err}");
        process::exit(1);
    }
    println!("{}", render_svg(&ws, &renderer));
}
