pub mod colourer;
pub mod constants;
pub mod drawer;
pub mod error;
pub mod hit;
pub mod info;
pub mod measurables;
pub mod renderer;
pub mod svg;

pub use colourer::{Colourer, Paint};
pub use constants::ConstantProvider;
pub use drawer::{Drawing, FieldPlacement, draw};
pub use error::RenderError;
pub use hit::{hit_test, hit_test_rect};
pub use info::RenderInfo;
pub use renderer::{RenderedBlock, Renderer};
pub use svg::render_svg;
