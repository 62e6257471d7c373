#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod element;
pub mod extract;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod render;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutOptions, SvgOptions};
pub use element::{AttrValue, Element, ElementError};
pub use ir::{Direction, EdgeStyle, NodeShape, Point};
pub use layout::{GraphLayout, LayoutError, compute_layout};
pub use render::{render_svg, to_svg_string};
pub use theme::{Palette, Theme};

/// Lays out the graph under `root` and emits the SVG element tree.
pub fn render_graph(
    root: Option<&Element>,
    layout_options: &LayoutOptions,
    svg_options: &SvgOptions,
) -> Result<Element, LayoutError> {
    let layout = compute_layout(root, layout_options)?;
    Ok(render_svg(&layout, svg_options))
}
