//! SketchSync Render Library
//!
//! Render adapters that turn a board's element list into a drawable surface.
//! The default adapter produces SVG documents, which keeps clients headless.

mod renderer;
mod svg;

pub use renderer::{RenderConfig, RendererError, RenderResult};
pub use svg::SvgRenderer;
