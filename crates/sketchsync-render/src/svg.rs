//! SVG render adapter.

use crate::renderer::{RenderConfig, RenderResult, svg_color};
use sketchsync_core::{Element, Renderer};
use std::fmt::Write as _;
use std::path::Path;

/// Renders the board into an SVG document on every redraw.
///
/// The latest document is kept in memory; [`SvgRenderer::write_to`] saves it.
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    config: RenderConfig,
    document: String,
    frames: usize,
}

impl SvgRenderer {
    pub fn new(config: RenderConfig) -> Self {
        let mut renderer = Self {
            config,
            document: String::new(),
            frames: 0,
        };
        renderer.document = renderer.build_document(&[]);
        renderer
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The most recently rendered document.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Number of redraws performed.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Save the current document.
    pub fn write_to(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        std::fs::write(path.as_ref(), &self.document)?;
        log::debug!("Wrote frame {} to {}", self.frames, path.as_ref().display());
        Ok(())
    }

    fn build_document(&self, elements: &[&Element]) -> String {
        let RenderConfig {
            size,
            background_color,
            stroke_color,
            stroke_width,
        } = self.config;
        let (background, background_opacity) = svg_color(background_color);
        let (stroke, stroke_opacity) = svg_color(stroke_color);

        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = size.width,
            h = size.height,
        );
        let _ = writeln!(
            out,
            r#"  <rect width="100%" height="100%" fill="{background}" fill-opacity="{background_opacity}"/>"#,
        );

        for element in elements {
            let path = element.to_path();
            if path.elements().is_empty() {
                continue;
            }
            let _ = writeln!(
                out,
                r#"  <path data-id="{id}" data-type="{kind}" d="{d}" fill="none" stroke="{stroke}" stroke-opacity="{stroke_opacity}" stroke-width="{stroke_width}" stroke-linecap="round" stroke-linejoin="round"/>"#,
                id = element.id(),
                kind = element.kind(),
                d = path.to_svg(),
            );
        }

        out.push_str("</svg>\n");
        out
    }
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl Renderer for SvgRenderer {
    fn redraw(&mut self, elements: &[&Element]) {
        self.document = self.build_document(elements);
        self.frames += 1;
    }
}
