//! Shared renderer configuration and errors.

use kurbo::Size;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Surface settings applied to every redraw.
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    /// Surface size in pixels.
    pub size: Size,
    /// Background color.
    pub background_color: Color,
    /// Stroke color for every element.
    pub stroke_color: Color,
    /// Stroke width in pixels.
    pub stroke_width: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            size: Size::new(1280.0, 800.0),
            background_color: Color::from_rgba8(250, 250, 250, 255),
            stroke_color: Color::from_rgba8(30, 30, 30, 255),
            stroke_width: 2.0,
        }
    }
}

impl RenderConfig {
    /// Create a config for a surface of the given size.
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the stroke color and width.
    pub fn with_stroke(mut self, color: Color, width: f64) -> Self {
        self.stroke_color = color;
        self.stroke_width = width;
        self
    }
}

/// Format a color as `#rrggbb` plus its opacity in `0.0..=1.0`.
pub(crate) fn svg_color(color: Color) -> (String, f64) {
    let rgba = color.to_rgba8();
    (
        format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b),
        rgba.a as f64 / 255.0,
    )
}
