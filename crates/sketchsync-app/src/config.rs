//! Command-line and environment configuration.

use clap::Parser;
use kurbo::Size;
use sketchsync_core::ToolKind;
use sketchsync_render::RenderConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Headless SketchSync client
#[derive(Parser, Debug, Clone)]
#[command(name = "sketchsync")]
#[command(version)]
#[command(about = "Collaborative sketch board client driven from stdin", long_about = None)]
pub struct AppConfig {
    /// Relay WebSocket URL, e.g. ws://localhost:3030/ws
    #[arg(long, env = "SKETCHSYNC_SERVER")]
    pub server: Option<String>,

    /// Room to join once connected
    #[arg(long, env = "SKETCHSYNC_ROOM")]
    pub room: Option<String>,

    /// Where to write the rendered board
    #[arg(long, short, env = "SKETCHSYNC_OUTPUT", default_value = "board.svg")]
    pub output: PathBuf,

    /// Initial tool
    #[arg(long, default_value_t = ToolKind::Line)]
    pub tool: ToolKind,

    /// Surface width in pixels
    #[arg(long, default_value_t = 1280.0)]
    pub width: f64,

    /// Surface height in pixels
    #[arg(long, default_value_t = 800.0)]
    pub height: f64,

    /// Main loop period in milliseconds
    #[arg(long, default_value_t = 16)]
    pub tick_ms: u64,
}

impl AppConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig::new(Size::new(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let config = AppConfig::parse_from([
            "sketchsync",
            "--server",
            "ws://127.0.0.1:3030/ws",
            "--room",
            "demo",
            "--tool",
            "rect",
            "-o",
            "out.svg",
            "--tick-ms",
            "0",
        ]);
        assert_eq!(config.server.as_deref(), Some("ws://127.0.0.1:3030/ws"));
        assert_eq!(config.room.as_deref(), Some("demo"));
        assert_eq!(config.tool, ToolKind::Rectangle);
        assert_eq!(config.output, PathBuf::from("out.svg"));
        assert_eq!(config.tick(), Duration::from_millis(1));
    }

    #[test]
    fn test_unknown_tool_rejected() {
        assert!(AppConfig::try_parse_from(["sketchsync", "--tool", "spray"]).is_err());
    }

    #[test]
    fn test_render_config_uses_size() {
        let config = AppConfig::parse_from(["sketchsync", "--width", "300", "--height", "200"]);
        assert_eq!(config.render_config().size, Size::new(300.0, 200.0));
    }
}
