//! SketchSync Application
//!
//! Headless client shell: reads pointer commands from stdin, drives a
//! collaboration session against the relay and writes the board as SVG.

mod app;
mod command;
mod config;

pub use app::{App, AppError, Control};
pub use command::{Command, CommandError};
pub use config::AppConfig;
