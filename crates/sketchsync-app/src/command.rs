//! Line-oriented input commands.

use kurbo::Point;
use sketchsync_core::{ToolKind, UnknownTool};
use std::str::FromStr;
use thiserror::Error;

/// One line of stdin input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `tool <name>`
    Tool(ToolKind),
    /// `down <x> <y>`
    Down(Point),
    /// `move <x> <y>`
    Move(Point),
    /// `up`
    Up,
    /// `join <room>`
    Join(String),
    /// `leave`
    Leave,
    /// `dump`: print the board as JSON lines
    Dump,
    /// `quit`
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid coordinate: {0}")]
    Coordinate(String),
    #[error(transparent)]
    Tool(#[from] UnknownTool),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Empty);
        };
        let args: Vec<&str> = words.collect();

        match (name, args.as_slice()) {
            ("tool", [tool]) => Ok(Command::Tool(tool.parse()?)),
            ("tool", _) => Err(CommandError::Usage("tool <name>")),
            ("down", [x, y]) => Ok(Command::Down(point(x, y)?)),
            ("down", _) => Err(CommandError::Usage("down <x> <y>")),
            ("move", [x, y]) => Ok(Command::Move(point(x, y)?)),
            ("move", _) => Err(CommandError::Usage("move <x> <y>")),
            ("up", []) => Ok(Command::Up),
            ("join", [room]) => Ok(Command::Join(room.to_string())),
            ("join", _) => Err(CommandError::Usage("join <room>")),
            ("leave", []) => Ok(Command::Leave),
            ("dump", []) => Ok(Command::Dump),
            ("quit" | "exit", []) => Ok(Command::Quit),
            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn point(x: &str, y: &str) -> Result<Point, CommandError> {
    Ok(Point::new(coordinate(x)?, coordinate(y)?))
}

fn coordinate(raw: &str) -> Result<f64, CommandError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::Coordinate(raw.to_string()))
}
