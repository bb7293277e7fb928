//! Main application loop.

use crate::command::{Command, CommandError};
use crate::config::AppConfig;
use sketchsync_core::{CollaborationSession, MutationError, NativeWebSocket, SyncError, Transport};
use sketchsync_render::{RendererError, SvgRenderer};
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use thiserror::Error;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Render error: {0}")]
    Render(#[from] RendererError),
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
    #[error("Interaction error: {0}")]
    Mutation(#[from] MutationError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether the loop keeps running after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// The headless client.
pub struct App {
    config: AppConfig,
    session: CollaborationSession<SvgRenderer>,
    transport: NativeWebSocket,
    /// Renderer frame last written to disk.
    written_frame: Option<usize>,
}

impl App {
    /// Create the client and start connecting if a relay is configured.
    ///
    /// A relay that cannot be reached is not an error: the board keeps
    /// working locally and the loop logs the disconnect.
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let mut session = CollaborationSession::with_renderer(SvgRenderer::new(config.render_config()));
        session.set_tool(config.tool)?;

        let mut transport = NativeWebSocket::new();
        if let Some(url) = &config.server {
            log::info!("Connecting to {}", url);
            transport.connect(url)?;
            if let Some(room) = &config.room {
                // Queued until the socket thread is up.
                session.join_room(room);
            }
        } else {
            log::info!("No relay configured; drawing locally");
        }

        Ok(Self {
            config,
            session,
            transport,
            written_frame: None,
        })
    }

    pub fn session(&self) -> &CollaborationSession<SvgRenderer> {
        &self.session
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Apply one parsed command.
    pub fn apply(&mut self, command: Command, out: &mut impl Write) -> Result<Control, AppError> {
        let result = match command {
            Command::Tool(tool) => self.session.set_tool(tool),
            Command::Down(point) => self.session.pointer_down(point),
            Command::Move(point) => self.session.pointer_move(point),
            Command::Up => self.session.pointer_up(),
            Command::Join(room) => {
                if self.config.server.is_none() {
                    log::warn!("Cannot join {}: no relay configured", room);
                } else {
                    self.session.join_room(&room);
                }
                Ok(())
            }
            Command::Leave => {
                self.session.leave_room();
                Ok(())
            }
            Command::Dump => {
                self.dump(out)?;
                Ok(())
            }
            Command::Quit => return Ok(Control::Quit),
        };

        // Mutation errors abort the interaction but never the client.
        if let Err(e) = result {
            log::warn!("Interaction aborted: {}", e);
        }
        Ok(Control::Continue)
    }

    /// Parse and apply one input line.
    pub fn apply_line(&mut self, line: &str, out: &mut impl Write) -> Result<Control, AppError> {
        match line.parse::<Command>() {
            Ok(command) => self.apply(command, out),
            Err(CommandError::Empty) => Ok(Control::Continue),
            Err(e) => {
                log::warn!("{}", e);
                Ok(Control::Continue)
            }
        }
    }

    /// Write every element as one JSON line.
    fn dump(&self, out: &mut impl Write) -> Result<(), AppError> {
        for element in self.session.board().elements() {
            match serde_json::to_string(element) {
                Ok(json) => writeln!(out, "{}", json)?,
                Err(e) => log::error!("Failed to encode element {}: {}", element.id(), e),
            }
        }
        out.flush()?;
        Ok(())
    }

    /// One loop turn: exchange messages with the relay and save the board if
    /// it was redrawn.
    pub fn tick(&mut self) -> Result<(), AppError> {
        if self.config.server.is_some() {
            self.session.pump(&mut self.transport);
        }
        self.save_if_redrawn()
    }

    fn save_if_redrawn(&mut self) -> Result<(), AppError> {
        let frame = self.session.renderer().frames();
        if self.written_frame == Some(frame) {
            return Ok(());
        }
        self.session.renderer().write_to(&self.config.output)?;
        self.written_frame = Some(frame);
        Ok(())
    }

    /// Run until `quit` or end of input.
    pub fn run(mut self) -> Result<(), AppError> {
        let lines = spawn_stdin_reader();
        let tick = self.config.tick();
        let stdout = std::io::stdout();

        log::info!(
            "Ready (tool: {}, output: {})",
            self.session.tool(),
            self.config.output.display()
        );

        'main: loop {
            loop {
                match lines.try_recv() {
                    Ok(line) => {
                        if self.apply_line(&line, &mut stdout.lock())? == Control::Quit {
                            break 'main;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::info!("Input closed");
                        break 'main;
                    }
                }
            }

            self.tick()?;
            thread::sleep(tick);
        }

        // Deliver anything queued by the last commands.
        self.tick()?;
        if self.transport.is_connected() {
            self.transport.disconnect();
        }
        log::info!("Board saved to {}", self.config.output.display());
        Ok(())
    }
}

/// Forward stdin lines to the main loop.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
