//! Relay protocol and WebSocket transport.
//!
//! Board mutations travel as [`SyncMessage`]s wrapped in a small relay
//! envelope. The relay never looks inside the payload; only clients decode it.

use crate::shapes::Element;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of board mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Create,
    Update,
}

/// One board mutation: always the complete element, never a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub kind: SyncKind,
    pub element: Element,
}

impl SyncMessage {
    pub fn create(element: Element) -> Self {
        Self {
            kind: SyncKind::Create,
            element,
        }
    }

    pub fn update(element: Element) -> Self {
        Self {
            kind: SyncKind::Update,
            element,
        }
    }
}

/// Messages sent to the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room
    Join { room: String },
    /// Leave current room
    Leave,
    /// Publish a board mutation to the room
    Action { payload: SyncMessage },
}

/// Messages received from the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join
    Joined {
        room: String,
        peer_id: String,
        peer_count: usize,
    },
    /// Peer joined the room
    PeerJoined { peer_id: String },
    /// Peer left the room
    PeerLeft { peer_id: String },
    /// Board mutation relayed from a peer (possibly ourselves)
    Action { from: String, payload: SyncMessage },
    /// Error message
    Error { message: String },
}

/// Sync errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Not connected")]
    Disconnected,
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Send failed: {0}")]
    Send(String),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the transport
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to the relay
    Connected,
    /// Connection lost or closed
    Disconnected,
    /// Joined a room
    JoinedRoom {
        room: String,
        peer_id: String,
        peer_count: usize,
    },
    /// A peer joined the room
    PeerJoined { peer_id: String },
    /// A peer left the room
    PeerLeft { peer_id: String },
    /// A board mutation arrived
    ActionReceived { from: String, message: SyncMessage },
    /// Error occurred
    Error { message: String },
}

impl From<ServerMessage> for SyncEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Joined {
                room,
                peer_id,
                peer_count,
            } => SyncEvent::JoinedRoom {
                room,
                peer_id,
                peer_count,
            },
            ServerMessage::PeerJoined { peer_id } => SyncEvent::PeerJoined { peer_id },
            ServerMessage::PeerLeft { peer_id } => SyncEvent::PeerLeft { peer_id },
            ServerMessage::Action { from, payload } => SyncEvent::ActionReceived {
                from,
                message: payload,
            },
            ServerMessage::Error { message } => SyncEvent::Error { message },
        }
    }
}

/// Decode one relay text frame into an event.
pub fn decode_server_message(text: &str) -> Result<SyncEvent, SyncError> {
    serde_json::from_str::<ServerMessage>(text)
        .map(SyncEvent::from)
        .map_err(|e| SyncError::MalformedMessage(e.to_string()))
}

/// Encode a client message for the wire.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, SyncError> {
    serde_json::to_string(msg).map_err(|e| SyncError::MalformedMessage(e.to_string()))
}

/// A duplex channel to the relay.
///
/// `send` is fire-and-forget. Inbound traffic is collected by the transport's
/// I/O context and handed to the caller's loop through `poll_events`, so all
/// board mutation stays on one thread.
pub trait Transport {
    /// Queue a text frame for delivery.
    fn send(&mut self, msg: &str) -> Result<(), SyncError>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

const LOG_PREFIX_LEN: usize = 100;

/// At most `max` bytes of `text`, cut on a char boundary.
fn log_prefix(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let end = (0..=max).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    &text[..end]
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeWebSocket {
        state: ConnectionState,
        events: Vec<SyncEvent>,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<SyncEvent>>,
        /// Handle to the WebSocket thread.
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a relay.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }

            let parsed_url = Url::parse(url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(SyncError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed_url.scheme()
                )));
            }

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();

            let url = url.to_string();

            let handle = thread::spawn(move || run_socket(url, cmd_rx, event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the relay.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Socket loop run on the I/O thread.
    fn run_socket(url: String, cmd_rx: Receiver<WsCommand>, event_tx: Sender<SyncEvent>) {
        log::info!("WebSocket thread: connecting to {}", url);

        let (mut socket, response) = match connect(&url) {
            Ok(ok) => ok,
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(SyncEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                let _ = event_tx.send(SyncEvent::Disconnected);
                return;
            }
        };

        log::info!("WebSocket connected, status: {}", response.status());
        let _ = event_tx.send(SyncEvent::Connected);

        // Short read timeout keeps the loop responsive to outgoing commands.
        match socket.get_mut() {
            tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
            }
            #[allow(unreachable_patterns)]
            _ => {
                log::debug!("TLS or other stream - using default timeout handling");
            }
        }

        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    log::debug!("WebSocket sending: {}", log_prefix(&msg, LOG_PREFIX_LEN));
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("WebSocket send error: {}", e);
                        break;
                    }
                }
                Ok(WsCommand::Close) => {
                    log::info!("WebSocket close requested");
                    let _ = socket.close(None);
                    break;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(txt)) => {
                    log::debug!("WebSocket received: {}", log_prefix(&txt, LOG_PREFIX_LEN));
                    match decode_server_message(&txt) {
                        Ok(event) => {
                            let _ = event_tx.send(event);
                        }
                        Err(e) => log::warn!("Dropping relay frame: {}", e),
                    }
                }
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    break;
                }
                Ok(_) => {} // Ignore binary, pong
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    break;
                }
            }
        }

        log::info!("WebSocket thread exiting");
        let _ = event_tx.send(SyncEvent::Disconnected);
    }

    impl Transport for NativeWebSocket {
        fn send(&mut self, msg: &str) -> Result<(), SyncError> {
            if self.state == ConnectionState::Disconnected {
                return Err(SyncError::Disconnected);
            }
            match self.cmd_tx {
                Some(ref tx) => tx
                    .send(WsCommand::Send(msg.to_string()))
                    .map_err(|e| SyncError::Send(format!("socket thread stopped: {}", e))),
                None => Err(SyncError::Disconnected),
            }
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let mut closed = false;
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => {
                            self.state = ConnectionState::Disconnected;
                            closed = true;
                        }
                        SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                        _ => {}
                    }
                    self.events.push(event);
                }
            }

            // No reconnect: drop the dead channels so a later connect() starts fresh.
            if closed {
                self.cmd_tx = None;
                self.event_rx = None;
                self._thread = None;
            }

            std::mem::take(&mut self.events)
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

pub use native_client::NativeWebSocket;
