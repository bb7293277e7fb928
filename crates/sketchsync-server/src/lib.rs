//! SketchSync WebSocket Relay
//!
//! Routes board actions between clients in the same room. The relay never
//! inspects action payloads; it only stamps them with the sender's peer id.
//!
//! ## Protocol
//!
//! Client to server:
//! ```json
//! { "type": "join", "room": "room-id" }
//! { "type": "leave" }
//! { "type": "action", "payload": { "kind": "create", "element": { ... } } }
//! ```
//!
//! Server to client:
//! ```json
//! { "type": "joined", "room": "room-id", "peer_id": "...", "peer_count": 2 }
//! { "type": "peer_joined", "peer_id": "..." }
//! { "type": "peer_left", "peer_id": "..." }
//! { "type": "action", "from": "...", "payload": { ... } }
//! { "type": "error", "message": "..." }
//! ```

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::broadcast};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Relay configuration, read from `SKETCHSYNC_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (`SKETCHSYNC_ADDR`).
    pub addr: SocketAddr,
    /// Deliver actions back to their sender too (`SKETCHSYNC_ECHO`).
    pub echo: bool,
    /// Per-room broadcast buffer (`SKETCHSYNC_CHANNEL_CAPACITY`).
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3030)),
            echo: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the environment. Unparseable values fall
    /// back to their defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            addr: parse_or("SKETCHSYNC_ADDR", lookup("SKETCHSYNC_ADDR"), defaults.addr),
            echo: lookup("SKETCHSYNC_ECHO")
                .map(|value| parse_flag(&value, defaults.echo))
                .unwrap_or(defaults.echo),
            channel_capacity: parse_or(
                "SKETCHSYNC_CHANNEL_CAPACITY",
                lookup("SKETCHSYNC_CHANNEL_CAPACITY"),
                defaults.channel_capacity,
            )
            .max(1),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        other => {
            warn!("Ignoring invalid SKETCHSYNC_ECHO={:?}", other);
            default
        }
    }
}

/// A message sent by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room
    Join { room: String },
    /// Leave current room
    Leave,
    /// Board action; relayed untouched
    Action { payload: serde_json::Value },
}

/// A message sent to clients
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
    /// Action from a peer
    Action {
        from: String,
        payload: serde_json::Value,
    },
    /// Error message
    Error { message: String },
}

impl ServerMessage {
    fn to_ws(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                warn!("Failed to encode server message: {}", e);
                None
            }
        }
    }
}

type RoomEvent = (String, ServerMessage);

/// Room state
struct Room {
    tx: broadcast::Sender<RoomEvent>,
    peers: HashSet<String>,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Shared relay state
pub struct AppState {
    config: ServerConfig,
    rooms: DashMap<String, Room>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of rooms with at least one peer.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of peers in a room.
    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peers.len())
    }

    /// Add peer to room
    fn join_room(&self, room_id: &str, peer_id: &str) -> (broadcast::Receiver<RoomEvent>, usize) {
        let capacity = self.config.channel_capacity;
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(capacity));
        room.peers.insert(peer_id.to_string());
        (room.tx.subscribe(), room.peers.len())
    }

    /// Remove peer from room, dropping the room once empty
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
        }
        // Emptiness is re-checked under the shard lock; a peer that joined
        // in between keeps the room alive.
        self.rooms.remove_if(room_id, |_, room| room.peers.is_empty());
    }

    fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    fn leave_and_announce(&self, room_id: &str, peer_id: &str) {
        self.leave_room(room_id, peer_id);
        self.broadcast(
            room_id,
            peer_id,
            ServerMessage::PeerLeft {
                peer_id: peer_id.to_string(),
            },
        );
        info!("Peer {} left room {}", peer_id, room_id);
    }

    /// Whether a room event should reach `peer_id`. Membership notices never
    /// go back to their subject; actions do when echo is enabled.
    fn should_deliver(&self, peer_id: &str, from: &str, msg: &ServerMessage) -> bool {
        from != peer_id || (self.config.echo && matches!(msg, ServerMessage::Action { .. }))
    }
}

/// Build the relay router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until the process exits.
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.addr).await?;
    serve_on(listener, config).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: TcpListener, config: ServerConfig) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!("SketchSync relay listening on {} (echo: {})", addr, config.echo);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let app = build_router(Arc::new(AppState::new(config)));
    axum::serve(listener, app).await
}

/// Index page
async fn index() -> &'static str {
    "SketchSync Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_room: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<RoomEvent>> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(_))) => {
                        let err = ServerMessage::Error {
                            message: "Binary frames are not supported".to_string(),
                        };
                        if let Some(reply) = err.to_ws() {
                            let _ = sender.send(reply).await;
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                };

                let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => client_msg,
                    Err(e) => {
                        warn!("Invalid message from {}: {}", peer_id, e);
                        let err = ServerMessage::Error {
                            message: format!("Invalid message: {}", e),
                        };
                        if let Some(reply) = err.to_ws() {
                            let _ = sender.send(reply).await;
                        }
                        continue;
                    }
                };

                match client_msg {
                    ClientMessage::Join { room } => {
                        if let Some(old_room) = current_room.take() {
                            state.leave_and_announce(&old_room, &peer_id);
                        }

                        let (rx, peer_count) = state.join_room(&room, &peer_id);
                        room_rx = Some(rx);
                        current_room = Some(room.clone());

                        let joined = ServerMessage::Joined {
                            room: room.clone(),
                            peer_id: peer_id.clone(),
                            peer_count,
                        };
                        if let Some(reply) = joined.to_ws() {
                            if sender.send(reply).await.is_err() {
                                break;
                            }
                        }

                        state.broadcast(&room, &peer_id, ServerMessage::PeerJoined {
                            peer_id: peer_id.clone(),
                        });
                        info!("Peer {} joined room {} ({} peers)", peer_id, room, peer_count);
                    }
                    ClientMessage::Leave => {
                        if let Some(room) = current_room.take() {
                            state.leave_and_announce(&room, &peer_id);
                        }
                        room_rx = None;
                    }
                    ClientMessage::Action { payload } => match current_room {
                        Some(ref room) => {
                            state.broadcast(room, &peer_id, ServerMessage::Action {
                                from: peer_id.clone(),
                                payload,
                            });
                        }
                        None => {
                            debug!("Dropping action from {}: not in a room", peer_id);
                            let err = ServerMessage::Error {
                                message: "Join a room before sending actions".to_string(),
                            };
                            if let Some(reply) = err.to_ws() {
                                let _ = sender.send(reply).await;
                            }
                        }
                    },
                }
            }

            event = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match event {
                    Ok((from, server_msg)) => {
                        if !state.should_deliver(&peer_id, &from, &server_msg) {
                            continue;
                        }
                        if let Some(out) = server_msg.to_ws() {
                            if sender.send(out).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Peer {} lagged behind, skipped {} messages", peer_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        room_rx = None;
                    }
                }
            }
        }
    }

    if let Some(room) = current_room {
        state.leave_and_announce(&room, &peer_id);
    }
    info!("Connection closed: {}", peer_id);
}
