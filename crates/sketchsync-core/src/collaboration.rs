//! Collaboration session for real-time multi-user drawing.
//!
//! Ties the board, the mutation engine and the reconciler to a relay
//! connection. Everything runs on the caller's thread: pointer input and
//! relay events are handled one at a time, and the renderer is asked to redraw
//! after every turn that changed the board.

use crate::board::Board;
use crate::reconcile::reconcile;
use crate::render::{NullRenderer, Renderer};
use crate::shapes::Element;
use crate::sync::{
    ClientMessage, ConnectionState, SyncError, SyncEvent, SyncMessage, Transport,
    decode_server_message, encode_client_message,
};
use crate::tools::{MutationEngine, MutationError, ToolKind};
use kurbo::Point;

/// Manages the local replica and its exchange with the relay.
pub struct CollaborationSession<R: Renderer = NullRenderer> {
    /// Local replica of the board.
    board: Board,
    /// Pointer interaction state machine.
    engine: MutationEngine,
    /// Render adapter.
    renderer: R,
    /// Whether local mutations are published.
    enabled: bool,
    /// Last known transport state.
    connection: ConnectionState,
    /// Current room (if joined).
    current_room: Option<String>,
    /// Our peer id as assigned by the relay.
    peer_id: Option<String>,
    /// Peers in the room, ourselves included.
    peer_count: usize,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    /// Board revision at the last redraw.
    drawn_revision: u64,
}

impl CollaborationSession<NullRenderer> {
    /// Create a session without a drawing surface.
    pub fn new() -> Self {
        Self::with_renderer(NullRenderer::new())
    }
}

impl Default for CollaborationSession<NullRenderer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Renderer> CollaborationSession<R> {
    /// Create a session that draws through `renderer`.
    pub fn with_renderer(renderer: R) -> Self {
        Self {
            board: Board::new(),
            engine: MutationEngine::new(),
            renderer,
            enabled: false,
            connection: ConnectionState::Disconnected,
            current_room: None,
            peer_id: None,
            peer_count: 0,
            outgoing: Vec::new(),
            drawn_revision: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn engine(&self) -> &MutationEngine {
        &self.engine
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn tool(&self) -> ToolKind {
        self.engine.tool()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.current_room.is_some()
    }

    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    // --- Local Input ---

    /// Select the active tool, finalizing any interaction in progress.
    pub fn set_tool(&mut self, tool: ToolKind) -> Result<(), MutationError> {
        let result = self.engine.set_tool(&mut self.board, tool);
        self.after_local(result)
    }

    pub fn pointer_down(&mut self, point: Point) -> Result<(), MutationError> {
        let result = self.engine.pointer_down(&mut self.board, point);
        self.after_local(result)
    }

    pub fn pointer_move(&mut self, point: Point) -> Result<(), MutationError> {
        let result = self.engine.pointer_move(&mut self.board, point);
        self.after_local(result)
    }

    pub fn pointer_up(&mut self) -> Result<(), MutationError> {
        let result = self.engine.pointer_up(&mut self.board);
        self.after_local(result)
    }

    fn after_local(
        &mut self,
        result: Result<Option<SyncMessage>, MutationError>,
    ) -> Result<(), MutationError> {
        // Aborted interactions may still have changed the board (cleared previews).
        let outcome = result.map(|emitted| {
            if let Some(message) = emitted {
                self.publish(message);
            }
        });
        self.redraw_if_changed();
        outcome
    }

    fn publish(&mut self, message: SyncMessage) {
        if !self.enabled || self.current_room.is_none() {
            return;
        }
        self.queue(&ClientMessage::Action { payload: message });
    }

    fn queue(&mut self, msg: &ClientMessage) {
        match encode_client_message(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to encode outgoing message: {}", e),
        }
    }

    // --- Room Management ---

    /// Request to join a room. Queues the join message.
    pub fn join_room(&mut self, room: &str) {
        self.queue(&ClientMessage::Join {
            room: room.to_string(),
        });
    }

    /// Request to leave the current room. Queues the leave message.
    pub fn leave_room(&mut self) {
        if self.current_room.take().is_some() {
            self.queue(&ClientMessage::Leave);
            self.peer_count = 0;
        }
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // --- Incoming ---

    /// Decode and handle one raw relay message.
    ///
    /// Malformed input is logged and dropped; the board is never touched.
    pub fn handle_message(&mut self, json: &str) -> Result<(), SyncError> {
        match decode_server_message(json) {
            Ok(event) => {
                self.handle_event(event);
                Ok(())
            }
            Err(e) => {
                log::warn!("Dropping relay message: {}", e);
                Err(e)
            }
        }
    }

    /// Handle one transport event.
    pub fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Connected => {
                log::info!("Connected to relay");
                self.connection = ConnectionState::Connected;
                self.enabled = true;
            }
            SyncEvent::Disconnected => {
                log::warn!("Disconnected from relay; continuing local-only");
                self.connection = ConnectionState::Disconnected;
                self.enabled = false;
                self.current_room = None;
                self.peer_count = 0;
                self.outgoing.clear();
            }
            SyncEvent::JoinedRoom {
                room,
                peer_id,
                peer_count,
            } => {
                log::info!("Joined room {} as {} ({} peers)", room, peer_id, peer_count);
                self.current_room = Some(room);
                self.peer_id = Some(peer_id);
                self.peer_count = peer_count;
                self.enabled = true;
            }
            SyncEvent::PeerJoined { peer_id } => {
                log::info!("Peer joined: {}", peer_id);
                self.peer_count += 1;
            }
            SyncEvent::PeerLeft { peer_id } => {
                log::info!("Peer left: {}", peer_id);
                self.peer_count = self.peer_count.saturating_sub(1);
            }
            SyncEvent::ActionReceived { from, message } => {
                log::debug!(
                    "{:?} for element {} from {}",
                    message.kind,
                    message.element.id(),
                    from
                );
                reconcile(&mut self.board, &message);
                self.redraw_if_changed();
            }
            SyncEvent::Error { message } => {
                log::error!("Relay error: {}", message);
            }
        }
    }

    // --- Transport ---

    /// Send all queued messages. Failures drop the message (no retry).
    pub fn flush<T: Transport>(&mut self, transport: &mut T) {
        for msg in self.take_outgoing() {
            if let Err(e) = transport.send(&msg) {
                log::warn!("Dropping outgoing message: {}", e);
            }
        }
    }

    /// One loop turn: apply received events, then send queued output.
    pub fn pump<T: Transport>(&mut self, transport: &mut T) {
        for event in transport.poll_events() {
            self.handle_event(event);
        }
        self.connection = transport.state();
        self.flush(transport);
    }

    // --- Rendering ---

    fn redraw_if_changed(&mut self) {
        if self.board.revision() != self.drawn_revision {
            self.redraw();
        }
    }

    /// Redraw the whole board.
    pub fn redraw(&mut self) {
        let elements: Vec<&Element> = self.board.visible().collect();
        self.renderer.redraw(&elements);
        self.drawn_revision = self.board.revision();
    }
}
