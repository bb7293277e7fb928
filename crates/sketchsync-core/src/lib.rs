//! SketchSync Core Library
//!
//! Shared-canvas synchronization: the element model, the local mutation
//! engine, the replica reconciler and the relay transport.

pub mod board;
pub mod collaboration;
pub mod reconcile;
pub mod render;
pub mod shapes;
pub mod sync;
pub mod tools;

pub use board::{Board, Upsert};
pub use collaboration::CollaborationSession;
pub use reconcile::{reconcile, reconcile_json};
pub use render::{NullRenderer, Renderer};
pub use shapes::{Element, ElementError, ElementId, ElementKind, Geometry, make_element};
pub use sync::{
    ClientMessage, ConnectionState, NativeWebSocket, ServerMessage, SyncError, SyncEvent,
    SyncKind, SyncMessage, Transport,
};
pub use tools::{InteractionState, MutationEngine, MutationError, ToolKind, UnknownTool};
