//! Tackboard client library
//!
//! Keeps a local, optimistic view of a shared memo board in sync with one
//! authoritative peer over a reconnecting channel, and lays memos out on a
//! responsive grid.
//!
//! Start with [`SyncedBoard`], or wire the pieces yourself: [`connect`] for the
//! channel, [`Reconciler`] for the state.

pub mod actor;
pub mod cache;
pub mod config;
pub mod constants;
pub mod events;
pub mod intents;
pub mod layout;
pub mod scope;
pub mod session;
pub mod sync;
pub mod synced_board;
pub mod transport;

pub use actor::{
    ConnectError, ConnectOptions, ConnectionEvents, ConnectionHandle, ReconnectPolicy, connect,
};
pub use cache::{Cached, Collection, CollectionKind, EntityCache, Upsert};
pub use config::{ClientConfig, ConfigError, ReconnectConfig};
pub use events::{
    ConnectionEvent, ConnectionStatus, MemoComments, MemoContent, MemoLikes, MemoPosition,
    ProtocolError, ServerEvent,
};
pub use intents::{ClientIntent, CommentMemo, CreateBoard, CreateMemo, CursorMove, Hello};
pub use layout::{DeviceClass, LayoutConfig, LayoutEngine, LayoutError, PlacementMode, Position, place};
pub use scope::{Prompt, Scope, ScopeError, ScopeMachine};
pub use session::{ElevationPolicy, SessionContext, SessionIdentity};
pub use sync::{MemoDraft, Reconciler, SkipReason, SyncEffect};
pub use synced_board::SyncedBoard;
pub use transport::{
    Channel, MemoryAuthority, MemoryPeer, MemoryTransport, TcpTransport, Transport, TransportError,
};
