//! Inbound event vocabulary and connection lifecycle signals.
//!
//! Provides [`ServerEvent`], a closed enum of everything the authority pushes
//! to the client, and [`ConnectionStatus`] for connection lifecycle tracking.
//! Both travel to the consumer on one ordered stream as [`ConnectionEvent`]s,
//! so a `Connected` signal is always observed before the snapshot that follows it.
//!
//! Frames are decoded exactly once, at the channel boundary:
//!
//! ```text
//! {"event":"memo-position-updated","data":{"id":"m1","x":40,"y":60}}
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use tackboard_types::{
    Board, BoardId, Comment, Cursor, Like, Memo, MemoId, Subject, UserId, UserInfo,
};
use thiserror::Error;

// ============================================================================
// Payloads
// ============================================================================

/// New coordinates for a memo (inbound update and outbound intent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoPosition {
    pub id: MemoId,
    pub x: f64,
    pub y: f64,
}

/// New text for a memo (inbound update and outbound intent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoContent {
    pub id: MemoId,
    pub content: String,
}

/// Every like on one memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoLikes {
    pub memo_id: MemoId,
    #[serde(default)]
    pub likes: Vec<Like>,
}

/// Every comment on one memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoComments {
    pub memo_id: MemoId,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

// ============================================================================
// Event Types
// ============================================================================

/// Events pushed from the authority to the client.
///
/// `all-*` variants are snapshots (full replace of a collection); everything
/// else is a delta against one entity or a presence/session signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ServerEvent {
    AllSubjects(Vec<Subject>),
    AllBoards(Vec<Board>),
    AllMemos(Vec<Memo>),
    BoardCreated(Board),
    BoardDeleted(BoardId),
    NewMemo(Memo),
    MemoDeleted(MemoId),
    MemoPositionUpdated(MemoPosition),
    MemoContentUpdated(MemoContent),
    NewLike(Like),
    NewComment(Comment),
    MemoLikes(MemoLikes),
    MemoComments(MemoComments),
    UserCursor(Cursor),
    UserDisconnected(UserId),
    UserCount(u32),
    UserInfo(UserInfo),
    /// Untyped failure report from the authority. Logged, never acted on.
    Error(serde_json::Value),
}

impl ServerEvent {
    /// Decode one wire frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }

    /// Encode as one wire frame (used by authorities and test peers).
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Whether this event replaces a whole collection.
    pub fn is_snapshot(&self) -> bool {
        matches!(
            self,
            ServerEvent::AllSubjects(_) | ServerEvent::AllBoards(_) | ServerEvent::AllMemos(_)
        )
    }
}

/// Connection lifecycle status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Opening the channel (initial connect or explicit re-initiation).
    Connecting,
    Connected,
    /// The channel dropped unexpectedly; a reconnect cycle follows.
    Disconnected,
    /// Waiting `delay` before reconnect attempt number `attempt` (1-based).
    Reconnecting { attempt: u32, delay: Duration },
    /// Every attempt failed. Call `reconnect()` to start over.
    Exhausted { attempts: u32 },
    /// Explicit teardown. Terminal.
    Closed,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// One item on the ordered stream handed to the consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    Status(ConnectionStatus),
    Server(ServerEvent),
}

/// Errors at the framing/serialization boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}
