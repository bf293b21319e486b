//! Outbound intent vocabulary.
//!
//! Every mutation the client asks of the authority is one [`ClientIntent`].
//! Intents are fire-and-forget: the authority answers, if at all, with a
//! delta or snapshot on the inbound stream.

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use tackboard_types::{BoardId, MemoId, SubjectId, Theme};

use crate::events::{MemoContent, MemoPosition, ProtocolError};

/// First frame on every opened channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    /// Elevated-session credential; absent for anonymous channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<String>,
}

/// Request to create a memo. The authority assigns the id and echoes `new-memo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemo {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub x: f64,
    pub y: f64,
    pub board_id: BoardId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// Request to create a board (elevated sessions only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoard {
    pub name: String,
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subject_id: SubjectId,
}

/// A comment to append to a memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentMemo {
    pub memo_id: MemoId,
    pub content: String,
}

/// Local pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorMove {
    pub x: f64,
    pub y: f64,
}

/// Intents sent from the client to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ClientIntent {
    Hello(Hello),
    CreateMemo(CreateMemo),
    UpdateMemoPosition(MemoPosition),
    UpdateMemoContent(MemoContent),
    DeleteMemo(MemoId),
    CreateBoard(CreateBoard),
    DeleteBoard(BoardId),
    SwitchBoard(BoardId),
    AdminDeleteMemo(MemoId),
    AdminClearAllMemos(BoardId),
    LikeMemo(MemoId),
    CommentMemo(CommentMemo),
    GetMemoLikes(MemoId),
    GetMemoComments(MemoId),
    CursorMove(CursorMove),
}

impl ClientIntent {
    /// Encode as one wire frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decode one wire frame (used by authorities and test peers).
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }

    /// Wire name of this intent, for logging.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}
