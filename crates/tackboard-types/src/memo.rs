//! Memo: a sticky note placed on a board.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::ids::{BoardId, MemoId, UserId};

/// Card swatches offered when creating a memo. The first is the default.
pub const MEMO_PALETTE: [&str; 8] = [
    "#FFE4B5", // moccasin
    "#E0F6FF", // pale blue
    "#F0FFF0", // honeydew
    "#FFE4E1", // misty rose
    "#F5DEB3", // wheat
    "#E6E6FA", // lavender
    "#FFFACD", // lemon chiffon
    "#F0F8FF", // alice blue
];

fn default_color() -> String {
    MEMO_PALETTE[0].to_string()
}

/// A memo. Content and position are the only fields that change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    pub id: MemoId,
    /// May be empty while an edit is pending.
    #[serde(default)]
    pub content: String,
    /// Opaque URL produced by the upload collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_color")]
    pub color: String,
    pub board_id: BoardId,
    #[serde(default)]
    pub created_at: String,
    /// Session id of the originating connection.
    #[serde(default)]
    pub created_by: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl Memo {
    pub fn new(id: impl Into<MemoId>, board_id: impl Into<BoardId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            image: None,
            x: 0.0,
            y: 0.0,
            color: default_color(),
            board_id: board_id.into(),
            created_at: String::new(),
            created_by: UserId::default(),
            user_name: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn created_by(mut self, user: impl Into<UserId>) -> Self {
        self.created_by = user.into();
        self
    }

    /// Author label: the chosen name, else "User" plus the session id suffix.
    pub fn display_name(&self) -> String {
        match self.user_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("User {}", self.created_by.short()),
        }
    }

    /// Whether `user` created this memo.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        !user.is_empty() && self.created_by == *user
    }
}

impl Entity for Memo {
    type Id = MemoId;

    fn id(&self) -> &MemoId {
        &self.id
    }
}
