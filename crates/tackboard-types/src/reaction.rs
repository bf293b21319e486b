//! Likes and comments attached to a memo.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::ids::{CommentId, LikeId, MemoId, UserId};

/// A like. The authority keeps at most one per (memo, user); the client
/// does not enforce that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: LikeId,
    pub memo_id: MemoId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub created_at: String,
}

impl Entity for Like {
    type Id = LikeId;

    fn id(&self) -> &LikeId {
        &self.id
    }
}

/// A comment. Append-only from the client's perspective, ordered by `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub memo_id: MemoId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

impl Entity for Comment {
    type Id = CommentId;

    fn id(&self) -> &CommentId {
        &self.id
    }
}
