//! Ephemeral presence: remote cursors and the authority's view of this session.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::ids::UserId;

/// A remote user's pointer. Never persisted; overwritten on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub user_id: UserId,
    pub x: f64,
    pub y: f64,
}

impl Entity for Cursor {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.user_id
    }
}

/// Authoritative identity for the local session (`user-info`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
}
