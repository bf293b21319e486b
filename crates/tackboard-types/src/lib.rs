//! Shared entity types for tackboard.
//!
//! This crate is the data foundation: typed ids and the shared collections a
//! board client caches. It has **no internal tackboard dependencies**; it is a pure
//! leaf crate that the client builds on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Subject (SubjectId) ← server-owned, immutable on the client
//!     └── groups Board (BoardId, theme, subject_id)
//!             └── holds Memo (MemoId, board_id, x/y, created_by)
//!                     └── Like (LikeId, memo_id, user_id)
//!                     └── Comment (CommentId, memo_id, created_at order)
//!
//! User (UserId) ← one per connection session, assigned by the authority
//!     └── authors Memo / Like / Comment
//!     └── moves a Cursor (ephemeral, keyed by UserId)
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`Subject`]       | Top of the scope hierarchy (name + icon)     |
//! | [`Board`]         | Themed memo surface inside a subject         |
//! | [`Memo`]          | Sticky note with layout coordinates          |
//! | [`Like`]          | One user's like on a memo                    |
//! | [`Comment`]       | Append-only remark on a memo                 |
//! | [`Cursor`]        | Remote pointer position                      |
//! | [`UserInfo`]      | Authority's view of the local session        |
//! | [`Entity`]        | Anything cached by id                        |
//! |-------------------|----------------------------------------------|

pub mod board;
pub mod entity;
pub mod ids;
pub mod memo;
pub mod presence;
pub mod reaction;
pub mod subject;

// Re-export primary types at crate root for convenience.
pub use board::{Board, Theme};
pub use entity::Entity;
pub use ids::{BoardId, CommentId, LikeId, MemoId, SubjectId, UserId};
pub use memo::{MEMO_PALETTE, Memo};
pub use presence::{Cursor, UserInfo};
pub use reaction::{Comment, Like};
pub use subject::Subject;
