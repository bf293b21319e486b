//! Reconciliation: merging server events into the cache and turning user
//! actions into intents.
//!
//! [`Reconciler`] is the only mutator of the [`EntityCache`]. It owns the
//! cache, the [`SessionContext`] and the [`LayoutEngine`], and is driven from
//! two directions:
//!
//! ```text
//!   ServerEvent ──apply()──▶ cache ──reflow──▶ positions
//!   user action ──move_memo()/…──▶ optimistic cache write ──▶ Option<ClientIntent>
//! ```
//!
//! # Merge policy
//!
//! - `all-*` snapshots replace the whole collection.
//! - Deltas upsert or remove by id. Applying the same delta twice is a no-op,
//!   so the authority echoing our own optimistic change back is harmless.
//! - Last delta applied wins. The authority's delivery order is the only
//!   ordering signal.
//! - Position and content updates for a memo we do not have are ignored
//!   (`Ignored(UnknownEntity)`), never inserted as partial memos.
//! - There is no rollback. A rejected optimistic change stays until the next
//!   delta or snapshot overwrites it.
//!
//! # Local validation
//!
//! Intent methods return `None` (and log at debug) instead of failing when
//! the action is not allowed: no board selected, not the owner, not an
//! admin, empty comment, unknown memo.

use tackboard_types::{
    Board, BoardId, Comment, Cursor, Like, MEMO_PALETTE, Memo, MemoId, Subject, SubjectId, Theme,
};
use tracing::{debug, info, trace, warn};

use crate::cache::{Cached, CollectionKind, EntityCache};
use crate::events::{ConnectionEvent, ConnectionStatus, MemoContent, MemoPosition, ServerEvent};
use crate::intents::{ClientIntent, CommentMemo, CreateBoard, CreateMemo, CursorMove};
use crate::layout::{LayoutEngine, PlacementMode, Position};
use crate::scope::{Prompt, ScopeError};
use crate::session::SessionContext;

/// What applying one server event did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEffect {
    /// A collection was replaced wholesale.
    Snapshot { kind: CollectionKind, count: usize },
    /// One entity, or one memo's reactions, was inserted or changed.
    Updated { kind: CollectionKind },
    /// Entities were removed. `count` includes cascaded memos.
    Removed { kind: CollectionKind, count: usize },
    /// Cursors or the user count changed.
    Presence,
    /// The authority confirmed or changed this session's identity.
    Identity { is_admin: bool },
    /// The authority reported an error. No state changed.
    RemoteError(serde_json::Value),
    /// Nothing changed (see reason).
    Ignored(SkipReason),
}

/// Reason why an event changed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The event names an entity that is not cached.
    UnknownEntity { kind: CollectionKind, id: String },
    /// Our own cursor, echoed back.
    OwnCursor,
}

impl SyncEffect {
    fn unknown<T: Cached>(id: &T::Id) -> Self
    where
        T::Id: AsRef<str>,
    {
        SyncEffect::Ignored(SkipReason::UnknownEntity {
            kind: T::KIND,
            id: id.as_ref().to_string(),
        })
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, SyncEffect::Ignored(_))
    }
}

/// Fields of a new memo. Coordinates only matter in free-drag mode.
#[derive(Debug, Clone, Default)]
pub struct MemoDraft {
    pub content: String,
    pub image: Option<String>,
    pub color: Option<String>,
    pub at: Option<Position>,
}

impl MemoDraft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// The client's synchronized view of the board, plus the rules that keep it so.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    cache: EntityCache,
    session: SessionContext,
    layout: LayoutEngine,
    status: Option<ConnectionStatus>,
    user_count: u32,
    /// Bumped on every event or action that changed something.
    version: u64,
}

impl Reconciler {
    pub fn new(session: SessionContext, layout: LayoutEngine) -> Self {
        Self {
            cache: EntityCache::new(),
            session,
            layout,
            status: None,
            user_count: 0,
            version: 0,
        }
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn status(&self) -> Option<&ConnectionStatus> {
        self.status.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.status.as_ref().is_some_and(ConnectionStatus::is_connected)
    }

    pub fn user_count(&self) -> u32 {
        self.user_count
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_admin()
    }

    pub fn prompt(&self) -> Prompt {
        self.session.prompt()
    }

    pub fn current_board(&self) -> Option<&Board> {
        let id = self.session.scope().board()?;
        self.cache.get::<Board>(id)
    }

    /// Memos of the selected board in layout order. Empty with no board.
    pub fn visible_memos(&self) -> Vec<&Memo> {
        match self.session.scope().board() {
            Some(board) => self.cache.memos_in_board(board),
            None => Vec::new(),
        }
    }

    /// Boards offered for the selected subject.
    pub fn board_choices(&self) -> Vec<&Board> {
        match self.session.scope().subject() {
            Some(subject) => self.cache.boards_for_subject(subject),
            None => Vec::new(),
        }
    }

    /// Remote cursors (never our own).
    pub fn cursors(&self) -> Vec<&Cursor> {
        self.cache.query::<Cursor, _>(|_| true)
    }

    // =========================================================================
    // Apply incoming events
    // =========================================================================

    /// Feed one item from the connection's event stream.
    pub fn apply_connection_event(&mut self, event: &ConnectionEvent) -> Option<SyncEffect> {
        match event {
            ConnectionEvent::Status(status) => {
                self.apply_status(status);
                None
            }
            ConnectionEvent::Server(event) => Some(self.apply(event)),
        }
    }

    /// Track connection lifecycle. Dropping the channel clears presence; the
    /// entity caches stay until the next snapshot replaces them.
    pub fn apply_status(&mut self, status: &ConnectionStatus) {
        if *status == ConnectionStatus::Disconnected {
            let cursors = self.cache.collection::<Cursor>().len();
            self.cache.upsert_many::<Cursor>(Vec::new());
            self.user_count = 0;
            self.session.reset_to_local();
            info!(cursors, "channel dropped, presence cleared");
            self.version += 1;
        }
        self.status = Some(status.clone());
    }

    /// Apply a single server event. This is the primary consumer API.
    pub fn apply(&mut self, event: &ServerEvent) -> SyncEffect {
        let effect = self.merge(event);
        match &effect {
            SyncEffect::Ignored(reason) => {
                debug!(event = event.name(), ?reason, "event ignored");
            }
            _ => self.version += 1,
        }
        effect
    }

    fn merge(&mut self, event: &ServerEvent) -> SyncEffect {
        match event {
            // ── Snapshots ────────────────────────────────────────────────
            ServerEvent::AllSubjects(subjects) => self.snapshot(subjects.clone()),
            ServerEvent::AllBoards(boards) => {
                let effect = self.snapshot(boards.clone());
                if let Some(board) = self.session.scope().board().cloned() {
                    if self.cache.get::<Board>(&board).is_none() {
                        warn!(%board, "selected board missing from snapshot");
                        self.session.scope_mut().drop_board(&board);
                    }
                }
                self.reflow_if_auto();
                effect
            }
            ServerEvent::AllMemos(memos) => {
                let effect = self.snapshot(memos.clone());
                self.reflow_if_auto();
                effect
            }

            // ── Boards ───────────────────────────────────────────────────
            ServerEvent::BoardCreated(board) => {
                trace!(board = %board.id, "board created");
                let current = self.session.scope().board() == Some(&board.id);
                self.cache.upsert_one(board.clone());
                if current {
                    self.reflow_if_auto();
                }
                SyncEffect::Updated {
                    kind: CollectionKind::Boards,
                }
            }
            ServerEvent::BoardDeleted(id) => {
                let board = self.cache.remove_one::<Board>(id);
                let memos = self.cache.remove_board_memos(id).len();
                if board.is_none() && memos == 0 {
                    return SyncEffect::unknown::<Board>(id);
                }
                if self.session.scope_mut().drop_board(id) {
                    info!(board = %id, "selected board was deleted");
                }
                trace!(board = %id, memos, "board deleted");
                SyncEffect::Removed {
                    kind: CollectionKind::Boards,
                    count: usize::from(board.is_some()) + memos,
                }
            }

            // ── Memos ────────────────────────────────────────────────────
            ServerEvent::NewMemo(memo) => {
                trace!(memo = %memo.id, board = %memo.board_id, "new memo");
                let board = memo.board_id.clone();
                self.cache.upsert_one(memo.clone());
                self.reflow_board_if_current(&board);
                SyncEffect::Updated {
                    kind: CollectionKind::Memos,
                }
            }
            ServerEvent::MemoDeleted(id) => match self.remove_memo(id) {
                Some(_) => SyncEffect::Removed {
                    kind: CollectionKind::Memos,
                    count: 1,
                },
                None => SyncEffect::unknown::<Memo>(id),
            },
            ServerEvent::MemoPositionUpdated(MemoPosition { id, x, y }) => {
                let (x, y) = (x.max(0.0), y.max(0.0));
                let updated = self.cache.collection_mut::<Memo>().update(id, |m| {
                    m.x = x;
                    m.y = y;
                });
                if !updated {
                    return SyncEffect::unknown::<Memo>(id);
                }
                trace!(memo = %id, x, y, "memo moved");
                SyncEffect::Updated {
                    kind: CollectionKind::Memos,
                }
            }
            ServerEvent::MemoContentUpdated(MemoContent { id, content }) => {
                let updated = self
                    .cache
                    .collection_mut::<Memo>()
                    .update(id, |m| m.content.clone_from(content));
                if !updated {
                    return SyncEffect::unknown::<Memo>(id);
                }
                trace!(memo = %id, "memo content updated");
                SyncEffect::Updated {
                    kind: CollectionKind::Memos,
                }
            }

            // ── Reactions ────────────────────────────────────────────────
            ServerEvent::NewLike(like) => {
                if self.cache.get::<Memo>(&like.memo_id).is_none() {
                    return SyncEffect::unknown::<Memo>(&like.memo_id);
                }
                self.cache.upsert_one(like.clone());
                SyncEffect::Updated {
                    kind: CollectionKind::Likes,
                }
            }
            ServerEvent::NewComment(comment) => {
                if self.cache.get::<Memo>(&comment.memo_id).is_none() {
                    return SyncEffect::unknown::<Memo>(&comment.memo_id);
                }
                self.cache.upsert_one(comment.clone());
                SyncEffect::Updated {
                    kind: CollectionKind::Comments,
                }
            }
            ServerEvent::MemoLikes(payload) => {
                let memo = &payload.memo_id;
                if self.cache.get::<Memo>(memo).is_none() {
                    return SyncEffect::unknown::<Memo>(memo);
                }
                self.cache.collection_mut::<Like>().replace_matching(
                    |l| l.memo_id == *memo,
                    payload.likes.iter().filter(|l| l.memo_id == *memo).cloned(),
                );
                trace!(%memo, count = payload.likes.len(), "likes replaced");
                SyncEffect::Updated {
                    kind: CollectionKind::Likes,
                }
            }
            ServerEvent::MemoComments(payload) => {
                let memo = &payload.memo_id;
                if self.cache.get::<Memo>(memo).is_none() {
                    return SyncEffect::unknown::<Memo>(memo);
                }
                self.cache.collection_mut::<Comment>().replace_matching(
                    |c| c.memo_id == *memo,
                    payload.comments.iter().filter(|c| c.memo_id == *memo).cloned(),
                );
                trace!(%memo, count = payload.comments.len(), "comments replaced");
                SyncEffect::Updated {
                    kind: CollectionKind::Comments,
                }
            }

            // ── Presence and session ─────────────────────────────────────
            ServerEvent::UserCursor(cursor) => {
                if cursor.user_id == *self.session.user_id() {
                    return SyncEffect::Ignored(SkipReason::OwnCursor);
                }
                self.cache.upsert_one(Cursor {
                    user_id: cursor.user_id.clone(),
                    x: cursor.x.max(0.0),
                    y: cursor.y.max(0.0),
                });
                SyncEffect::Presence
            }
            ServerEvent::UserDisconnected(user) => match self.cache.remove_one::<Cursor>(user) {
                Some(_) => SyncEffect::Presence,
                None => SyncEffect::unknown::<Cursor>(user),
            },
            ServerEvent::UserCount(count) => {
                self.user_count = *count;
                SyncEffect::Presence
            }
            ServerEvent::UserInfo(info) => {
                self.session.apply_user_info(info);
                self.cache.remove_one::<Cursor>(&info.id);
                SyncEffect::Identity {
                    is_admin: info.is_admin,
                }
            }
            ServerEvent::Error(payload) => {
                warn!(%payload, "authority reported an error");
                SyncEffect::RemoteError(payload.clone())
            }
        }
    }

    fn snapshot<T: Cached>(&mut self, items: Vec<T>) -> SyncEffect {
        let (kind, count) = (T::KIND, items.len());
        self.cache.upsert_many(items);
        info!(collection = %kind, count, "snapshot applied");
        SyncEffect::Snapshot { kind, count }
    }

    /// Remove a memo with its reactions, reflowing its board if visible.
    fn remove_memo(&mut self, id: &MemoId) -> Option<Memo> {
        let memo = self.cache.remove_one::<Memo>(id)?;
        self.cache.remove_reactions(id);
        trace!(memo = %id, "memo removed");
        self.reflow_board_if_current(&memo.board_id);
        Some(memo)
    }

    // =========================================================================
    // Layout
    // =========================================================================

    fn reflow_board_if_current(&mut self, board: &BoardId) {
        if self.session.scope().board() == Some(board) {
            self.reflow_if_auto();
        }
    }

    fn reflow_if_auto(&mut self) {
        if self.layout.auto_reflow() {
            self.pack_current();
        }
    }

    /// Write grid positions for every visible memo. Returns how many moved.
    fn pack_current(&mut self) -> usize {
        let Some(board) = self.session.scope().board().cloned() else {
            return 0;
        };
        let placed = self.layout.reflow(self.cache.memos_in_board(&board));
        let memos = self.cache.collection_mut::<Memo>();
        let mut moved = 0;
        for (id, position) in &placed {
            memos.update(id, |m| {
                if m.x != position.x || m.y != position.y {
                    m.x = position.x;
                    m.y = position.y;
                    moved += 1;
                }
            });
        }
        if moved > 0 {
            debug!(%board, memos = placed.len(), moved, "reflowed");
        }
        moved
    }

    /// Re-pack the visible board onto the grid, whatever the placement mode.
    /// Positions are local; nothing is sent.
    pub fn repack(&mut self) -> usize {
        let moved = self.pack_current();
        if moved > 0 {
            self.version += 1;
        }
        moved
    }

    /// Adopt a new viewport width, reflowing in grid mode.
    pub fn set_viewport(&mut self, width: f64) -> bool {
        if !self.layout.set_viewport(width) {
            return false;
        }
        self.reflow_if_auto();
        self.version += 1;
        true
    }

    pub fn set_placement(&mut self, mode: PlacementMode) {
        self.layout.set_mode(mode);
        self.reflow_if_auto();
    }

    // =========================================================================
    // Scope
    // =========================================================================

    /// Select a subject. Any selected board is cleared.
    pub fn choose_subject(&mut self, subject: &SubjectId) {
        if self.cache.get::<Subject>(subject).is_none() {
            debug!(%subject, "choosing a subject that is not cached yet");
        }
        self.session.scope_mut().choose_subject(subject.clone());
        self.version += 1;
    }

    /// Select a board. Emits `switch-board` when the selection changed.
    pub fn choose_board(&mut self, board: &BoardId) -> Result<Option<ClientIntent>, ScopeError> {
        let Some(found) = self.cache.get::<Board>(board) else {
            return Err(ScopeError::UnknownBoard(board.clone()));
        };
        let elevated = self.session.is_admin();
        if !self.session.scope_mut().choose_board(found, elevated)? {
            return Ok(None);
        }
        info!(%board, "board selected");
        self.reflow_if_auto();
        self.version += 1;
        Ok(Some(ClientIntent::SwitchBoard(board.clone())))
    }

    pub fn back_to_subjects(&mut self) {
        self.session.scope_mut().back_to_subjects();
        self.version += 1;
    }

    // =========================================================================
    // Intents
    // =========================================================================

    fn known_memo(&self, id: &MemoId) -> Option<&Memo> {
        let memo = self.cache.get::<Memo>(id);
        if memo.is_none() {
            debug!(memo = %id, "intent for unknown memo dropped");
        }
        memo
    }

    fn may_modify(&self, memo: &Memo) -> bool {
        memo.is_owned_by(self.session.user_id()) || self.session.is_admin()
    }

    fn require_admin(&self, action: &str) -> bool {
        if !self.session.is_admin() {
            debug!(action, "admin intent from non-admin session dropped");
        }
        self.session.is_admin()
    }

    /// Create a memo on the selected board. Not optimistic: the authority
    /// assigns the id and echoes `new-memo`.
    pub fn create_memo(&mut self, draft: MemoDraft) -> Option<ClientIntent> {
        let Some(board) = self.session.scope().board().cloned() else {
            debug!("create-memo with no board selected dropped");
            return None;
        };
        let slot = self.layout.next_slot(self.cache.memos_in_board(&board).len());
        let position = match self.layout.mode() {
            PlacementMode::Grid => slot,
            PlacementMode::FreeDrag => draft.at.unwrap_or(slot),
        };
        Some(ClientIntent::CreateMemo(CreateMemo {
            content: draft.content,
            image: draft.image,
            color: Some(draft.color.unwrap_or_else(|| MEMO_PALETTE[0].to_string())),
            x: position.x.max(0.0),
            y: position.y.max(0.0),
            board_id: board,
            user_name: self.session.user_name().map(str::to_string),
        }))
    }

    /// Move a memo. Anyone may move any memo.
    pub fn move_memo(&mut self, id: &MemoId, x: f64, y: f64) -> Option<ClientIntent> {
        self.known_memo(id)?;
        let (x, y) = (x.max(0.0), y.max(0.0));
        self.cache.collection_mut::<Memo>().update(id, |m| {
            m.x = x;
            m.y = y;
        });
        self.version += 1;
        Some(ClientIntent::UpdateMemoPosition(MemoPosition {
            id: id.clone(),
            x,
            y,
        }))
    }

    /// Replace a memo's text. Owner or admin only.
    pub fn edit_memo(&mut self, id: &MemoId, content: impl Into<String>) -> Option<ClientIntent> {
        let memo = self.known_memo(id)?;
        if !self.may_modify(memo) {
            debug!(memo = %id, "edit by non-owner dropped");
            return None;
        }
        let content = content.into();
        self.cache
            .collection_mut::<Memo>()
            .update(id, |m| m.content.clone_from(&content));
        self.version += 1;
        Some(ClientIntent::UpdateMemoContent(MemoContent {
            id: id.clone(),
            content,
        }))
    }

    /// Delete a memo. Owners send `delete-memo`; admins deleting someone
    /// else's memo send `admin-delete-memo`.
    pub fn delete_memo(&mut self, id: &MemoId) -> Option<ClientIntent> {
        let memo = self.known_memo(id)?;
        let intent = if memo.is_owned_by(self.session.user_id()) {
            ClientIntent::DeleteMemo(id.clone())
        } else if self.session.is_admin() {
            ClientIntent::AdminDeleteMemo(id.clone())
        } else {
            debug!(memo = %id, "delete by non-owner dropped");
            return None;
        };
        self.remove_memo(id);
        self.version += 1;
        Some(intent)
    }

    /// Remove every memo from the selected board (admin).
    pub fn clear_board(&mut self) -> Option<ClientIntent> {
        if !self.require_admin("admin-clear-all-memos") {
            return None;
        }
        let Some(board) = self.session.scope().board().cloned() else {
            debug!("clear with no board selected dropped");
            return None;
        };
        let removed = self.cache.remove_board_memos(&board).len();
        info!(%board, removed, "board cleared");
        self.version += 1;
        Some(ClientIntent::AdminClearAllMemos(board))
    }

    /// Create a board under a known subject (admin). Not optimistic.
    pub fn create_board(
        &self,
        name: impl Into<String>,
        theme: Theme,
        description: Option<String>,
        subject: &SubjectId,
    ) -> Option<ClientIntent> {
        if !self.require_admin("create-board") {
            return None;
        }
        if self.cache.get::<Subject>(subject).is_none() {
            debug!(%subject, "create-board under unknown subject dropped");
            return None;
        }
        let name = name.into();
        if name.trim().is_empty() {
            debug!("create-board without a name dropped");
            return None;
        }
        Some(ClientIntent::CreateBoard(CreateBoard {
            name,
            theme,
            description: description.filter(|d| !d.trim().is_empty()),
            subject_id: subject.clone(),
        }))
    }

    /// Delete a board (admin). Not optimistic: `board-deleted` does the cascade.
    pub fn delete_board(&self, board: &BoardId) -> Option<ClientIntent> {
        if !self.require_admin("delete-board") {
            return None;
        }
        if self.cache.get::<Board>(board).is_none() {
            debug!(%board, "delete of unknown board dropped");
            return None;
        }
        Some(ClientIntent::DeleteBoard(board.clone()))
    }

    /// Like a memo. Duplicate likes are the authority's to reject.
    pub fn like_memo(&self, id: &MemoId) -> Option<ClientIntent> {
        self.known_memo(id)?;
        Some(ClientIntent::LikeMemo(id.clone()))
    }

    pub fn comment_memo(&self, id: &MemoId, content: &str) -> Option<ClientIntent> {
        self.known_memo(id)?;
        let content = content.trim();
        if content.is_empty() {
            debug!(memo = %id, "empty comment dropped");
            return None;
        }
        Some(ClientIntent::CommentMemo(CommentMemo {
            memo_id: id.clone(),
            content: content.to_string(),
        }))
    }

    /// Ask for the likes snapshot of one memo (answered by `memo-likes`).
    pub fn request_likes(&self, id: &MemoId) -> Option<ClientIntent> {
        self.known_memo(id)?;
        Some(ClientIntent::GetMemoLikes(id.clone()))
    }

    /// Ask for the comments snapshot of one memo (answered by `memo-comments`).
    pub fn request_comments(&self, id: &MemoId) -> Option<ClientIntent> {
        self.known_memo(id)?;
        Some(ClientIntent::GetMemoComments(id.clone()))
    }

    pub fn move_cursor(&self, x: f64, y: f64) -> ClientIntent {
        ClientIntent::CursorMove(CursorMove {
            x: x.max(0.0),
            y: y.max(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemoComments, MemoLikes};
    use crate::layout::LayoutConfig;
    use tackboard_types::{UserId, UserInfo};

    fn grid() -> LayoutEngine {
        LayoutEngine::with_config(
            LayoutConfig::new(5, 200.0, 150.0, 10.0, 80.0).unwrap(),
            PlacementMode::Grid,
        )
    }

    fn reconciler(admin: bool) -> Reconciler {
        Reconciler::new(SessionContext::new(admin, Some("Kai".into())), grid())
    }

    /// A reconciler with subjects, boards b1/b2 under "math", b1 selected,
    /// and identity "me" confirmed.
    fn on_board(admin: bool) -> Reconciler {
        let mut r = reconciler(admin);
        r.apply(&ServerEvent::UserInfo(UserInfo {
            id: "me".into(),
            name: "Kai".into(),
            is_admin: admin,
        }));
        r.apply(&ServerEvent::AllSubjects(vec![Subject::new("math", "Math", "📐")]));
        r.apply(&ServerEvent::AllBoards(vec![
            Board::new("b1", "One", "math"),
            Board::new("b2", "Two", "math"),
        ]));
        r.choose_subject(&"math".into());
        r.choose_board(&"b1".into()).unwrap();
        r
    }

    fn memo(id: &str, board: &str, owner: &str) -> Memo {
        Memo::new(id, board, format!("memo {id}")).created_by(owner)
    }

    fn like(id: &str, memo: &str) -> Like {
        Like {
            id: id.into(),
            memo_id: memo.into(),
            user_id: "u".into(),
            user_name: "u".into(),
            created_at: String::new(),
        }
    }

    fn comment(id: &str, memo: &str, content: &str) -> Comment {
        Comment {
            id: id.into(),
            memo_id: memo.into(),
            user_id: "u".into(),
            user_name: "u".into(),
            content: content.into(),
            created_at: String::new(),
        }
    }

    fn visible_ids(r: &Reconciler) -> Vec<String> {
        r.visible_memos().iter().map(|m| m.id.to_string()).collect()
    }

    #[test]
    fn same_delta_twice_is_idempotent() {
        let mut r = on_board(false);
        let event = ServerEvent::NewMemo(memo("m1", "b1", "other"));
        r.apply(&event);
        let once = r.cache().clone();
        r.apply(&event);
        let twice = r.cache();
        assert_eq!(
            once.query::<Memo, _>(|_| true),
            twice.query::<Memo, _>(|_| true)
        );

        let moved = ServerEvent::MemoPositionUpdated(MemoPosition {
            id: "m1".into(),
            x: 40.0,
            y: 60.0,
        });
        r.apply(&moved);
        r.apply(&moved);
        let m = r.cache().get::<Memo>(&"m1".into()).unwrap();
        assert_eq!((m.x, m.y), (40.0, 60.0));
    }

    #[test]
    fn position_update_for_unknown_memo_is_ignored() {
        let mut r = on_board(false);
        let version = r.version();
        let effect = r.apply(&ServerEvent::MemoPositionUpdated(MemoPosition {
            id: "m1".into(),
            x: 40.0,
            y: 60.0,
        }));
        assert_eq!(
            effect,
            SyncEffect::Ignored(SkipReason::UnknownEntity {
                kind: CollectionKind::Memos,
                id: "m1".into()
            })
        );
        assert!(r.cache().collection::<Memo>().is_empty());
        assert_eq!(r.version(), version);
    }

    #[test]
    fn content_update_for_unknown_memo_is_ignored() {
        let mut r = on_board(false);
        let effect = r.apply(&ServerEvent::MemoContentUpdated(MemoContent {
            id: "ghost".into(),
            content: "boo".into(),
        }));
        assert!(effect.is_ignored());
    }

    #[test]
    fn new_memos_reflow_into_grid() {
        let mut r = on_board(false);
        for i in 0..6 {
            // Authority coordinates are overridden by the grid.
            r.apply(&ServerEvent::NewMemo(memo(&format!("m{i}"), "b1", "x").at(999.0, 999.0)));
        }
        let memos = r.visible_memos();
        let config = r.layout().config();
        assert_eq!(memos[5].x, memos[0].x);
        assert_eq!(
            memos[5].y - memos[0].y,
            config.cell_height() + 2.0 * config.padding()
        );
        assert_eq!((memos[0].x, memos[0].y), (10.0, 90.0));
    }

    #[test]
    fn deleting_a_memo_packs_the_rest() {
        let mut r = on_board(false);
        for id in ["m1", "m2", "m3"] {
            r.apply(&ServerEvent::NewMemo(memo(id, "b1", "x")));
        }
        let first = r.layout().place(0);
        r.apply(&ServerEvent::MemoDeleted("m1".into()));
        let m2 = r.cache().get::<Memo>(&"m2".into()).unwrap();
        assert_eq!((m2.x, m2.y), (first.x, first.y));
        assert_eq!(visible_ids(&r), ["m2", "m3"]);
    }

    #[test]
    fn free_drag_keeps_coordinates_until_repack() {
        let mut r = on_board(false);
        r.set_placement(PlacementMode::FreeDrag);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "x").at(500.0, 400.0)));
        r.apply(&ServerEvent::NewMemo(memo("m2", "b1", "x").at(20.0, 30.0)));
        let m1 = r.cache().get::<Memo>(&"m1".into()).unwrap();
        assert_eq!((m1.x, m1.y), (500.0, 400.0));

        assert_eq!(r.repack(), 2);
        let m1 = r.cache().get::<Memo>(&"m1".into()).unwrap();
        let slot = r.layout().place(0);
        assert_eq!((m1.x, m1.y), (slot.x, slot.y));
        assert_eq!(r.repack(), 0);
    }

    #[test]
    fn memo_deletion_cascades_to_reactions() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "x")));
        r.apply(&ServerEvent::NewLike(like("l1", "m1")));
        r.apply(&ServerEvent::MemoDeleted("m1".into()));
        assert!(r.cache().collection::<Like>().is_empty());
        assert!(r.apply(&ServerEvent::MemoDeleted("m1".into())).is_ignored());
    }

    #[test]
    fn board_deletion_cascades_and_clears_selection() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "x")));
        r.apply(&ServerEvent::NewMemo(memo("m2", "b2", "x")));
        let effect = r.apply(&ServerEvent::BoardDeleted("b1".into()));
        assert_eq!(
            effect,
            SyncEffect::Removed {
                kind: CollectionKind::Boards,
                count: 2
            }
        );
        assert_eq!(r.session().scope().board(), None);
        assert_eq!(r.prompt(), Prompt::ChooseBoard);
        assert_eq!(r.cache().collection::<Memo>().len(), 1);
    }

    #[test]
    fn reactions_for_unknown_memo_are_ignored() {
        let mut r = on_board(false);
        assert!(r.apply(&ServerEvent::NewLike(like("l1", "nope"))).is_ignored());
    }

    #[test]
    fn reaction_snapshots_for_unknown_memo_are_ignored() {
        let mut r = on_board(false);
        let effect = r.apply(&ServerEvent::MemoLikes(MemoLikes {
            memo_id: "ghost".into(),
            likes: vec![like("l1", "ghost")],
        }));
        assert_eq!(effect, SyncEffect::unknown::<Memo>(&"ghost".into()));
        let effect = r.apply(&ServerEvent::MemoComments(MemoComments {
            memo_id: "ghost".into(),
            comments: vec![comment("c1", "ghost", "boo")],
        }));
        assert!(effect.is_ignored());
        assert!(r.cache().collection::<Like>().is_empty());
        assert!(r.cache().collection::<Comment>().is_empty());
    }

    #[test]
    fn memo_likes_replaces_only_that_memo() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "x")));
        r.apply(&ServerEvent::NewMemo(memo("m2", "b1", "x")));
        r.apply(&ServerEvent::NewLike(like("l1", "m1")));
        r.apply(&ServerEvent::NewLike(like("l2", "m2")));

        r.apply(&ServerEvent::MemoLikes(MemoLikes {
            memo_id: "m1".into(),
            likes: vec![like("l3", "m1"), like("l4", "m1")],
        }));
        assert_eq!(r.cache().likes_for(&"m1".into()).len(), 2);
        assert_eq!(r.cache().likes_for(&"m2".into()).len(), 1);

        r.apply(&ServerEvent::MemoComments(MemoComments {
            memo_id: "m1".into(),
            comments: Vec::new(),
        }));
        assert!(r.cache().comments_for(&"m1".into()).is_empty());
    }

    #[test]
    fn cursors_skip_own_and_clear_on_disconnect() {
        let mut r = on_board(false);
        let own = ServerEvent::UserCursor(Cursor {
            user_id: "me".into(),
            x: 1.0,
            y: 1.0,
        });
        assert_eq!(r.apply(&own), SyncEffect::Ignored(SkipReason::OwnCursor));

        r.apply(&ServerEvent::UserCursor(Cursor {
            user_id: "bo".into(),
            x: 5.0,
            y: -3.0,
        }));
        r.apply(&ServerEvent::UserCount(2));
        assert_eq!(r.cursors()[0].y, 0.0);

        r.apply_status(&ConnectionStatus::Disconnected);
        assert!(r.cursors().is_empty());
        assert_eq!(r.user_count(), 0);
        assert!(!r.is_connected());
        // Entity caches survive until the next snapshot.
        assert!(r.cache().get::<Board>(&"b1".into()).is_some());
    }

    #[test]
    fn user_disconnected_removes_cursor() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::UserCursor(Cursor {
            user_id: "bo".into(),
            x: 5.0,
            y: 5.0,
        }));
        assert_eq!(
            r.apply(&ServerEvent::UserDisconnected(UserId::new("bo"))),
            SyncEffect::Presence
        );
        assert!(r.cursors().is_empty());
    }

    #[test]
    fn remote_error_changes_nothing() {
        let mut r = on_board(false);
        let before = r.cache().collection::<Memo>().len();
        let effect = r.apply(&ServerEvent::Error(serde_json::json!("nope")));
        assert_eq!(effect, SyncEffect::RemoteError(serde_json::json!("nope")));
        assert_eq!(r.cache().collection::<Memo>().len(), before);
    }

    #[test]
    fn authority_overrides_elevated_credential() {
        let mut r = reconciler(true);
        assert!(r.is_admin());
        let effect = r.apply(&ServerEvent::UserInfo(UserInfo {
            id: "s1".into(),
            name: String::new(),
            is_admin: false,
        }));
        assert_eq!(effect, SyncEffect::Identity { is_admin: false });
        assert!(!r.is_admin());
    }

    // ── Intents ──────────────────────────────────────────────────────────

    #[test]
    fn create_memo_needs_a_board() {
        let mut r = reconciler(false);
        assert_eq!(r.create_memo(MemoDraft::text("hi")), None);

        let mut r = on_board(false);
        let Some(ClientIntent::CreateMemo(create)) = r.create_memo(MemoDraft::text("hi")) else {
            panic!("expected create-memo");
        };
        assert_eq!(create.board_id.as_str(), "b1");
        assert_eq!(create.color.as_deref(), Some(MEMO_PALETTE[0]));
        assert_eq!(create.user_name.as_deref(), Some("Kai"));
        // Not optimistic.
        assert!(r.visible_memos().is_empty());
    }

    #[test]
    fn create_memo_uses_next_grid_slot_or_drop_point() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "x")));
        let draft = MemoDraft {
            at: Some(Position { x: 300.0, y: 300.0 }),
            ..MemoDraft::text("hi")
        };

        let Some(ClientIntent::CreateMemo(create)) = r.create_memo(draft.clone()) else {
            panic!("expected create-memo");
        };
        let slot = r.layout().place(1);
        assert_eq!((create.x, create.y), (slot.x, slot.y));

        r.set_placement(PlacementMode::FreeDrag);
        let Some(ClientIntent::CreateMemo(create)) = r.create_memo(draft) else {
            panic!("expected create-memo");
        };
        assert_eq!((create.x, create.y), (300.0, 300.0));
    }

    #[test]
    fn move_is_optimistic_and_echo_is_harmless() {
        let mut r = on_board(false);
        r.set_placement(PlacementMode::FreeDrag);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "other")));

        let intent = r.move_memo(&"m1".into(), 120.0, -5.0);
        assert_eq!(
            intent,
            Some(ClientIntent::UpdateMemoPosition(MemoPosition {
                id: "m1".into(),
                x: 120.0,
                y: 0.0
            }))
        );
        let m1 = r.cache().get::<Memo>(&"m1".into()).unwrap().clone();
        assert_eq!((m1.x, m1.y), (120.0, 0.0));

        r.apply(&ServerEvent::MemoPositionUpdated(MemoPosition {
            id: "m1".into(),
            x: 120.0,
            y: 0.0,
        }));
        assert_eq!(r.cache().get::<Memo>(&"m1".into()), Some(&m1));
    }

    #[test]
    fn rejected_change_stays_until_overwritten() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "me")));
        r.edit_memo(&"m1".into(), "optimistic").unwrap();
        assert_eq!(r.cache().get::<Memo>(&"m1".into()).unwrap().content, "optimistic");

        r.apply(&ServerEvent::AllMemos(vec![memo("m1", "b1", "me")]));
        assert_eq!(r.cache().get::<Memo>(&"m1".into()).unwrap().content, "memo m1");
    }

    #[test]
    fn edit_and_delete_need_ownership_or_admin() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::NewMemo(memo("theirs", "b1", "other")));
        r.apply(&ServerEvent::NewMemo(memo("mine", "b1", "me")));

        assert_eq!(r.edit_memo(&"theirs".into(), "x"), None);
        assert_eq!(r.delete_memo(&"theirs".into()), None);
        assert_eq!(r.cache().get::<Memo>(&"theirs".into()).unwrap().content, "memo theirs");

        assert_eq!(
            r.delete_memo(&"mine".into()),
            Some(ClientIntent::DeleteMemo("mine".into()))
        );
        assert!(r.cache().get::<Memo>(&"mine".into()).is_none());

        let mut admin = on_board(true);
        admin.apply(&ServerEvent::NewMemo(memo("theirs", "b1", "other")));
        assert_eq!(
            admin.delete_memo(&"theirs".into()),
            Some(ClientIntent::AdminDeleteMemo("theirs".into()))
        );
        assert!(admin.visible_memos().is_empty());
    }

    #[test]
    fn admin_intents_are_gated() {
        let mut r = on_board(false);
        assert_eq!(r.clear_board(), None);
        assert_eq!(r.delete_board(&"b1".into()), None);
        assert_eq!(r.create_board("New", Theme::Ocean, None, &"math".into()), None);

        let mut admin = on_board(true);
        admin.apply(&ServerEvent::NewMemo(memo("m1", "b1", "x")));
        admin.apply(&ServerEvent::NewMemo(memo("m2", "b2", "x")));
        assert_eq!(
            admin.clear_board(),
            Some(ClientIntent::AdminClearAllMemos("b1".into()))
        );
        assert!(admin.visible_memos().is_empty());
        assert_eq!(admin.cache().collection::<Memo>().len(), 1);

        assert!(admin.create_board("New", Theme::Ocean, None, &"math".into()).is_some());
        assert_eq!(admin.create_board("New", Theme::Ocean, None, &"art".into()), None);
        assert_eq!(
            admin.delete_board(&"b2".into()),
            Some(ClientIntent::DeleteBoard("b2".into()))
        );
        // Not optimistic.
        assert!(admin.cache().get::<Board>(&"b2".into()).is_some());
    }

    #[test]
    fn comments_must_have_text() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "x")));
        assert_eq!(r.comment_memo(&"m1".into(), "   "), None);
        assert_eq!(
            r.comment_memo(&"m1".into(), " nice "),
            Some(ClientIntent::CommentMemo(CommentMemo {
                memo_id: "m1".into(),
                content: "nice".into()
            }))
        );
        assert_eq!(r.comment_memo(&"m9".into(), "nice"), None);
        assert_eq!(
            r.request_likes(&"m1".into()),
            Some(ClientIntent::GetMemoLikes("m1".into()))
        );
        assert_eq!(
            r.request_comments(&"m1".into()),
            Some(ClientIntent::GetMemoComments("m1".into()))
        );
    }

    #[test]
    fn likes_are_not_deduplicated_locally() {
        let mut r = on_board(false);
        r.apply(&ServerEvent::NewMemo(memo("m1", "b1", "x")));
        r.apply(&ServerEvent::NewLike(Like {
            user_id: "me".into(),
            ..like("l1", "m1")
        }));
        assert!(r.cache().has_liked(&"m1".into(), &"me".into()));
        assert_eq!(
            r.like_memo(&"m1".into()),
            Some(ClientIntent::LikeMemo("m1".into()))
        );
    }

    #[test]
    fn choosing_boards() {
        let mut r = on_board(false);
        assert_eq!(r.choose_board(&"b1".into()), Ok(None));
        assert_eq!(
            r.choose_board(&"b2".into()),
            Ok(Some(ClientIntent::SwitchBoard("b2".into())))
        );
        assert_eq!(
            r.choose_board(&"zz".into()),
            Err(ScopeError::UnknownBoard("zz".into()))
        );

        r.apply(&ServerEvent::BoardCreated(Board::new("b3", "Three", "art")));
        assert!(matches!(
            r.choose_board(&"b3".into()),
            Err(ScopeError::SubjectMismatch { .. })
        ));
        assert_eq!(r.session().scope().board().map(BoardId::as_str), Some("b2"));
        assert_eq!(r.board_choices().len(), 2);

        r.back_to_subjects();
        assert_eq!(r.prompt(), Prompt::ChooseSubject);
        assert!(r.visible_memos().is_empty());
    }

    #[test]
    fn viewport_change_reflows_in_grid_mode() {
        let mut r = Reconciler::new(
            SessionContext::new(true, None),
            LayoutEngine::new(PlacementMode::Grid, 1280.0),
        );
        r.apply(&ServerEvent::AllBoards(vec![Board::new("b1", "One", "s")]));
        r.choose_board(&"b1".into()).unwrap();
        for i in 0..3 {
            r.apply(&ServerEvent::NewMemo(memo(&format!("m{i}"), "b1", "x")));
        }
        assert!(r.set_viewport(375.0));
        let memos = r.visible_memos();
        // Two columns on a phone: the third memo wraps.
        assert_eq!(memos[2].x, memos[0].x);
        assert!(memos[2].y > memos[0].y);
        assert!(!r.set_viewport(380.0));
    }
}
