//! High-level controller for tackboard clients.
//!
//! [`SyncedBoard`] bundles a [`ConnectionHandle`], its [`ConnectionEvents`]
//! and a [`Reconciler`]. Hosts (a UI, the CLI, tests) drive it with
//! [`next`](SyncedBoard::next) and call action methods; every action applies
//! its optimistic change locally and forwards the resulting intent.

use tackboard_types::{BoardId, MemoId, SubjectId, Theme};
use tracing::{debug, warn};

use crate::actor::{ConnectOptions, ConnectionEvents, ConnectionHandle, connect};
use crate::config::ClientConfig;
use crate::events::ConnectionEvent;
use crate::intents::ClientIntent;
use crate::layout::{LayoutEngine, PlacementMode};
use crate::scope::ScopeError;
use crate::session::SessionContext;
use crate::sync::{MemoDraft, Reconciler, SyncEffect};
use crate::transport::Transport;

/// A live board: connection plus synchronized state.
pub struct SyncedBoard {
    handle: ConnectionHandle,
    events: ConnectionEvents,
    state: Reconciler,
}

impl SyncedBoard {
    /// Connect and start syncing.
    pub fn connect<T: Transport>(
        transport: T,
        options: ConnectOptions,
        user_name: Option<String>,
        layout: LayoutEngine,
    ) -> Self {
        let session = SessionContext::new(options.is_elevated(), user_name);
        let (handle, events) = connect(transport, options);
        Self::from_parts(handle, events, Reconciler::new(session, layout))
    }

    /// Connect with everything taken from a [`ClientConfig`].
    pub fn from_config<T: Transport>(transport: T, config: &ClientConfig) -> Self {
        let (handle, events) = connect(transport, config.connect_options());
        Self::from_parts(
            handle,
            events,
            Reconciler::new(config.session(), config.layout()),
        )
    }

    pub fn from_parts(handle: ConnectionHandle, events: ConnectionEvents, state: Reconciler) -> Self {
        Self {
            handle,
            events,
            state,
        }
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn state(&self) -> &Reconciler {
        &self.state
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    // =========================================================================
    // Event pump
    // =========================================================================

    /// Wait for the next connection event and apply it.
    ///
    /// `None` once the connection has shut down.
    pub async fn next(&mut self) -> Option<(ConnectionEvent, Option<SyncEffect>)> {
        let event = self.events.recv().await?;
        let effect = self.state.apply_connection_event(&event);
        Some((event, effect))
    }

    /// Apply every already-queued event without waiting. Returns how many.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.events.try_recv() {
            self.state.apply_connection_event(&event);
            applied += 1;
        }
        applied
    }

    // =========================================================================
    // Actions
    // =========================================================================

    fn dispatch(&self, intent: Option<ClientIntent>) -> bool {
        let Some(intent) = intent else {
            return false;
        };
        debug!(intent = intent.name(), "dispatching");
        match self.handle.send(intent) {
            Ok(()) => true,
            Err(e) => {
                warn!("intent not sent: {e}");
                false
            }
        }
    }

    pub fn choose_subject(&mut self, subject: &SubjectId) {
        self.state.choose_subject(subject);
    }

    /// Select a board. A rejected choice is logged and sends nothing.
    pub fn choose_board(&mut self, board: &BoardId) -> Result<(), ScopeError> {
        match self.state.choose_board(board) {
            Ok(intent) => {
                self.dispatch(intent);
                Ok(())
            }
            Err(e) => {
                warn!(%board, "board not selected: {e}");
                Err(e)
            }
        }
    }

    pub fn back_to_subjects(&mut self) {
        self.state.back_to_subjects();
    }

    pub fn create_memo(&mut self, draft: MemoDraft) -> bool {
        let intent = self.state.create_memo(draft);
        self.dispatch(intent)
    }

    pub fn move_memo(&mut self, id: &MemoId, x: f64, y: f64) -> bool {
        let intent = self.state.move_memo(id, x, y);
        self.dispatch(intent)
    }

    pub fn edit_memo(&mut self, id: &MemoId, content: impl Into<String>) -> bool {
        let intent = self.state.edit_memo(id, content);
        self.dispatch(intent)
    }

    pub fn delete_memo(&mut self, id: &MemoId) -> bool {
        let intent = self.state.delete_memo(id);
        self.dispatch(intent)
    }

    pub fn clear_board(&mut self) -> bool {
        let intent = self.state.clear_board();
        self.dispatch(intent)
    }

    pub fn create_board(
        &mut self,
        name: impl Into<String>,
        theme: Theme,
        description: Option<String>,
        subject: &SubjectId,
    ) -> bool {
        self.dispatch(self.state.create_board(name, theme, description, subject))
    }

    pub fn delete_board(&mut self, board: &BoardId) -> bool {
        self.dispatch(self.state.delete_board(board))
    }

    pub fn like_memo(&mut self, id: &MemoId) -> bool {
        self.dispatch(self.state.like_memo(id))
    }

    pub fn comment_memo(&mut self, id: &MemoId, content: &str) -> bool {
        self.dispatch(self.state.comment_memo(id, content))
    }

    /// Open a memo's detail view: fetch its likes and comments.
    pub fn open_memo(&mut self, id: &MemoId) -> bool {
        let likes = self.dispatch(self.state.request_likes(id));
        let comments = self.dispatch(self.state.request_comments(id));
        likes && comments
    }

    pub fn move_cursor(&mut self, x: f64, y: f64) -> bool {
        self.dispatch(Some(self.state.move_cursor(x, y)))
    }

    pub fn set_viewport(&mut self, width: f64) -> bool {
        self.state.set_viewport(width)
    }

    pub fn set_placement(&mut self, mode: PlacementMode) {
        self.state.set_placement(mode);
    }

    pub fn repack(&mut self) -> usize {
        self.state.repack()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Re-initiate after reconnect exhaustion.
    pub fn reconnect(&self) -> bool {
        self.handle.reconnect().is_ok()
    }

    /// Tear down. Pump [`next`](Self::next) to observe `Closed`.
    pub fn close(&self) {
        self.handle.close();
    }
}
