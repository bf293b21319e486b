//! Subject → Board selection.
//!
//! ```text
//!   NoSubject ──choose_subject──▶ Subject{board: None} ──choose_board──▶ Subject{board: Some}
//!       ▲                               │      ▲                              │
//!       └────────back_to_subjects───────┘      └──── board deleted ───────────┘
//! ```
//!
//! Elevated sessions skip the subject prompt and may pick a board straight
//! from `NoSubject`; the board's subject is adopted.

use std::fmt;

use tackboard_types::{Board, BoardId, SubjectId};
use thiserror::Error;

/// Current selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    NoSubject,
    Subject {
        subject: SubjectId,
        board: Option<BoardId>,
    },
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::NoSubject => f.write_str("no subject"),
            Scope::Subject {
                subject,
                board: None,
            } => write!(f, "{subject}/-"),
            Scope::Subject {
                subject,
                board: Some(board),
            } => write!(f, "{subject}/{board}"),
        }
    }
}

/// What the host UI should ask the user for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    ChooseSubject,
    ChooseBoard,
    None,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("choose a subject before choosing a board")]
    NoSubject,
    #[error("unknown board {0}")]
    UnknownBoard(BoardId),
    #[error("board {board} belongs to subject {board_subject}, not {current}")]
    SubjectMismatch {
        board: BoardId,
        board_subject: SubjectId,
        current: SubjectId,
    },
}

/// The selection state machine. Never terminal.
#[derive(Debug, Clone, Default)]
pub struct ScopeMachine {
    scope: Scope,
}

impl ScopeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn subject(&self) -> Option<&SubjectId> {
        match &self.scope {
            Scope::Subject { subject, .. } => Some(subject),
            Scope::NoSubject => None,
        }
    }

    pub fn board(&self) -> Option<&BoardId> {
        match &self.scope {
            Scope::Subject { board, .. } => board.as_ref(),
            Scope::NoSubject => None,
        }
    }

    pub fn prompt(&self, elevated: bool) -> Prompt {
        match &self.scope {
            Scope::NoSubject if elevated => Prompt::None,
            Scope::NoSubject => Prompt::ChooseSubject,
            Scope::Subject { board: None, .. } => Prompt::ChooseBoard,
            Scope::Subject { board: Some(_), .. } => Prompt::None,
        }
    }

    /// Select `subject`, clearing any board. Returns the cleared board.
    pub fn choose_subject(&mut self, subject: SubjectId) -> Option<BoardId> {
        let previous = self.board().cloned();
        self.scope = Scope::Subject {
            subject,
            board: None,
        };
        previous
    }

    /// Select `board`. Returns false if it was already selected.
    pub fn choose_board(&mut self, board: &Board, elevated: bool) -> Result<bool, ScopeError> {
        let subject = match &self.scope {
            Scope::Subject { subject, .. } => subject.clone(),
            Scope::NoSubject if elevated => board.subject_id.clone(),
            Scope::NoSubject => return Err(ScopeError::NoSubject),
        };
        if board.subject_id != subject {
            return Err(ScopeError::SubjectMismatch {
                board: board.id.clone(),
                board_subject: board.subject_id.clone(),
                current: subject,
            });
        }
        if self.board() == Some(&board.id) {
            return Ok(false);
        }
        self.scope = Scope::Subject {
            subject,
            board: Some(board.id.clone()),
        };
        Ok(true)
    }

    /// Back to the subject prompt. Returns the cleared board, if any.
    pub fn back_to_subjects(&mut self) -> Option<BoardId> {
        let previous = self.board().cloned();
        self.scope = Scope::NoSubject;
        previous
    }

    /// Deselect `board` if it is current (it was deleted). Returns true if so.
    pub fn drop_board(&mut self, board: &BoardId) -> bool {
        match &mut self.scope {
            Scope::Subject { board: current, .. } if current.as_ref() == Some(board) => {
                *current = None;
                true
            }
            _ => false,
        }
    }
}
