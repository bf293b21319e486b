//! In-memory, normalized entity cache.
//!
//! One [`Collection`] per entity kind, addressed by type:
//!
//! ```text
//! cache.upsert_many::<Memo>(snapshot);      // full replace
//! cache.upsert_one(memo);                   // insert-or-replace by id
//! cache.remove_one::<Memo>(&id);            // idempotent delete
//! cache.query::<Board>(|b| b.is_public);    // read-only
//! ```
//!
//! Collections preserve arrival order. Replacing an entry keeps its slot and
//! removing one keeps the relative order of the rest, so the position of a
//! memo among its board's memos is stable between membership changes. That
//! ordinal is what the layout engine places.
//!
//! Pure data: no network, no layout, no logging of its own. The reconciler
//! owns the only mutable instance.

use indexmap::IndexMap;
use strum::Display;
use tackboard_types::{
    Board, BoardId, Comment, Cursor, Entity, Like, Memo, MemoId, Subject, SubjectId, UserId,
};

/// Result of a single upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Ordered id → entity map for one entity kind.
#[derive(Debug, Clone)]
pub struct Collection<T: Entity> {
    items: IndexMap<T::Id, T>,
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }
}

impl<T: Entity> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.items.contains_key(id)
    }

    /// Entities in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.values()
    }

    /// Entities matching `predicate`, in arrival order.
    pub fn query<P>(&self, mut predicate: P) -> Vec<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.items.values().filter(|item| predicate(item)).collect()
    }

    /// Replace the whole collection with `items`.
    ///
    /// Duplicate ids within `items` collapse to the last value, kept at the
    /// slot of the first occurrence.
    pub fn upsert_many(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        for item in items {
            self.items.insert(item.id().clone(), item);
        }
    }

    /// Insert a new entity at the end, or replace an existing one in place.
    pub fn upsert_one(&mut self, item: T) -> Upsert {
        match self.items.insert(item.id().clone(), item) {
            Some(_) => Upsert::Replaced,
            None => Upsert::Inserted,
        }
    }

    /// Remove by id. No-op (returns `None`) if absent.
    pub fn remove_one(&mut self, id: &T::Id) -> Option<T> {
        self.items.shift_remove(id)
    }

    /// Mutate an entity in place. Returns false if absent.
    pub fn update<F>(&mut self, id: &T::Id, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.items.get_mut(id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }

    /// Remove every entity matching `predicate`, returning them in arrival order.
    pub fn remove_matching<P>(&mut self, mut predicate: P) -> Vec<T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = IndexMap::with_capacity(self.items.len());
        for (id, item) in self.items.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept.insert(id, item);
            }
        }
        self.items = kept;
        removed
    }

    /// Scoped snapshot: drop everything matching `predicate`, then upsert `items`.
    ///
    /// Used for per-memo catch-up (all likes for one memo) without discarding
    /// the rest of the collection.
    pub fn replace_matching<P>(&mut self, predicate: P, items: impl IntoIterator<Item = T>) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        let removed = self.remove_matching(predicate).len();
        for item in items {
            self.upsert_one(item);
        }
        removed
    }
}

// ============================================================================
// EntityCache
// ============================================================================

/// Names of the cached collections, for logs and effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CollectionKind {
    Subjects,
    Boards,
    Memos,
    Likes,
    Comments,
    Cursors,
}

/// An entity type with a slot in [`EntityCache`].
pub trait Cached: Entity + Sized {
    const KIND: CollectionKind;

    fn collection(cache: &EntityCache) -> &Collection<Self>;
    fn collection_mut(cache: &mut EntityCache) -> &mut Collection<Self>;
}

macro_rules! impl_cached {
    ($T:ty, $field:ident, $kind:ident) => {
        impl Cached for $T {
            const KIND: CollectionKind = CollectionKind::$kind;

            fn collection(cache: &EntityCache) -> &Collection<Self> {
                &cache.$field
            }

            fn collection_mut(cache: &mut EntityCache) -> &mut Collection<Self> {
                &mut cache.$field
            }
        }
    };
}

/// The client's view of every shared collection.
#[derive(Debug, Clone, Default)]
pub struct EntityCache {
    subjects: Collection<Subject>,
    boards: Collection<Board>,
    memos: Collection<Memo>,
    likes: Collection<Like>,
    comments: Collection<Comment>,
    cursors: Collection<Cursor>,
}

impl_cached!(Subject, subjects, Subjects);
impl_cached!(Board, boards, Boards);
impl_cached!(Memo, memos, Memos);
impl_cached!(Like, likes, Likes);
impl_cached!(Comment, comments, Comments);
impl_cached!(Cursor, cursors, Cursors);

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Generic operations ───────────────────────────────────────────────

    pub fn collection<T: Cached>(&self) -> &Collection<T> {
        T::collection(self)
    }

    pub fn collection_mut<T: Cached>(&mut self) -> &mut Collection<T> {
        T::collection_mut(self)
    }

    /// Full-snapshot replace of `T`'s collection.
    pub fn upsert_many<T: Cached>(&mut self, items: impl IntoIterator<Item = T>) {
        T::collection_mut(self).upsert_many(items);
    }

    pub fn upsert_one<T: Cached>(&mut self, item: T) -> Upsert {
        T::collection_mut(self).upsert_one(item)
    }

    pub fn remove_one<T: Cached>(&mut self, id: &T::Id) -> Option<T> {
        T::collection_mut(self).remove_one(id)
    }

    pub fn get<T: Cached>(&self, id: &T::Id) -> Option<&T> {
        T::collection(self).get(id)
    }

    pub fn query<T: Cached, P>(&self, predicate: P) -> Vec<&T>
    where
        P: FnMut(&T) -> bool,
    {
        T::collection(self).query(predicate)
    }

    // ── Scoped reads ─────────────────────────────────────────────────────

    /// Memos of `board`, in arrival order.
    ///
    /// Empty unless the board itself is cached: a memo pointing at an unknown
    /// board belongs to no visible scope.
    pub fn memos_in_board(&self, board: &BoardId) -> Vec<&Memo> {
        if !self.boards.contains(board) {
            return Vec::new();
        }
        self.memos.query(|m| m.board_id == *board)
    }

    /// Boards of `subject` for the board selector. Empty for an unknown subject.
    pub fn boards_for_subject(&self, subject: &SubjectId) -> Vec<&Board> {
        if !self.subjects.contains(subject) {
            return Vec::new();
        }
        self.boards.query(|b| b.subject_id == *subject)
    }

    pub fn likes_for(&self, memo: &MemoId) -> Vec<&Like> {
        self.likes.query(|l| l.memo_id == *memo)
    }

    /// Comments on `memo`, oldest first.
    pub fn comments_for(&self, memo: &MemoId) -> Vec<&Comment> {
        let mut comments = self.comments.query(|c| c.memo_id == *memo);
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        comments
    }

    pub fn has_liked(&self, memo: &MemoId, user: &UserId) -> bool {
        self.likes
            .iter()
            .any(|l| l.memo_id == *memo && l.user_id == *user)
    }

    // ── Cascades ─────────────────────────────────────────────────────────

    /// Drop likes and comments attached to `memo`.
    pub fn remove_reactions(&mut self, memo: &MemoId) {
        self.likes.remove_matching(|l| l.memo_id == *memo);
        self.comments.remove_matching(|c| c.memo_id == *memo);
    }

    /// Drop every memo of `board` (and their reactions), returning their ids.
    pub fn remove_board_memos(&mut self, board: &BoardId) -> Vec<MemoId> {
        let removed: Vec<MemoId> = self
            .memos
            .remove_matching(|m| m.board_id == *board)
            .into_iter()
            .map(|m| m.id)
            .collect();
        for id in &removed {
            self.remove_reactions(id);
        }
        removed
    }
}
