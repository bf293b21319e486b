//! The [`Entity`] trait: anything the client caches by id.

use std::fmt::Debug;
use std::hash::Hash;

/// A shared, authority-owned record addressable by a unique id.
///
/// Caches keep at most one copy per id; an upsert with an existing id
/// replaces the cached value in place.
pub trait Entity: Clone + Debug {
    type Id: Clone + Debug + Eq + Hash;

    /// The entity's unique id.
    fn id(&self) -> &Self::Id;
}
