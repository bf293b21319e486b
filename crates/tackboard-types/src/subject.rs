//! Subject: the top of the scope hierarchy.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::ids::SubjectId;

/// A subject groups boards. Server-owned and immutable from the client's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    /// Display glyph (usually a single emoji).
    #[serde(default)]
    pub icon: String,
}

impl Subject {
    pub fn new(id: impl Into<SubjectId>, name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
        }
    }
}

impl Entity for Subject {
    type Id = SubjectId;

    fn id(&self) -> &SubjectId {
        &self.id
    }
}
