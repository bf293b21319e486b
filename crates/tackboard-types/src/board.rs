//! Board: a themed surface of memos inside a subject.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::entity::Entity;
use crate::ids::{BoardId, SubjectId, UserId};

/// Board color theme, from a fixed palette.
///
/// Unknown theme names decode to [`Theme::Default`] so a newer authority
/// never makes a board unreadable.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Ocean,
    Forest,
    Sunset,
    Night,
}

impl From<String> for Theme {
    fn from(s: String) -> Self {
        Theme::from_str(&s).unwrap_or_default()
    }
}

/// A board. Created and deleted by elevated sessions only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subject_id: SubjectId,
    /// ISO 8601 timestamp from the authority.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub created_by: UserId,
    #[serde(default)]
    pub is_public: bool,
}

impl Board {
    /// A public board with the default theme.
    pub fn new(
        id: impl Into<BoardId>,
        name: impl Into<String>,
        subject_id: impl Into<SubjectId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            theme: Theme::Default,
            description: None,
            subject_id: subject_id.into(),
            created_at: String::new(),
            created_by: UserId::default(),
            is_public: true,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Entity for Board {
    type Id = BoardId;

    fn id(&self) -> &BoardId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn theme_round_trips_lowercase() {
        for theme in Theme::iter() {
            let json = serde_json::to_string(&theme).unwrap();
            let name: &'static str = theme.into();
            assert_eq!(json, format!("\"{name}\""));
            let back: Theme = serde_json::from_str(&json).unwrap();
            assert_eq!(back, theme);
        }
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let theme: Theme = serde_json::from_str("\"neon\"").unwrap();
        assert_eq!(theme, Theme::Default);
    }

    #[test]
    fn board_decodes_wire_shape() {
        let json = r#"{
            "id": "b1",
            "name": "Week 1",
            "theme": "ocean",
            "subjectId": "math",
            "createdAt": "2024-03-01T10:00:00.000Z",
            "createdBy": "admin-socket",
            "isPublic": false
        }"#;
        let board: Board = serde_json::from_str(json).unwrap();
        assert_eq!(board.id.as_str(), "b1");
        assert_eq!(board.theme, Theme::Ocean);
        assert_eq!(board.subject_id.as_str(), "math");
        assert!(board.description.is_none());
        assert!(!board.is_public);
    }
}
