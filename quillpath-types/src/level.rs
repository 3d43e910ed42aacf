use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a curriculum level (e.g. `"mechanics-1"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelId(String);

impl LevelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LevelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LevelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for LevelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Skill track a level belongs to. Declaration order is curriculum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Mechanics,
    Sequencing,
    Voice,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Mechanics, Category::Sequencing, Category::Voice];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Mechanics => "mechanics",
            Category::Sequencing => "sequencing",
            Category::Voice => "voice",
        }
    }

    /// The category unlocked unconditionally.
    pub fn first() -> Self {
        Category::Mechanics
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
