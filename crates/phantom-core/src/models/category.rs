//! Event categories.

use serde::{Deserialize, Serialize};

/// A category events can be filed under.
///
/// Categories are shared by all users and ordered by priority, highest
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub priority_level: i32,
    /// Hex color code such as `#FF0000`.
    pub color: String,
    #[serde(default)]
    pub description: String,
}
