//! Location model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::default_published;

/// A place a post can be attached to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// Unique identifier
    pub id: i64,
    /// Place name
    pub name: String,
    /// Whether the location is shown on posts
    pub is_published: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Location {
    /// Create a new published Location
    pub fn new(name: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            name,
            is_published: true,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a new location
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLocationInput {
    pub name: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

/// Input for updating a location; absent fields stay unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLocationInput {
    pub name: Option<String>,
    pub is_published: Option<bool>,
}
