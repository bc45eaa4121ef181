//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthorSummary;

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Create a new comment stamped with the current time
    pub fn new(post_id: i64, author_id: i64, text: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            post_id,
            author_id,
            text,
            created_at: Utc::now(),
        }
    }
}

/// Comment with its author for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: AuthorSummary,
}
