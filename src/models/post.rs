//! Post model
//!
//! Besides the entity itself this module holds the visibility rule in its
//! in-memory form. The SQL form lives in `db::query::PostQuery`; both must
//! agree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthorSummary, Category, Location};

/// Directory (relative to the media root) holding post images
pub const POST_IMAGE_DIR: &str = "posts/images";

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Title
    pub title: String,
    /// Body text
    pub text: String,
    /// Publication time; a future value schedules the post
    pub pub_date: DateTime<Utc>,
    /// Author ID
    pub author_id: i64,
    /// Optional location ID
    pub location_id: Option<i64>,
    /// Category ID, cleared when the category is deleted
    pub category_id: Option<i64>,
    /// Image path relative to the media root
    pub image: Option<String>,
    /// Whether the author has published the post
    pub is_published: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// The visibility predicate evaluated against a single row.
    ///
    /// `category` is the post's category if it has one. Passing `None` for a
    /// post whose `category_id` is set is a caller bug and is treated as an
    /// unpublished category.
    pub fn is_visible_at(&self, now: DateTime<Utc>, category: Option<&Category>) -> bool {
        let category_ok = match (self.category_id, category) {
            (None, _) => true,
            (Some(_), Some(category)) => category.is_published,
            (Some(_), None) => false,
        };
        self.is_published && self.pub_date <= now && category_ok
    }
}

/// A post as shown in feeds and on the detail page
///
/// Relations are only populated when the query joined them, and
/// `comment_count` only when it was annotated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListItem {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<AuthorSummary>,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub comment_count: Option<i64>,
}

impl PostListItem {
    /// Visibility of this row, using the joined category
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.post.is_visible_at(now, self.category.as_ref())
    }
}

/// Field values for creating or replacing a post
#[derive(Debug, Clone)]
pub struct PostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub image: Option<String>,
    pub is_published: bool,
}
