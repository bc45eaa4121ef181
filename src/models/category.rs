//! Category model
//!
//! This module defines the Category entity and related types.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

/// Maximum length of a category slug
pub const SLUG_MAX_LEN: usize = 64;

/// Category entity grouping posts under a URL slug.
///
/// Hiding a category (`is_published = false`) hides every post filed
/// under it from public feeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Category title
    pub title: String,
    /// Category description
    pub description: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// Whether the category is visible
    pub is_published: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Create a new published Category.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(title: String, description: String, slug: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            title,
            description,
            slug,
            is_published: true,
            created_at: Utc::now(),
        }
    }
}

/// Check that a slug uses only latin letters, digits, hyphen and underscore
pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= SLUG_MAX_LEN && SLUG_RE.is_match(slug)
}

/// Input for creating a new category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

/// Input for updating a category; absent fields stay unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub is_published: Option<bool>,
}

pub(crate) fn default_published() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_new_is_published() {
        let category = Category::new("Travel".into(), "Trips".into(), "travel".into());
        assert_eq!(category.id, 0);
        assert!(category.is_published);
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("travel"));
        assert!(is_valid_slug("Travel_2024-notes"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("with space"));
        assert!(!is_valid_slug("путешествия"));
        assert!(!is_valid_slug(&"a".repeat(SLUG_MAX_LEN + 1)));
    }

    #[test]
    fn test_create_input_defaults() {
        let input: CreateCategoryInput =
            serde_json::from_str(r#"{"title": "Food", "slug": "food"}"#).unwrap();
        assert!(input.is_published);
        assert_eq!(input.description, "");
    }
}
