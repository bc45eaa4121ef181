//! User model
//!
//! This module defines the User entity and related types.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));

/// Maximum length of a username
pub const USERNAME_MAX_LEN: usize = 150;

/// Letters, digits and `@ . + - _` only, at most 150 characters
pub fn is_valid_username(username: &str) -> bool {
    username.chars().count() <= USERNAME_MAX_LEN && USERNAME_RE.is_match(username)
}

/// User entity representing a registered user in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email address (may be empty)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role
    pub role: UserRole,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// Note: The password should already be hashed before calling this function.
    /// Use `services::password::hash_password()` to hash the password.
    pub fn new(username: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Whether this user wrote the resource owned by `author_id`.
    ///
    /// Role does not matter here: an administrator editing somebody
    /// else's post is refused like anyone else.
    pub fn is_author_of(&self, author_id: i64) -> bool {
        self.id == author_id
    }

    /// "First Last", falling back to the username when both are empty
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// User role for authorization.
///
/// - Admin: manages categories, locations and users through the admin API
/// - Author: writes posts and comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Administrator
    Admin,
    /// Regular author
    #[default]
    Author,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Author => write!(f, "author"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "author" => Ok(UserRole::Author),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Public part of a user, joined onto posts and comments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorSummary {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Profile fields a user may change about themselves
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new("testuser".to_string(), "hash".to_string(), UserRole::Author);

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "testuser");
        assert_eq!(user.email, "");
        assert_eq!(user.role, UserRole::Author);
    }

    #[test]
    fn test_admin_is_not_author_of_others() {
        let mut admin = User::new("admin".to_string(), "hash".to_string(), UserRole::Admin);
        admin.id = 1;

        assert!(admin.is_admin());
        assert!(admin.is_author_of(1));
        assert!(!admin.is_author_of(2));
    }

    #[test]
    fn test_display_name() {
        let mut user = User::new("leo".to_string(), "hash".to_string(), UserRole::Author);
        assert_eq!(user.display_name(), "leo");

        user.first_name = "Leo".to_string();
        assert_eq!(user.display_name(), "Leo");

        user.last_name = "Tolstoy".to_string();
        assert_eq!(user.display_name(), "Leo Tolstoy");
    }

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("leo.tolstoy+blog@example"));
        assert!(is_valid_username("лев_толстой"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("two words"));
        assert!(!is_valid_username("semi;colon"));
        assert!(!is_valid_username(&"a".repeat(USERNAME_MAX_LEN + 1)));
    }

    #[test]
    fn test_user_role_roundtrip() {
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!(UserRole::from_str("ADMIN").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("author").unwrap(), UserRole::Author);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::Author);
    }
}
