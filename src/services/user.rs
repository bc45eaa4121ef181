//! User service
//!
//! Implements business logic for user management:
//! - Registration (the first user becomes admin)
//! - Login/logout with database-backed sessions
//! - Profile editing with username uniqueness
//! - Account deletion and expired-session cleanup

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{is_valid_username, Session, UpdateProfileInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// User not found
    #[error("User not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Register a new user
    ///
    /// If this is the first user in the system, they are assigned the
    /// Admin role.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the username or password is unusable
    /// - `UserExists` if the username is already taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        self.validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(input.username));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let mut user = User::new(input.username, password_hash, UserRole::Author);
        user.first_name = input.first_name;
        user.last_name = input.last_name;
        user.email = input.email;

        let created = self
            .user_repo
            .create_first_admin(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, username = %created.username, role = %created.role, "User registered");
        Ok(created)
    }

    /// Check credentials and open a new session
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let invalid = || {
            UserServiceError::AuthenticationError("Invalid username or password".to_string())
        };

        let user = self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!(username = %input.username, "Rejected login with wrong password");
            return Err(invalid());
        }

        let session = Session::new(user.id, Duration::days(self.session_expiration_days));
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }

    /// Invalidate a session. Unknown tokens are ignored.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    /// Resolve a session token to its user
    ///
    /// Returns `None` for unknown or expired tokens; expired sessions are
    /// deleted on the way.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;

        Ok(user)
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?;

        Ok(user)
    }

    /// Change a user's own profile fields
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed username or email
    /// - `UserExists` if another user already has the new username
    pub async fn update_profile(
        &self,
        user: &User,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        if !is_valid_username(&input.username) {
            return Err(UserServiceError::ValidationError(format!(
                "Invalid username: {}",
                input.username
            )));
        }
        if !input.email.is_empty() && !input.email.contains('@') {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }

        if input.username != user.username {
            let taken = self
                .user_repo
                .get_by_username(&input.username)
                .await
                .context("Failed to check username")?
                .is_some_and(|other| other.id != user.id);
            if taken {
                return Err(UserServiceError::UserExists(input.username));
            }
        }

        let updated = User {
            username: input.username,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            updated_at: Utc::now(),
            ..user.clone()
        };

        let saved = self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update user")?;

        Ok(saved)
    }

    /// Delete a user together with their sessions, posts and comments
    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        self.session_repo
            .delete_by_user(id)
            .await
            .context("Failed to delete user sessions")?;

        let deleted = self
            .user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;

        if !deleted {
            return Err(UserServiceError::NotFound(id.to_string()));
        }

        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }

    fn validate_register_input(&self, input: &RegisterInput) -> Result<(), UserServiceError> {
        if !is_valid_username(&input.username) {
            return Err(UserServiceError::ValidationError(format!(
                "Invalid username: {}",
                input.username
            )));
        }

        if input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Password cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Input for user registration
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    /// Create a registration input with empty optional fields
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    /// Create a new login input
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}
