//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, email, password_hash, role, created_at, updated_at";

const INSERT_USER: &str = r#"
    INSERT INTO users (username, first_name, last_name, email, password_hash, role, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

/// Same as `INSERT_USER`, but the role falls back to admin while the table is empty
const INSERT_USER_FIRST_ADMIN: &str = r#"
    INSERT INTO users (username, first_name, last_name, email, password_hash, role, created_at, updated_at)
    SELECT ?, ?, ?, ?, ?, CASE WHEN existing.n > 0 THEN ? ELSE 'admin' END, ?, ?
    FROM (SELECT COUNT(*) AS n FROM users) AS existing
"#;

const UPDATE_USER: &str = r#"
    UPDATE users
    SET username = ?, first_name = ?, last_name = ?, email = ?, password_hash = ?, role = ?, updated_at = ?
    WHERE id = ?
"#;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Create a user, storing them as admin if no user exists yet
    ///
    /// The check and the insert are one statement, so two racing sign-ups
    /// cannot both become admin.
    async fn create_first_admin(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Update a user
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user (cascades to sessions, posts and comments)
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(sqlite(&self.pool)?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(mysql(&self.pool)?, user).await,
        }
    }

    async fn create_first_admin(&self, user: &User) -> Result<User> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                insert_user_sqlite(sqlite(&self.pool)?, INSERT_USER_FIRST_ADMIN, user).await?
            }
            DatabaseDriver::Mysql => {
                insert_user_mysql(mysql(&self.pool)?, INSERT_USER_FIRST_ADMIN, user).await?
            }
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {} not found after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_username_sqlite(sqlite(&self.pool)?, username).await
            }
            DatabaseDriver::Mysql => get_user_by_username_mysql(mysql(&self.pool)?, username).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_user_sqlite(sqlite(&self.pool)?, user).await,
            DatabaseDriver::Mysql => update_user_mysql(mysql(&self.pool)?, user).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM users WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let id = insert_user_sqlite(pool, INSERT_USER, user).await?;
    get_user_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User {} not found after insert", id))
}

async fn insert_user_sqlite(pool: &SqlitePool, sql: &str, user: &User) -> Result<i64> {
    let now = Utc::now();

    let result = sqlx::query(sql)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_username_sqlite(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by username")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(UPDATE_USER)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(Utc::now())
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let id = insert_user_mysql(pool, INSERT_USER, user).await?;
    get_user_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User {} not found after insert", id))
}

async fn insert_user_mysql(pool: &MySqlPool, sql: &str, user: &User) -> Result<i64> {
    let now = Utc::now();

    let result = sqlx::query(sql)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(result.last_insert_id() as i64)
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_username_mysql(pool: &MySqlPool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by username")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(UPDATE_USER)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(Utc::now())
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_mysql(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(username: &str) -> User {
        let mut user = User::new(username.to_string(), "hash".to_string(), UserRole::Author);
        user.first_name = "First".to_string();
        user.last_name = "Last".to_string();
        user
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo.create(&test_user("alice")).await.expect("Failed to create");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("not found");
        assert_eq!(by_id.username, "alice");
        assert_eq!(by_id.first_name, "First");
        assert_eq!(by_id.role, UserRole::Author);

        let by_name = repo.get_by_username("alice").await.unwrap().expect("not found");
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn test_missing_user_is_none() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_id(42).await.unwrap().is_none());
        assert!(repo.get_by_username("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("bob")).await.expect("first");
        assert!(repo.create(&test_user("bob")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_user() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&test_user("carol")).await.unwrap();

        user.username = "caroline".to_string();
        user.email = "c@example.com".to_string();
        let updated = repo.update(&user).await.expect("Failed to update");

        assert_eq!(updated.username, "caroline");
        assert_eq!(updated.email, "c@example.com");
        assert!(repo.get_by_username("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let repo = setup_test_repo().await;
        let user = repo.create(&test_user("dave")).await.unwrap();
        let other = repo.create(&test_user("erin")).await.unwrap();

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
        assert!(repo.get_by_id(other.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_only_first_user_is_created_as_admin() {
        let repo = setup_test_repo().await;

        let first = repo.create_first_admin(&test_user("frank")).await.unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(first.first_name, "First");

        let second = repo.create_first_admin(&test_user("gina")).await.unwrap();
        assert_eq!(second.role, UserRole::Author);
        let stored = repo.get_by_id(second.id).await.unwrap().unwrap();
        assert_eq!(stored.role, UserRole::Author);

        assert!(repo.create_first_admin(&test_user("gina")).await.is_err());
    }
}
