//! Comment repository
//!
//! Database operations for comments.
//!
//! This module provides:
//! - `CommentRepository` trait defining the interface for comment data access
//! - `SqlxCommentRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{AuthorSummary, Comment, CommentWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

const SELECT_COMMENT: &str =
    "SELECT id, post_id, author_id, text, created_at FROM comments WHERE id = ?";

const SELECT_POST_COMMENTS: &str = r#"
    SELECT cm.id, cm.post_id, cm.author_id, cm.text, cm.created_at,
           u.username AS author_username, u.first_name AS author_first_name,
           u.last_name AS author_last_name
    FROM comments cm
    INNER JOIN users u ON u.id = cm.author_id
    WHERE cm.post_id = ?
    ORDER BY cm.created_at ASC, cm.id ASC
"#;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    /// Get comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of a post with their authors, oldest first
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;

    /// Replace the text of a comment
    async fn update_text(&self, id: i64, text: &str) -> Result<()>;

    /// Delete a comment
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based comment repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    /// Create a new SQLx comment repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! comment_from_row {
    ($row:expr) => {
        Comment {
            id: $row.get("id"),
            post_id: $row.get("post_id"),
            author_id: $row.get("author_id"),
            text: $row.get("text"),
            created_at: $row.get("created_at"),
        }
    };
}

macro_rules! comment_with_author_from_row {
    ($row:expr) => {
        CommentWithAuthor {
            comment: comment_from_row!($row),
            author: AuthorSummary {
                id: $row.get("author_id"),
                username: $row.get("author_username"),
                first_name: $row.get("author_first_name"),
                last_name: $row.get("author_last_name"),
            },
        }
    };
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        let sql = "INSERT INTO comments (post_id, author_id, text, created_at) VALUES (?, ?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(&comment.text)
                .bind(comment.created_at)
                .execute(sqlite(&self.pool)?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(&comment.text)
                .bind(comment.created_at)
                .execute(mysql(&self.pool)?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create comment")?;

        Ok(Comment {
            id,
            ..comment.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let comment = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SELECT_COMMENT)
                .bind(id)
                .fetch_optional(sqlite(&self.pool)?)
                .await
                .context("Failed to get comment by ID")?
                .map(|row| comment_from_row!(row)),
            DatabaseDriver::Mysql => sqlx::query(SELECT_COMMENT)
                .bind(id)
                .fetch_optional(mysql(&self.pool)?)
                .await
                .context("Failed to get comment by ID")?
                .map(|row| comment_from_row!(row)),
        };
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        let comments = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SELECT_POST_COMMENTS)
                .bind(post_id)
                .fetch_all(sqlite(&self.pool)?)
                .await
                .context("Failed to list comments")?
                .into_iter()
                .map(|row| comment_with_author_from_row!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(SELECT_POST_COMMENTS)
                .bind(post_id)
                .fetch_all(mysql(&self.pool)?)
                .await
                .context("Failed to list comments")?
                .into_iter()
                .map(|row| comment_with_author_from_row!(row))
                .collect(),
        };
        Ok(comments)
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<()> {
        let sql = "UPDATE comments SET text = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(text)
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(text)
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update comment")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM comments WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete comment")?;

        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, Utc};

    async fn setup() -> (DynDatabasePool, SqlxCommentRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite_pool = pool.as_sqlite().unwrap();

        let author = sqlx::query("INSERT INTO users (username, first_name, password_hash) VALUES ('writer', 'Anna', 'hash')")
            .execute(sqlite_pool)
            .await
            .unwrap()
            .last_insert_rowid();
        let post = sqlx::query("INSERT INTO posts (title, text, pub_date, author_id) VALUES ('T', 'X', ?, ?)")
            .bind(Utc::now())
            .bind(author)
            .execute(sqlite_pool)
            .await
            .unwrap()
            .last_insert_rowid();

        let repo = SqlxCommentRepository::new(pool.clone());
        (pool, repo, author, post)
    }

    #[tokio::test]
    async fn test_create_and_get_comment() {
        let (_pool, repo, author, post) = setup().await;

        let created = repo
            .create(&Comment::new(post, author, "Nice".into()))
            .await
            .expect("Failed to create comment");

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.text, "Nice");
        assert_eq!(found.post_id, post);
        assert!(repo.get_by_id(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_comments_listed_oldest_first_with_author() {
        let (_pool, repo, author, post) = setup().await;
        let now = Utc::now();

        let mut later = Comment::new(post, author, "second".into());
        later.created_at = now;
        let mut earlier = Comment::new(post, author, "first".into());
        earlier.created_at = now - Duration::minutes(5);
        repo.create(&later).await.unwrap();
        repo.create(&earlier).await.unwrap();

        let comments = repo.list_for_post(post).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.comment.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(comments[0].author.username, "writer");
        assert_eq!(comments[0].author.first_name, "Anna");
    }

    #[tokio::test]
    async fn test_update_and_delete_comment() {
        let (_pool, repo, author, post) = setup().await;
        let comment = repo.create(&Comment::new(post, author, "typo".into())).await.unwrap();

        repo.update_text(comment.id, "fixed").await.unwrap();
        assert_eq!(repo.get_by_id(comment.id).await.unwrap().unwrap().text, "fixed");

        assert!(repo.delete(comment.id).await.unwrap());
        assert!(repo.list_for_post(post).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_post_removes_comments() {
        let (pool, repo, author, post) = setup().await;
        repo.create(&Comment::new(post, author, "bye".into())).await.unwrap();

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();

        assert!(repo.list_for_post(post).await.unwrap().is_empty());
    }
}
