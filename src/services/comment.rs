//! Comment service
//!
//! Comments can only be added to posts the commenter is allowed to see.
//! Editing and deleting is reserved to the comment's author.

use crate::db::query::PostQuery;
use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CommentWithAuthor, User};
use crate::services::post::can_view;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Comment or post not found (or post not visible)
    #[error("Not found: {0}")]
    NotFound(String),

    /// User did not write the comment
    #[error("User is not the author of comment {comment_id}")]
    NotAuthor { post_id: i64, comment_id: i64 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    comment_repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(comment_repo: Arc<dyn CommentRepository>, post_repo: Arc<dyn PostRepository>) -> Self {
        Self {
            comment_repo,
            post_repo,
        }
    }

    /// Add a comment to a post visible to `author`
    ///
    /// # Errors
    /// - `NotFound` if the post is missing or hidden from `author`
    /// - `ValidationError` for blank text
    pub async fn add(
        &self,
        post_id: i64,
        author: &User,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, CommentServiceError> {
        let query = PostQuery::new().by_id(post_id).with_relations();
        let post = self
            .post_repo
            .find(&query, None)
            .await
            .context("Failed to get post")?
            .into_iter()
            .next()
            .filter(|item| can_view(item, Some(author), now))
            .ok_or_else(|| CommentServiceError::NotFound(format!("post {}", post_id)))?;

        let text = validate_text(text)?;
        let comment = self
            .comment_repo
            .create(&Comment::new(post.post.id, author.id, text))
            .await
            .context("Failed to create comment")?;

        Ok(comment)
    }

    /// Comments of a post, oldest first
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        let comments = self
            .comment_repo
            .list_for_post(post_id)
            .await
            .context("Failed to list comments")?;
        Ok(comments)
    }

    /// A comment the user is about to change
    ///
    /// # Errors
    /// - `NotFound` if no such comment belongs to `post_id`
    /// - `NotAuthor` if `user` did not write it
    pub async fn get_for_author(
        &self,
        post_id: i64,
        comment_id: i64,
        user: &User,
    ) -> Result<Comment, CommentServiceError> {
        let comment = self
            .comment_repo
            .get_by_id(comment_id)
            .await
            .context("Failed to get comment")?
            .filter(|c| c.post_id == post_id)
            .ok_or_else(|| CommentServiceError::NotFound(format!("comment {}", comment_id)))?;

        if !user.is_author_of(comment.author_id) {
            return Err(CommentServiceError::NotAuthor { post_id, comment_id });
        }
        Ok(comment)
    }

    /// Replace the text of the user's own comment
    pub async fn update(
        &self,
        post_id: i64,
        comment_id: i64,
        user: &User,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let comment = self.get_for_author(post_id, comment_id, user).await?;
        let text = validate_text(text)?;

        self.comment_repo
            .update_text(comment.id, &text)
            .await
            .context("Failed to update comment")?;

        Ok(Comment { text, ..comment })
    }

    /// Delete the user's own comment
    pub async fn delete(&self, post_id: i64, comment_id: i64, user: &User) -> Result<(), CommentServiceError> {
        let comment = self.get_for_author(post_id, comment_id, user).await?;

        self.comment_repo
            .delete(comment.id)
            .await
            .context("Failed to delete comment")?;

        Ok(())
    }
}

fn validate_text(text: &str) -> Result<String, CommentServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommentServiceError::ValidationError("Comment cannot be empty".to_string()));
    }
    Ok(text.to_string())
}
