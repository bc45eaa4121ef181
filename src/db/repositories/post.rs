//! Post repository
//!
//! Database operations for posts. Listings are driven by `PostQuery`, which
//! decides the filters, joins and annotations; this module only binds its
//! arguments and maps the rows it selects.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::query::{PostQuery, QueryArg};
use crate::db::DynDatabasePool;
use crate::models::{AuthorSummary, Category, ListParams, Location, Post, PostInput, PostListItem};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const SELECT_POST: &str = r#"
    SELECT id, title, text, pub_date, author_id, location_id, category_id, image, is_published, created_at
    FROM posts
    WHERE id = ?
"#;

const INSERT_POST: &str = r#"
    INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id, image, is_published, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_POST: &str = r#"
    UPDATE posts
    SET title = ?, text = ?, pub_date = ?, location_id = ?, category_id = ?, image = ?, is_published = ?
    WHERE id = ?
"#;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a post owned by `author_id`
    async fn create(&self, author_id: i64, input: &PostInput) -> Result<Post>;

    /// Get a post by ID regardless of visibility
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Replace the editable fields of a post
    async fn update(&self, id: i64, input: &PostInput) -> Result<Post>;

    /// Delete a post and, by cascade, its comments
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Run a listing query, optionally limited to one page
    async fn find(&self, query: &PostQuery, page: Option<&ListParams>) -> Result<Vec<PostListItem>>;

    /// Count the rows a listing query matches
    async fn count(&self, query: &PostQuery) -> Result<i64>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! post_from_row {
    ($row:expr) => {
        Post {
            id: $row.get("id"),
            title: $row.get("title"),
            text: $row.get("text"),
            pub_date: $row.get("pub_date"),
            author_id: $row.get("author_id"),
            location_id: $row.get("location_id"),
            category_id: $row.get("category_id"),
            image: $row.get("image"),
            is_published: $row.get("is_published"),
            created_at: $row.get("created_at"),
        }
    };
}

macro_rules! post_item_from_row {
    ($row:expr, $query:expr) => {{
        let row = $row;
        let post = post_from_row!(row);
        let (author, category, location) = if $query.has_relations() {
            (
                Some(AuthorSummary {
                    id: post.author_id,
                    username: row.get("author_username"),
                    first_name: row.get("author_first_name"),
                    last_name: row.get("author_last_name"),
                }),
                post.category_id.map(|id| Category {
                    id,
                    title: row.get("category_title"),
                    description: row.get("category_description"),
                    slug: row.get("category_slug"),
                    is_published: row.get("category_is_published"),
                    created_at: row.get("category_created_at"),
                }),
                post.location_id.map(|id| Location {
                    id,
                    name: row.get("location_name"),
                    is_published: row.get("location_is_published"),
                    created_at: row.get("location_created_at"),
                }),
            )
        } else {
            (None, None, None)
        };
        let comment_count = if $query.has_comment_count() {
            Some(row.get::<i64, _>("comment_count"))
        } else {
            None
        };
        PostListItem {
            post,
            author,
            category,
            location,
            comment_count,
        }
    }};
}

macro_rules! bind_query_args {
    ($sql_query:expr, $args:expr) => {{
        let mut bound = $sql_query;
        for arg in $args {
            bound = match arg {
                QueryArg::Time(time) => bound.bind(time),
                QueryArg::Id(id) => bound.bind(id),
            };
        }
        bound
    }};
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, author_id: i64, input: &PostInput) -> Result<Post> {
        let created_at = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_POST)
                .bind(&input.title)
                .bind(&input.text)
                .bind(input.pub_date)
                .bind(author_id)
                .bind(input.location_id)
                .bind(input.category_id)
                .bind(&input.image)
                .bind(input.is_published)
                .bind(created_at)
                .execute(sqlite(&self.pool)?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(INSERT_POST)
                .bind(&input.title)
                .bind(&input.text)
                .bind(input.pub_date)
                .bind(author_id)
                .bind(input.location_id)
                .bind(input.category_id)
                .bind(&input.image)
                .bind(input.is_published)
                .bind(created_at)
                .execute(mysql(&self.pool)?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create post")?;

        Ok(Post {
            id,
            title: input.title.clone(),
            text: input.text.clone(),
            pub_date: input.pub_date,
            author_id,
            location_id: input.location_id,
            category_id: input.category_id,
            image: input.image.clone(),
            is_published: input.is_published,
            created_at,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let post = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SELECT_POST)
                .bind(id)
                .fetch_optional(sqlite(&self.pool)?)
                .await
                .context("Failed to get post by ID")?
                .map(|row| post_from_row!(row)),
            DatabaseDriver::Mysql => sqlx::query(SELECT_POST)
                .bind(id)
                .fetch_optional(mysql(&self.pool)?)
                .await
                .context("Failed to get post by ID")?
                .map(|row| post_from_row!(row)),
        };
        Ok(post)
    }

    async fn update(&self, id: i64, input: &PostInput) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(UPDATE_POST)
                .bind(&input.title)
                .bind(&input.text)
                .bind(input.pub_date)
                .bind(input.location_id)
                .bind(input.category_id)
                .bind(&input.image)
                .bind(input.is_published)
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(UPDATE_POST)
                .bind(&input.title)
                .bind(&input.text)
                .bind(input.pub_date)
                .bind(input.location_id)
                .bind(input.category_id)
                .bind(&input.image)
                .bind(input.is_published)
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update post")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM posts WHERE id = ?";
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
        .context("Failed to delete post")?;

        Ok(affected > 0)
    }

    async fn find(&self, query: &PostQuery, page: Option<&ListParams>) -> Result<Vec<PostListItem>> {
        let sql = query.select_sql(page.is_some());
        let args = query.args();

        let items = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut bound = bind_query_args!(sqlx::query(&sql), args);
                if let Some(page) = page {
                    bound = bound.bind(page.limit()).bind(page.offset());
                }
                bound
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to list posts")?
                    .into_iter()
                    .map(|row| post_item_from_row!(row, query))
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let mut bound = bind_query_args!(sqlx::query(&sql), args);
                if let Some(page) = page {
                    bound = bound.bind(page.limit()).bind(page.offset());
                }
                bound
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to list posts")?
                    .into_iter()
                    .map(|row| post_item_from_row!(row, query))
                    .collect()
            }
        };
        Ok(items)
    }

    async fn count(&self, query: &PostQuery) -> Result<i64> {
        let sql = query.count_sql();
        let args = query.args();

        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_query_args!(sqlx::query(&sql), args)
                .fetch_one(sqlite(&self.pool)?)
                .await
                .context("Failed to count posts")?
                .get::<i64, _>(0),
            DatabaseDriver::Mysql => bind_query_args!(sqlx::query(&sql), args)
                .fetch_one(mysql(&self.pool)?)
                .await
                .context("Failed to count posts")?
                .get::<i64, _>(0),
        };
        Ok(count)
    }
}
