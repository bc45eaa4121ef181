//! Category repository
//!
//! Database operations for categories.
//!
//! This module provides:
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";

const INSERT_CATEGORY: &str = r#"
    INSERT INTO categories (title, description, slug, is_published, created_at)
    VALUES (?, ?, ?, ?, ?)
"#;

const UPDATE_CATEGORY: &str = r#"
    UPDATE categories
    SET title = ?, description = ?, slug = ?, is_published = ?
    WHERE id = ?
"#;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// List all categories ordered by title
    async fn list(&self) -> Result<Vec<Category>>;

    /// Update a category
    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category; posts filed under it lose their category
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based category repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    /// Create a new SQLx category repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_category_sqlite(sqlite(&self.pool)?, category).await,
            DatabaseDriver::Mysql => create_category_mysql(mysql(&self.pool)?, category).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(sqlite(&self.pool)?)
                .await
                .context("Failed to get category by ID")?
                .as_ref()
                .map(row_to_category_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(mysql(&self.pool)?)
                .await
                .context("Failed to get category by ID")?
                .as_ref()
                .map(row_to_category_mysql)
                .transpose(),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE slug = ?", CATEGORY_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(sqlite(&self.pool)?)
                .await
                .context("Failed to get category by slug")?
                .as_ref()
                .map(row_to_category_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(mysql(&self.pool)?)
                .await
                .context("Failed to get category by slug")?
                .as_ref()
                .map(row_to_category_mysql)
                .transpose(),
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories ORDER BY title, id",
            CATEGORY_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .fetch_all(sqlite(&self.pool)?)
                .await
                .context("Failed to list categories")?
                .iter()
                .map(row_to_category_sqlite)
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .fetch_all(mysql(&self.pool)?)
                .await
                .context("Failed to list categories")?
                .iter()
                .map(row_to_category_mysql)
                .collect(),
        }
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(UPDATE_CATEGORY)
                .bind(&category.title)
                .bind(&category.description)
                .bind(&category.slug)
                .bind(category.is_published)
                .bind(category.id)
                .execute(sqlite(&self.pool)?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(UPDATE_CATEGORY)
                .bind(&category.title)
                .bind(&category.description)
                .bind(&category.slug)
                .bind(category.is_published)
                .bind(category.id)
                .execute(mysql(&self.pool)?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update category")?;

        self.get_by_id(category.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM categories WHERE id = ?";
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
        .context("Failed to delete category")?;

        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let result = sqlx::query(INSERT_CATEGORY)
        .bind(&category.title)
        .bind(&category.description)
        .bind(&category.slug)
        .bind(category.is_published)
        .bind(category.created_at)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        ..category.clone()
    })
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        slug: row.get("slug"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let result = sqlx::query(INSERT_CATEGORY)
        .bind(&category.title)
        .bind(&category.description)
        .bind(&category.slug)
        .bind(category.is_published)
        .bind(category.created_at)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        ..category.clone()
    })
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Category> {
    Ok(Category {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        slug: row.get("slug"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&Category::new("Travel".into(), "Trips".into(), "travel".into()))
            .await
            .expect("Failed to create category");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.slug, "travel");
        assert!(by_id.is_published);

        let by_slug = repo.get_by_slug("travel").await.unwrap().unwrap();
        assert_eq!(by_slug.id, created.id);
        assert!(repo.get_by_slug("food").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_title() {
        let repo = setup_test_repo().await;
        for (title, slug) in [("Zoo", "zoo"), ("Art", "art"), ("Music", "music")] {
            repo.create(&Category::new(title.into(), String::new(), slug.into()))
                .await
                .unwrap();
        }

        let titles: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Art", "Music", "Zoo"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut category = repo
            .create(&Category::new("Travel".into(), "Trips".into(), "travel".into()))
            .await
            .unwrap();

        category.is_published = false;
        category.slug = "trips".into();
        let updated = repo.update(&category).await.unwrap();
        assert!(!updated.is_published);
        assert_eq!(updated.slug, "trips");

        assert!(repo.delete(category.id).await.unwrap());
        assert!(repo.get_by_id(category.id).await.unwrap().is_none());
        assert!(!repo.delete(category.id).await.unwrap());
    }
}
