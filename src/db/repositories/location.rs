//! Location repository
//!
//! - `LocationRepository` trait defining the interface for location data access
//! - `SqlxLocationRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::Location;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

const LOCATION_COLUMNS: &str = "id, name, is_published, created_at";

/// Location repository trait
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Create a new location
    async fn create(&self, location: &Location) -> Result<Location>;

    /// Get location by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Location>>;

    /// List all locations ordered by name
    async fn list(&self) -> Result<Vec<Location>>;

    /// Update a location
    async fn update(&self, location: &Location) -> Result<Location>;

    /// Delete a location; posts placed there lose their location
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based location repository implementation
pub struct SqlxLocationRepository {
    pool: DynDatabasePool,
}

impl SqlxLocationRepository {
    /// Create a new SQLx location repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LocationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LocationRepository for SqlxLocationRepository {
    async fn create(&self, location: &Location) -> Result<Location> {
        let sql = "INSERT INTO locations (name, is_published, created_at) VALUES (?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&location.name)
                .bind(location.is_published)
                .bind(location.created_at)
                .execute(sqlite(&self.pool)?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&location.name)
                .bind(location.is_published)
                .bind(location.created_at)
                .execute(mysql(&self.pool)?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create location")?;

        Ok(Location {
            id,
            ..location.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        let sql = format!("SELECT {} FROM locations WHERE id = ?", LOCATION_COLUMNS);
        let location = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(sqlite(&self.pool)?)
                .await
                .context("Failed to get location by ID")?
                .map(|row| Location {
                    id: row.get("id"),
                    name: row.get("name"),
                    is_published: row.get("is_published"),
                    created_at: row.get("created_at"),
                }),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(mysql(&self.pool)?)
                .await
                .context("Failed to get location by ID")?
                .map(|row| Location {
                    id: row.get("id"),
                    name: row.get("name"),
                    is_published: row.get("is_published"),
                    created_at: row.get("created_at"),
                }),
        };
        Ok(location)
    }

    async fn list(&self) -> Result<Vec<Location>> {
        let sql = format!("SELECT {} FROM locations ORDER BY name, id", LOCATION_COLUMNS);
        let locations = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .fetch_all(sqlite(&self.pool)?)
                .await
                .context("Failed to list locations")?
                .into_iter()
                .map(|row| Location {
                    id: row.get("id"),
                    name: row.get("name"),
                    is_published: row.get("is_published"),
                    created_at: row.get("created_at"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .fetch_all(mysql(&self.pool)?)
                .await
                .context("Failed to list locations")?
                .into_iter()
                .map(|row| Location {
                    id: row.get("id"),
                    name: row.get("name"),
                    is_published: row.get("is_published"),
                    created_at: row.get("created_at"),
                })
                .collect(),
        };
        Ok(locations)
    }

    async fn update(&self, location: &Location) -> Result<Location> {
        let sql = "UPDATE locations SET name = ?, is_published = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&location.name)
                .bind(location.is_published)
                .bind(location.id)
                .execute(sqlite(&self.pool)?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&location.name)
                .bind(location.is_published)
                .bind(location.id)
                .execute(mysql(&self.pool)?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update location")?;

        self.get_by_id(location.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Location not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM locations WHERE id = ?";
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
        .context("Failed to delete location")?;

        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxLocationRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxLocationRepository::new(pool)
    }

    #[tokio::test]
    async fn test_location_crud() {
        let repo = setup_test_repo().await;

        let created = repo.create(&Location::new("Island".into())).await.unwrap();
        repo.create(&Location::new("Forest".into())).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Forest", "Island"]);

        let mut location = repo.get_by_id(created.id).await.unwrap().unwrap();
        location.is_published = false;
        let updated = repo.update(&location).await.unwrap();
        assert!(!updated.is_published);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
