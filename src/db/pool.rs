//! Connection pools
//!
//! Repositories hold a `DynDatabasePool` and branch on `driver()`; the
//! concrete sqlx pool is borrowed through [`sqlite`] or [`mysql`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MAX_CONNECTIONS: u32 = 20;
const MYSQL_MAX_CONNECTIONS: u32 = 30;

/// A connected SQLite or MySQL pool
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run one statement, returning the affected row count
    async fn execute(&self, sql: &str) -> Result<u64>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

/// Shared handle to the configured pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// The pool behind a `DynDatabasePool`
pub enum Database {
    Sqlite(SqlitePool),
    Mysql(MySqlPool),
}

impl Database {
    /// Open a SQLite database; `:memory:` gives a private in-memory one
    pub async fn sqlite(url: &str) -> Result<Self> {
        let in_memory = url == ":memory:" || url.starts_with("sqlite::memory:");

        let connect_url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            let file = url.strip_prefix("sqlite:").unwrap_or(url);
            let file = file.split('?').next().unwrap_or(file);
            if let Some(dir) = Path::new(file).parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
            }
            if url.starts_with("sqlite:") {
                url.to_string()
            } else {
                format!("sqlite:{}", url)
            }
        };
        let options = SqliteConnectOptions::from_str(&connect_url)
            .with_context(|| format!("Invalid SQLite URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection is its own database: keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(SQLITE_MAX_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database {}", url))?;
        Ok(Database::Sqlite(pool))
    }

    /// Connect to MySQL; the `mysql://` scheme may be left out
    pub async fn mysql(url: &str) -> Result<Self> {
        let url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect(&url)
            .await
            .context("Failed to connect to MySQL")?;
        Ok(Database::Mysql(pool))
    }
}

#[async_trait]
impl DatabasePool for Database {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let result = match self {
            Database::Sqlite(pool) => sqlx::query(sql).execute(pool).await.map(|r| r.rows_affected()),
            Database::Mysql(pool) => sqlx::query(sql).execute(pool).await.map(|r| r.rows_affected()),
        };
        result.with_context(|| format!("Failed to execute: {}", sql))
    }

    async fn ping(&self) -> Result<()> {
        let answered = match self {
            Database::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            Database::Mysql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        answered.context("Database did not answer")
    }

    async fn close(&self) {
        match self {
            Database::Sqlite(pool) => pool.close().await,
            Database::Mysql(pool) => pool.close().await,
        }
    }

    fn driver(&self) -> DatabaseDriver {
        match self {
            Database::Sqlite(_) => DatabaseDriver::Sqlite,
            Database::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            Database::Sqlite(pool) => Some(pool),
            Database::Mysql(_) => None,
        }
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        match self {
            Database::Mysql(pool) => Some(pool),
            Database::Sqlite(_) => None,
        }
    }
}

/// Borrow the SQLite pool behind a `DynDatabasePool`
pub fn sqlite(pool: &DynDatabasePool) -> Result<&SqlitePool> {
    pool.as_sqlite().context("Database pool is not SQLite")
}

/// Borrow the MySQL pool behind a `DynDatabasePool`
pub fn mysql(pool: &DynDatabasePool) -> Result<&MySqlPool> {
    pool.as_mysql().context("Database pool is not MySQL")
}

/// Open the pool named by the `database` config section
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let database = match config.driver {
        DatabaseDriver::Sqlite => Database::sqlite(&config.url).await?,
        DatabaseDriver::Mysql => Database::mysql(&config.url).await?,
    };
    Ok(Arc::new(database))
}

/// Empty in-memory SQLite pool for tests
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_keeps_its_data() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(sqlite(&pool).is_ok());
        assert!(mysql(&pool).is_err());

        pool.execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
            .await
            .unwrap();
        // A second connection would see an empty database
        for _ in 0..3 {
            pool.execute("INSERT INTO notes (body) VALUES ('x')").await.unwrap();
        }
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(sqlite(&pool).unwrap())
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        pool.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY)").await.unwrap();
        pool.execute("CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id))")
            .await
            .unwrap();

        assert!(pool.execute("INSERT INTO child (parent_id) VALUES (42)").await.is_err());
    }

    #[tokio::test]
    async fn test_file_database_gets_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data").join("blogicum.db");

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: file.to_string_lossy().to_string(),
        })
        .await
        .expect("Failed to open file database");

        pool.ping().await.unwrap();
        assert!(file.exists());
        pool.close().await;
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_pool() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/blogicum_test".to_string());

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
        })
        .await
        .expect("Failed to connect");

        assert_eq!(pool.driver(), DatabaseDriver::Mysql);
        assert!(mysql(&pool).is_ok());
        pool.ping().await.unwrap();
    }
}
