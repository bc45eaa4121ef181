//! Category service
//!
//! Implements business logic for category management:
//! - Create, read, update, delete categories (admin API)
//! - Slug validation and uniqueness
//! - Published-only lookup for the category feed
//!
//! The full list and slug lookups are cached; every mutation drops the
//! whole `category:` key space.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::{is_valid_slug, Category, CreateCategoryInput, UpdateCategoryInput};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Maximum length of a category title
pub const TITLE_MAX_LEN: usize = 256;

/// Cache key prefixes
const CACHE_KEY_CATEGORY_BY_SLUG: &str = "category:slug:";
const CACHE_KEY_CATEGORY_LIST: &str = "category:list";

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category slug already exists
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    /// Category not found (or hidden, for public lookups)
    #[error("Category not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service for managing blog categories
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CategoryService {
    /// Create a new category service using the cache's default TTL
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `ValidationError` for an empty or overlong title, or a malformed slug
    /// - `DuplicateSlug` if another category already uses the slug
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        validate_title(&input.title)?;
        validate_slug(&input.slug)?;

        if self.repo.get_by_slug(&input.slug).await.context("Failed to check slug uniqueness")?.is_some() {
            return Err(CategoryServiceError::DuplicateSlug(input.slug));
        }

        let mut category = Category::new(input.title, input.description, input.slug);
        category.is_published = input.is_published;

        let created = self.repo.create(&category).await.context("Failed to create category")?;
        self.invalidate_cache().await;

        tracing::info!(category_id = created.id, slug = %created.slug, "Category created");
        Ok(created)
    }

    /// Get category by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        let category = self.repo.get_by_id(id).await.context("Failed to get category by ID")?;
        Ok(category)
    }

    /// Get category by slug, published or not
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, CategoryServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_CATEGORY_BY_SLUG, slug);
        if let Some(category) = self.cache.get::<Category>(&cache_key).await.ok().flatten() {
            return Ok(Some(category));
        }

        let category = self.repo.get_by_slug(slug).await.context("Failed to get category by slug")?;

        if let Some(ref cat) = category {
            let _ = self.cache.set(&cache_key, cat, self.cache_ttl).await;
        }

        Ok(category)
    }

    /// The category behind a public feed
    ///
    /// Hidden categories are reported as `NotFound`, same as missing ones.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        match self.get_by_slug(slug).await? {
            Some(category) if category.is_published => Ok(category),
            _ => Err(CategoryServiceError::NotFound(slug.to_string())),
        }
    }

    /// List all categories ordered by title
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Some(list) = self.cache.get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST).await.ok().flatten() {
            return Ok(list);
        }

        let list = self.repo.list().await.context("Failed to list categories")?;
        let _ = self.cache.set(CACHE_KEY_CATEGORY_LIST, &list, self.cache_ttl).await;

        Ok(list)
    }

    /// Update a category; absent fields keep their value
    ///
    /// # Errors
    /// - `NotFound` if the category doesn't exist
    /// - `ValidationError` / `DuplicateSlug` as for `create`
    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> Result<Category, CategoryServiceError> {
        let mut category = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))?;

        if let Some(title) = input.title {
            validate_title(&title)?;
            category.title = title;
        }

        if let Some(slug) = input.slug {
            if slug != category.slug {
                validate_slug(&slug)?;
                if self.repo.get_by_slug(&slug).await.context("Failed to check slug uniqueness")?.is_some() {
                    return Err(CategoryServiceError::DuplicateSlug(slug));
                }
                category.slug = slug;
            }
        }

        if let Some(description) = input.description {
            category.description = description;
        }

        if let Some(is_published) = input.is_published {
            category.is_published = is_published;
        }

        let updated = self.repo.update(&category).await.context("Failed to update category")?;
        self.invalidate_cache().await;

        Ok(updated)
    }

    /// Delete a category; its posts stay, uncategorized
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete category")?;
        if !deleted {
            return Err(CategoryServiceError::NotFound(id.to_string()));
        }

        self.invalidate_cache().await;
        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }

    /// Invalidate all category-related cache entries
    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("category:*").await;
    }
}

fn validate_title(title: &str) -> Result<(), CategoryServiceError> {
    if title.trim().is_empty() {
        return Err(CategoryServiceError::ValidationError("Category title cannot be empty".to_string()));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category title cannot exceed {} characters",
            TITLE_MAX_LEN
        )));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> Result<(), CategoryServiceError> {
    if !is_valid_slug(slug) {
        return Err(CategoryServiceError::ValidationError(format!(
            "Slug may only contain latin letters, digits, hyphens and underscores: {}",
            slug
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxCategoryRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, CategoryService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let repo = SqlxCategoryRepository::boxed(pool.clone());
        let cache = create_cache(&CacheConfig::default());
        let service = CategoryService::new(repo, cache);

        (pool, service)
    }

    fn input(title: &str, slug: &str) -> CreateCategoryInput {
        CreateCategoryInput {
            title: title.to_string(),
            description: String::new(),
            slug: slug.to_string(),
            is_published: true,
        }
    }

    #[tokio::test]
    async fn test_create_category_success() {
        let (_pool, service) = setup_test_service().await;

        let category = service.create(input("Travel", "travel")).await.unwrap();

        assert!(category.id > 0);
        assert_eq!(category.slug, "travel");
        assert!(category.is_published);
    }

    #[tokio::test]
    async fn test_create_category_validation() {
        let (_pool, service) = setup_test_service().await;

        let result = service.create(input("  ", "blank")).await;
        assert!(matches!(result, Err(CategoryServiceError::ValidationError(_))));

        let result = service.create(input("Bad slug", "bad slug")).await;
        assert!(matches!(result, Err(CategoryServiceError::ValidationError(_))));

        let long_title = "x".repeat(TITLE_MAX_LEN + 1);
        let result = service.create(input(&long_title, "long")).await;
        assert!(matches!(result, Err(CategoryServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_create_category_duplicate_slug_fails() {
        let (_pool, service) = setup_test_service().await;
        service.create(input("Travel", "travel")).await.unwrap();

        let result = service.create(input("Trips", "travel")).await;
        assert!(matches!(result, Err(CategoryServiceError::DuplicateSlug(_))));
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_title() {
        let (_pool, service) = setup_test_service().await;
        service.create(input("Zoo", "zoo")).await.unwrap();
        service.create(input("Art", "art")).await.unwrap();

        let titles: Vec<String> = service.list().await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Art", "Zoo"]);
    }

    #[tokio::test]
    async fn test_cached_list_is_invalidated_on_change() {
        let (_pool, service) = setup_test_service().await;
        service.create(input("Art", "art")).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);

        service.create(input("Music", "music")).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hidden_category_is_not_found_publicly() {
        let (_pool, service) = setup_test_service().await;
        let category = service.create(input("Travel", "travel")).await.unwrap();
        assert!(service.get_published_by_slug("travel").await.is_ok());

        let update = UpdateCategoryInput {
            is_published: Some(false),
            ..Default::default()
        };
        service.update(category.id, update).await.unwrap();

        let result = service.get_published_by_slug("travel").await;
        assert!(matches!(result, Err(CategoryServiceError::NotFound(_))));
        assert!(service.get_by_slug("travel").await.unwrap().is_some());

        let result = service.get_published_by_slug("nowhere").await;
        assert!(matches!(result, Err(CategoryServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_category() {
        let (_pool, service) = setup_test_service().await;
        let category = service.create(input("Travel", "travel")).await.unwrap();
        service.create(input("Food", "food")).await.unwrap();

        let update = UpdateCategoryInput {
            title: Some("Journeys".into()),
            slug: Some("journeys".into()),
            ..Default::default()
        };
        let updated = service.update(category.id, update).await.unwrap();
        assert_eq!(updated.title, "Journeys");
        assert!(service.get_by_slug("travel").await.unwrap().is_none());

        let clash = UpdateCategoryInput {
            slug: Some("food".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(category.id, clash).await,
            Err(CategoryServiceError::DuplicateSlug(_))
        ));

        assert!(matches!(
            service.update(9999, UpdateCategoryInput::default()).await,
            Err(CategoryServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_category() {
        let (_pool, service) = setup_test_service().await;
        let category = service.create(input("Travel", "travel")).await.unwrap();
        service.get_by_slug("travel").await.unwrap();

        service.delete(category.id).await.unwrap();

        assert!(service.get_by_slug("travel").await.unwrap().is_none());
        assert!(matches!(
            service.delete(category.id).await,
            Err(CategoryServiceError::NotFound(_))
        ));
    }
}
