//! Location service
//!
//! CRUD for the places posts can be attached to. The list feeding the post
//! form is cached and dropped on every change.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::LocationRepository;
use crate::models::{CreateLocationInput, Location, UpdateLocationInput};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Maximum length of a location name
pub const NAME_MAX_LEN: usize = 256;

const CACHE_KEY_LOCATION_LIST: &str = "location:list";

/// Error types for location service operations
#[derive(Debug, thiserror::Error)]
pub enum LocationServiceError {
    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Location service
pub struct LocationService {
    repo: Arc<dyn LocationRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl LocationService {
    pub fn new(repo: Arc<dyn LocationRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    pub async fn create(&self, input: CreateLocationInput) -> Result<Location, LocationServiceError> {
        validate_name(&input.name)?;

        let mut location = Location::new(input.name);
        location.is_published = input.is_published;

        let created = self.repo.create(&location).await.context("Failed to create location")?;
        self.invalidate_cache().await;

        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Location>, LocationServiceError> {
        let location = self.repo.get_by_id(id).await.context("Failed to get location by ID")?;
        Ok(location)
    }

    /// All locations ordered by name
    pub async fn list(&self) -> Result<Vec<Location>, LocationServiceError> {
        if let Some(list) = self.cache.get::<Vec<Location>>(CACHE_KEY_LOCATION_LIST).await.ok().flatten() {
            return Ok(list);
        }

        let list = self.repo.list().await.context("Failed to list locations")?;
        let _ = self.cache.set(CACHE_KEY_LOCATION_LIST, &list, self.cache_ttl).await;

        Ok(list)
    }

    pub async fn update(&self, id: i64, input: UpdateLocationInput) -> Result<Location, LocationServiceError> {
        let mut location = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get location")?
            .ok_or_else(|| LocationServiceError::NotFound(id.to_string()))?;

        if let Some(name) = input.name {
            validate_name(&name)?;
            location.name = name;
        }
        if let Some(is_published) = input.is_published {
            location.is_published = is_published;
        }

        let updated = self.repo.update(&location).await.context("Failed to update location")?;
        self.invalidate_cache().await;

        Ok(updated)
    }

    /// Delete a location; posts placed there keep existing without one
    pub async fn delete(&self, id: i64) -> Result<(), LocationServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete location")?;
        if !deleted {
            return Err(LocationServiceError::NotFound(id.to_string()));
        }

        self.invalidate_cache().await;
        Ok(())
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete(CACHE_KEY_LOCATION_LIST).await;
    }
}

fn validate_name(name: &str) -> Result<(), LocationServiceError> {
    if name.trim().is_empty() {
        return Err(LocationServiceError::ValidationError("Location name cannot be empty".to_string()));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(LocationServiceError::ValidationError(format!(
            "Location name cannot exceed {} characters",
            NAME_MAX_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxLocationRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> LocationService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        LocationService::new(
            SqlxLocationRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
        )
    }

    fn input(name: &str) -> CreateLocationInput {
        CreateLocationInput {
            name: name.to_string(),
            is_published: true,
        }
    }

    #[tokio::test]
    async fn test_location_lifecycle() {
        let service = setup_test_service().await;

        let moscow = service.create(input("Moscow")).await.unwrap();
        service.create(input("Kazan")).await.unwrap();

        let names: Vec<String> = service.list().await.unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Kazan", "Moscow"]);

        let update = UpdateLocationInput {
            name: Some("Saint Petersburg".into()),
            is_published: Some(false),
        };
        let updated = service.update(moscow.id, update).await.unwrap();
        assert!(!updated.is_published);

        let names: Vec<String> = service.list().await.unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Kazan", "Saint Petersburg"]);

        service.delete(moscow.id).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);
        assert!(matches!(
            service.delete(moscow.id).await,
            Err(LocationServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_location_validation() {
        let service = setup_test_service().await;

        assert!(matches!(
            service.create(input("")).await,
            Err(LocationServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.update(42, UpdateLocationInput::default()).await,
            Err(LocationServiceError::NotFound(_))
        ));
    }
}
