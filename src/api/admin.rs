//! Admin API endpoints
//!
//! JSON management of the reference data and of user accounts:
//! - GET/POST   /api/admin/categories
//! - PUT/DELETE /api/admin/categories/{id}
//! - GET/POST   /api/admin/locations
//! - PUT/DELETE /api/admin/locations/{id}
//! - DELETE     /api/admin/users/{id}
//!
//! Every route requires an administrator (session cookie or Bearer token).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    Category, CreateCategoryInput, CreateLocationInput, Location, UpdateCategoryInput,
    UpdateLocationInput,
};
use crate::services::{
    CategoryServiceError, LocationServiceError, UserServiceError,
};

/// Response for a category
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            title: category.title,
            description: category.description,
            slug: category.slug,
            is_published: category.is_published,
            created_at: category.created_at.to_rfc3339(),
        }
    }
}

/// Response for a location
#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: String,
}

impl From<Location> for LocationResponse {
    fn from(location: Location) -> Self {
        Self {
            id: location.id,
            name: location.name,
            is_published: location.is_published,
            created_at: location.created_at.to_rfc3339(),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::DuplicateSlug(slug) => {
                ApiError::conflict(format!("Category slug already exists: {}", slug))
            }
            CategoryServiceError::NotFound(what) => {
                ApiError::not_found(format!("Category not found: {}", what))
            }
            CategoryServiceError::ValidationError(message) => ApiError::validation_error(message),
            CategoryServiceError::InternalError(e) => {
                tracing::error!("Category operation failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<LocationServiceError> for ApiError {
    fn from(e: LocationServiceError) -> Self {
        match e {
            LocationServiceError::NotFound(what) => {
                ApiError::not_found(format!("Location not found: {}", what))
            }
            LocationServiceError::ValidationError(message) => ApiError::validation_error(message),
            LocationServiceError::InternalError(e) => {
                tracing::error!("Location operation failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::NotFound(id) => ApiError::not_found(format!("User not found: {}", id)),
            UserServiceError::UserExists(name) => {
                ApiError::conflict(format!("User already exists: {}", name))
            }
            UserServiceError::AuthenticationError(message) => ApiError::unauthorized(message),
            UserServiceError::ValidationError(message) => ApiError::validation_error(message),
            UserServiceError::InternalError(e) => {
                tracing::error!("User operation failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", put(update_category).delete(delete_category))
        .route("/locations", get(list_locations).post(create_location))
        .route("/locations/{id}", put(update_location).delete(delete_location))
        .route("/users/{id}", delete(delete_user))
}

/// GET /api/admin/categories
async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = state.category_service.list().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

/// POST /api/admin/categories
async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let category = state.category_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(category.into())))
}

/// PUT /api/admin/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateCategoryInput>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = state.category_service.update(id, input).await?;
    Ok(Json(category.into()))
}

/// DELETE /api/admin/categories/{id}
///
/// Posts of the category are kept and lose their category.
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/locations
async fn list_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<LocationResponse>>, ApiError> {
    let locations = state.location_service.list().await?;
    Ok(Json(locations.into_iter().map(Into::into).collect()))
}

/// POST /api/admin/locations
async fn create_location(
    State(state): State<AppState>,
    Json(input): Json<CreateLocationInput>,
) -> Result<(StatusCode, Json<LocationResponse>), ApiError> {
    let location = state.location_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(location.into())))
}

/// PUT /api/admin/locations/{id}
async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateLocationInput>,
) -> Result<Json<LocationResponse>, ApiError> {
    let location = state.location_service.update(id, input).await?;
    Ok(Json(location.into()))
}

/// DELETE /api/admin/locations/{id}
async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.location_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/admin/users/{id}
///
/// Removes the user's posts and comments with them. Administrators cannot
/// delete their own account here.
async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if admin.id == id {
        return Err(ApiError::validation_error("Cannot delete your own account"));
    }
    state.user_service.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
