//! API middleware
//!
//! Contains middleware for:
//! - Session loading (cookie or Bearer token) for every request
//! - Login enforcement for HTML pages (redirect to the login form)
//! - Authentication and admin checks for the JSON admin API

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::cache::create_cache;
use crate::config::{Config, SiteConfig};
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCommentRepository, SqlxLocationRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    CategoryService, CommentService, LocationService, MediaService, PostService, UserService,
};
use crate::theme::ThemeEngine;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Where anonymous visitors are sent when a page needs a login
pub const LOGIN_URL: &str = "/auth/login";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub category_service: Arc<CategoryService>,
    pub location_service: Arc<LocationService>,
    pub media: Arc<MediaService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub site: Arc<SiteConfig>,
}

impl AppState {
    /// Wire repositories, services, cache and theme on top of a migrated pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let location_repo = SqlxLocationRepository::boxed(pool);

        let theme_engine = ThemeEngine::new(&config.theme.path)
            .context("Failed to load templates")?;

        Ok(Self {
            user_service: Arc::new(UserService::with_session_expiration(
                user_repo,
                session_repo,
                config.site.session_days,
            )),
            post_service: Arc::new(PostService::new(
                post_repo.clone(),
                category_repo.clone(),
                location_repo.clone(),
            )),
            comment_service: Arc::new(CommentService::new(comment_repo, post_repo)),
            category_service: Arc::new(CategoryService::new(category_repo, cache.clone())),
            location_service: Arc::new(LocationService::new(location_repo, cache)),
            media: Arc::new(MediaService::new(config.upload.clone())),
            theme_engine: Arc::new(theme_engine),
            site: Arc::new(config.site.clone()),
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The signed-in user if there is one; never rejects
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|au| au.0.clone()),
        ))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Extract session token from request
fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = request.headers().get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie
                    .strip_prefix(SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
                {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Session middleware
///
/// Attaches the signed-in user to the request when the token is valid.
/// A missing, expired or unknown token leaves the request anonymous.
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(&request) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Login URL that comes back to `path` afterwards
pub fn login_redirect_url(path: &str) -> String {
    format!("{}?next={}", LOGIN_URL, urlencoding::encode(path))
}

/// Page middleware: anonymous visitors are redirected to the login form
pub async fn require_login(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        return Redirect::to(&login_redirect_url(path)).into_response();
    }
    next.run(request).await
}

/// API middleware: rejects anonymous requests with 401
pub async fn require_auth(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return Err(ApiError::unauthorized("Missing or invalid session"));
    }
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if user.0.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// `Set-Cookie` value starting a session
pub fn session_cookie(token: &str, max_age_days: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age_days * 24 * 60 * 60
    )
}

/// `Set-Cookie` value ending a session
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use proptest::prelude::*;

    fn create_request_with_auth(token: &str) -> Request<Body> {
        Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn create_request_with_cookie(cookie: &str) -> Request<Body> {
        Request::builder()
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let request = create_request_with_auth("test-token-123");
        assert_eq!(extract_session_token(&request), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let request = create_request_with_cookie("theme=dark; session=abc-456");
        assert_eq!(extract_session_token(&request), Some("abc-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer bearer-token")
            .header(header::COOKIE, "session=cookie-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(&request), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_ignores_similar_cookies() {
        let request = create_request_with_cookie("sessionid=nope; session=");
        assert_eq!(extract_session_token(&request), None);
    }

    #[test]
    fn test_extract_session_token_invalid_bearer() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(&request), None);
    }

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::internal_error("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_body_shape() {
        let json = serde_json::to_value(ApiError::not_found("Category 3")).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Category 3");
    }

    #[test]
    fn test_login_redirect_url() {
        assert_eq!(
            login_redirect_url("/posts/3/edit"),
            "/auth/login?next=%2Fposts%2F3%2Fedit"
        );
    }

    #[test]
    fn test_session_cookies() {
        let cookie = session_cookie("abc", 7);
        assert!(cookie.starts_with("session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    fn guarded_router() -> axum::Router {
        axum::Router::new()
            .route("/private", axum::routing::get(|| async { "secret" }))
            .route_layer(axum::middleware::from_fn(require_login))
    }

    #[tokio::test]
    async fn test_require_login_redirects_anonymous() {
        use tower::ServiceExt;

        let request = Request::builder()
            .uri("/private?page=2")
            .body(Body::empty())
            .unwrap();
        let response = guarded_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login?next=%2Fprivate%3Fpage%3D2"
        );
    }

    #[tokio::test]
    async fn test_require_login_passes_signed_in_user() {
        use tower::ServiceExt;

        let mut request = Request::builder().uri("/private").body(Body::empty()).unwrap();
        request.extensions_mut().insert(AuthenticatedUser(User::new(
            "leo".into(),
            "h".into(),
            UserRole::Author,
        )));
        let response = guarded_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_require_admin_checks_role() {
        use tower::ServiceExt;

        let router = || {
            axum::Router::new()
                .route("/admin", axum::routing::get(|| async { "ok" }))
                .route_layer(axum::middleware::from_fn(require_admin))
        };
        let request = |role: Option<UserRole>| {
            let mut request = Request::builder().uri("/admin").body(Body::empty()).unwrap();
            if let Some(role) = role {
                request
                    .extensions_mut()
                    .insert(AuthenticatedUser(User::new("u".into(), "h".into(), role)));
            }
            request
        };

        let anonymous = router().oneshot(request(None)).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        let author = router().oneshot(request(Some(UserRole::Author))).await.unwrap();
        assert_eq!(author.status(), StatusCode::FORBIDDEN);
        let admin = router().oneshot(request(Some(UserRole::Admin))).await.unwrap();
        assert_eq!(admin.status(), StatusCode::OK);
    }

    proptest! {
        #[test]
        fn property_cookie_token_round_trip(token in "[A-Za-z0-9-]{1,40}") {
            let request = create_request_with_cookie(&format!("a=b; session={}; c=d", token));
            prop_assert_eq!(extract_session_token(&request), Some(token));
        }
    }
}
