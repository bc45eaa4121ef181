//! HTML page plumbing
//!
//! Handlers return `Result<Response, PageError>`. A `PageError` only marks
//! the response with an [`ErrorPage`]; the `render_error_pages` middleware
//! then renders `error.html` for it with the theme and the current user.

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::{request::Parts, StatusCode, Uri},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, AuthenticatedUser, Viewer};
use crate::services::{
    CategoryServiceError, CommentServiceError, LocationServiceError, MediaError,
    PostServiceError, UserServiceError,
};
use crate::theme::{simple_error_page, StandardTemplateVars};

/// Error raised by a page handler
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Page not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Marker left on error responses for `render_error_pages`
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PageError::NotFound => (StatusCode::NOT_FOUND, "Page not found".to_string()),
            PageError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            PageError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let mut response = (status, simple_error_page(status.as_u16(), &message)).into_response();
        response.extensions_mut().insert(ErrorPage { status, message });
        response
    }
}

impl From<PostServiceError> for PageError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(_) => PageError::NotFound,
            // Handlers check authorship themselves; reaching here is a bug.
            PostServiceError::NotAuthor { .. } => PageError::NotFound,
            PostServiceError::ValidationError(message) => PageError::BadRequest(message),
            PostServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<CommentServiceError> for PageError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound(_) | CommentServiceError::NotAuthor { .. } => {
                PageError::NotFound
            }
            CommentServiceError::ValidationError(message) => PageError::BadRequest(message),
            CommentServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<CategoryServiceError> for PageError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::NotFound(_) => PageError::NotFound,
            CategoryServiceError::DuplicateSlug(message)
            | CategoryServiceError::ValidationError(message) => PageError::BadRequest(message),
            CategoryServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<LocationServiceError> for PageError {
    fn from(e: LocationServiceError) -> Self {
        match e {
            LocationServiceError::NotFound(_) => PageError::NotFound,
            LocationServiceError::ValidationError(message) => PageError::BadRequest(message),
            LocationServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::NotFound(_) => PageError::NotFound,
            UserServiceError::InternalError(e) => PageError::Internal(e),
            other => PageError::BadRequest(other.to_string()),
        }
    }
}

impl From<MediaError> for PageError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::InternalError(e) => PageError::Internal(e),
            other => PageError::BadRequest(other.to_string()),
        }
    }
}

/// Ids taken from the URL path
///
/// A segment that does not parse as an id names nothing, so it is a 404
/// page rather than a plain 400.
#[derive(Debug, Clone, Copy)]
pub struct IdPath<T>(pub T);

impl<S, T> FromRequestParts<S> for IdPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(ids)) => Ok(IdPath(ids)),
            Err(rejection) => {
                tracing::debug!("Unmatched path ids: {}", rejection.body_text());
                Err(PageError::NotFound)
            }
        }
    }
}

/// Render `template` as a full page
pub fn render(
    state: &AppState,
    viewer: &Viewer,
    uri: &Uri,
    template: &str,
    context: &TeraContext,
) -> Result<Response, PageError> {
    let vars = StandardTemplateVars::new(&state.site.name, uri.path()).with_user(viewer.user());
    let html = state
        .theme_engine
        .render_with_standard_vars(template, context, &vars)?;
    Ok(Html(html).into_response())
}

/// Replace the body of marked error responses with the themed error page
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let viewer = Viewer(
        request
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|au| au.0.clone()),
    );
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let mut context = TeraContext::new();
    context.insert("status_code", &page.status.as_u16());
    context.insert("error_message", &page.message);
    let vars = StandardTemplateVars::new(&state.site.name, path).with_user(viewer.user());

    match state
        .theme_engine
        .render_with_standard_vars("error.html", &context, &vars)
    {
        Ok(html) => (page.status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render error page: {:#}", e);
            response
        }
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> PageError {
    PageError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_error_statuses() {
        assert_eq!(PageError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            PageError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PageError::Internal(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_is_marked() {
        let response = PageError::NotFound.into_response();
        let page = response.extensions().get::<ErrorPage>().unwrap();
        assert_eq!(page.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_id_path_rejects_non_ids_as_not_found() {
        use axum::{body::Body, routing::get, Router};
        use tower::ServiceExt;

        let router = Router::new().route(
            "/posts/{id}",
            get(|IdPath(id): IdPath<i64>| async move { id.to_string() }),
        );
        let get_status = |uri: &'static str| {
            let router = router.clone();
            async move {
                let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
                let response = router.oneshot(request).await.unwrap();
                let marked = response.extensions().get::<ErrorPage>().is_some();
                (response.status(), marked)
            }
        };

        assert_eq!(get_status("/posts/42").await, (StatusCode::OK, false));
        assert_eq!(get_status("/posts/abc").await, (StatusCode::NOT_FOUND, true));
        assert_eq!(
            get_status("/posts/99999999999999999999").await,
            (StatusCode::NOT_FOUND, true)
        );
    }

    #[test]
    fn test_service_errors_map_to_pages() {
        assert!(matches!(
            PageError::from(PostServiceError::NotFound(4)),
            PageError::NotFound
        ));
        assert!(matches!(
            PageError::from(CategoryServiceError::NotFound("travel".into())),
            PageError::NotFound
        ));
        assert!(matches!(
            PageError::from(MediaError::UnsupportedType("a.gif".into())),
            PageError::BadRequest(_)
        ));
        assert!(matches!(
            PageError::from(UserServiceError::InternalError(anyhow::anyhow!("db"))),
            PageError::Internal(_)
        ));
    }
}
