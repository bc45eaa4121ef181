//! HTTP layer - handlers and routing
//!
//! This module contains every route of the Blogicum site:
//! - Feed, post, comment and profile pages (server-rendered HTML)
//! - Registration, login and logout pages
//! - Admin JSON API for categories, locations and users
//! - Uploaded media under `/media`

pub mod admin;
pub mod auth;
pub mod comments;
pub mod middleware;
pub mod pages;
pub mod posts;
pub mod profiles;

use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, Router};
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
pub use pages::PageError;

/// Room for the text fields sent along with an image
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the HTML page router
pub fn build_page_router() -> Router<AppState> {
    // Pages that need a signed-in user
    let protected_routes = Router::new()
        .merge(posts::protected_router())
        .merge(comments::router())
        .merge(profiles::protected_router())
        .route_layer(axum_middleware::from_fn(middleware::require_login));

    Router::new()
        .merge(posts::public_router())
        .merge(profiles::public_router())
        .merge(auth::router())
        .merge(protected_routes)
}

/// Build the admin API router (needs admin role)
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn(middleware::require_auth))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.media.max_file_size() as usize + FORM_OVERHEAD_BYTES;
    let media = ServeDir::new(state.media.root());

    Router::new()
        .merge(build_page_router())
        .nest("/api", build_api_router())
        .nest_service("/media", media)
        .fallback(pages::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            pages::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_session,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
