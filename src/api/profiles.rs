//! Profile pages
//!
//! - GET  /profile/{username} - a user's posts
//! - GET/POST /profile/edit   - edit own profile (signed in)

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, AuthenticatedUser, Viewer};
use crate::api::pages::{render, PageError};
use crate::api::posts::{profile_url, PageQuery};
use crate::forms::{FormErrors, ProfileForm};
use crate::services::UserServiceError;

pub fn public_router() -> Router<AppState> {
    Router::new().route("/profile/{username}", get(profile))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/profile/edit", get(edit_profile_form).post(edit_profile))
}

/// GET /profile/{username}
///
/// The owner also sees drafts and scheduled posts.
async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let profile = state
        .user_service
        .get_by_username(&username)
        .await?
        .ok_or(PageError::NotFound)?;

    let page_obj = state
        .post_service
        .profile_feed(&profile, viewer.user(), Utc::now(), query.page.as_deref())
        .await?;
    let is_owner = viewer.user().is_some_and(|user| user.id == profile.id);

    let mut context = TeraContext::new();
    context.insert("profile", &profile);
    context.insert("page_obj", &page_obj);
    context.insert("is_owner", &is_owner);
    render(&state, &viewer, &uri, "blog/profile.html", &context)
}

fn profile_form_page(
    state: &AppState,
    viewer: &Viewer,
    uri: &Uri,
    form: &ProfileForm,
    errors: &FormErrors,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    render(state, viewer, uri, "blog/user.html", &context)
}

/// GET /profile/edit
async fn edit_profile_form(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
) -> Result<Response, PageError> {
    let form = ProfileForm::from_user(&user);
    profile_form_page(&state, &Viewer(Some(user)), &uri, &form, &FormErrors::new())
}

/// POST /profile/edit - On success go to the (possibly renamed) profile
async fn edit_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    Form(form): Form<ProfileForm>,
) -> Result<Response, PageError> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return profile_form_page(&state, &Viewer(Some(user)), &uri, &form, &errors),
    };

    match state.user_service.update_profile(&user, input).await {
        Ok(updated) => Ok(Redirect::to(&profile_url(&updated)).into_response()),
        Err(UserServiceError::UserExists(_)) => {
            let mut errors = FormErrors::new();
            errors.add_field("username", "A user with that username already exists.");
            profile_form_page(&state, &Viewer(Some(user)), &uri, &form, &errors)
        }
        Err(UserServiceError::ValidationError(message)) => {
            let mut errors = FormErrors::new();
            errors.add_form(message);
            profile_form_page(&state, &Viewer(Some(user)), &uri, &form, &errors)
        }
        Err(e) => Err(e.into()),
    }
}
