//! Comment pages
//!
//! - POST /posts/{id}/comment                   - add a comment
//! - GET/POST /posts/{id}/edit_comment/{cid}    - edit own comment
//! - GET/POST /posts/{id}/delete_comment/{cid}  - confirm / delete own comment
//!
//! All of them need a signed-in user. Anyone but the comment's author is
//! sent back to the post.

use axum::{
    extract::State,
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, AuthenticatedUser, Viewer};
use crate::api::pages::{render, IdPath, PageError};
use crate::api::posts::{detail_url, render_detail};
use crate::forms::{CommentForm, FormErrors};
use crate::models::{Comment, User};
use crate::services::CommentServiceError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/comment", post(add_comment))
        .route(
            "/posts/{id}/edit_comment/{comment_id}",
            get(edit_comment_form).post(edit_comment),
        )
        .route(
            "/posts/{id}/delete_comment/{comment_id}",
            get(delete_comment_confirm).post(delete_comment),
        )
}

/// POST /posts/{id}/comment
///
/// A blank comment re-renders the post with the error under the form.
async fn add_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    IdPath(id): IdPath<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => {
            let viewer = Viewer(Some(user));
            return render_detail(&state, &viewer, &uri, id, &form, &errors).await;
        }
    };

    let comment = state
        .comment_service
        .add(id, &user, &text, Utc::now())
        .await?;
    tracing::debug!(post_id = id, comment_id = comment.id, "Comment added");

    Ok(Redirect::to(&detail_url(id)).into_response())
}

/// Load a comment for changing it; anyone but the author is sent to the post
async fn own_comment(
    state: &AppState,
    post_id: i64,
    comment_id: i64,
    user: &User,
) -> Result<Result<Comment, Response>, PageError> {
    match state
        .comment_service
        .get_for_author(post_id, comment_id, user)
        .await
    {
        Ok(comment) => Ok(Ok(comment)),
        Err(CommentServiceError::NotAuthor { post_id, .. }) => {
            Ok(Err(Redirect::to(&detail_url(post_id)).into_response()))
        }
        Err(e) => Err(e.into()),
    }
}

fn comment_page(
    state: &AppState,
    user: User,
    uri: &Uri,
    comment: &Comment,
    form: &CommentForm,
    errors: &FormErrors,
    is_delete: bool,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("post_id", &comment.post_id);
    context.insert("comment", comment);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("is_delete", &is_delete);
    render(state, &Viewer(Some(user)), uri, "blog/comment.html", &context)
}

/// GET /posts/{id}/edit_comment/{comment_id}
async fn edit_comment_form(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    IdPath((id, comment_id)): IdPath<(i64, i64)>,
) -> Result<Response, PageError> {
    let comment = match own_comment(&state, id, comment_id, &user).await? {
        Ok(comment) => comment,
        Err(redirect) => return Ok(redirect),
    };

    let form = CommentForm::from_comment(&comment);
    comment_page(&state, user, &uri, &comment, &form, &FormErrors::new(), false)
}

/// POST /posts/{id}/edit_comment/{comment_id}
async fn edit_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    IdPath((id, comment_id)): IdPath<(i64, i64)>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let comment = match own_comment(&state, id, comment_id, &user).await? {
        Ok(comment) => comment,
        Err(redirect) => return Ok(redirect),
    };

    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => return comment_page(&state, user, &uri, &comment, &form, &errors, false),
    };

    state
        .comment_service
        .update(id, comment_id, &user, &text)
        .await?;

    Ok(Redirect::to(&detail_url(id)).into_response())
}

/// GET /posts/{id}/delete_comment/{comment_id} - Confirmation page
async fn delete_comment_confirm(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    IdPath((id, comment_id)): IdPath<(i64, i64)>,
) -> Result<Response, PageError> {
    let comment = match own_comment(&state, id, comment_id, &user).await? {
        Ok(comment) => comment,
        Err(redirect) => return Ok(redirect),
    };

    let form = CommentForm::from_comment(&comment);
    comment_page(&state, user, &uri, &comment, &form, &FormErrors::new(), true)
}

/// POST /posts/{id}/delete_comment/{comment_id}
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    IdPath((id, comment_id)): IdPath<(i64, i64)>,
) -> Result<Response, PageError> {
    match state.comment_service.delete(id, comment_id, &user).await {
        Ok(()) | Err(CommentServiceError::NotAuthor { .. }) => {
            Ok(Redirect::to(&detail_url(id)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
