//! Post pages
//!
//! - GET  /                       - index feed
//! - GET  /category/{slug}        - category feed
//! - GET  /posts/{id}             - post detail with comments
//! - GET/POST /posts/create       - create a post
//! - GET/POST /posts/{id}/edit    - edit own post
//! - GET/POST /posts/{id}/delete  - confirm / delete own post
//!
//! Post forms are `multipart/form-data` because of the image field.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, AuthenticatedUser, Viewer};
use crate::api::pages::{render, IdPath, PageError};
use crate::forms::{CommentForm, FormErrors, PostForm, UploadedFile};
use crate::models::{Post, PostInput, User};
use crate::services::PostServiceError;

/// `?page=` as typed by the visitor; parsed leniently later
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Public post pages
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/category/{slug}", get(category_posts))
        .route("/posts/{id}", get(post_detail))
}

/// Post pages that need a signed-in user
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/posts/create", get(create_post_form).post(create_post))
        .route("/posts/{id}/edit", get(edit_post_form).post(edit_post))
        .route("/posts/{id}/delete", get(delete_post_confirm).post(delete_post))
}

pub(crate) fn profile_url(user: &User) -> String {
    format!("/profile/{}", urlencoding::encode(&user.username))
}

pub(crate) fn detail_url(post_id: i64) -> String {
    format!("/posts/{}", post_id)
}

/// GET / - Posts visible to everybody, newest first
async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let page_obj = state
        .post_service
        .index_feed(Utc::now(), query.page.as_deref())
        .await?;

    let mut context = TeraContext::new();
    context.insert("page_obj", &page_obj);
    render(&state, &viewer, &uri, "blog/index.html", &context)
}

/// GET /category/{slug} - Feed of a published category
async fn category_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let category = state.category_service.get_published_by_slug(&slug).await?;
    let page_obj = state
        .post_service
        .category_feed(&category, Utc::now(), query.page.as_deref())
        .await?;

    let mut context = TeraContext::new();
    context.insert("category", &category);
    context.insert("page_obj", &page_obj);
    render(&state, &viewer, &uri, "blog/category.html", &context)
}

/// GET /posts/{id} - A post and its comments
async fn post_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    IdPath(id): IdPath<i64>,
) -> Result<Response, PageError> {
    render_detail(&state, &viewer, &uri, id, &CommentForm::default(), &FormErrors::new()).await
}

/// Detail page, also used to re-render a rejected comment
pub(crate) async fn render_detail(
    state: &AppState,
    viewer: &Viewer,
    uri: &Uri,
    id: i64,
    form: &CommentForm,
    errors: &FormErrors,
) -> Result<Response, PageError> {
    let post = state.post_service.detail(id, viewer.user(), Utc::now()).await?;
    let comments = state.comment_service.list_for_post(id).await?;
    let is_author = viewer
        .user()
        .is_some_and(|user| user.is_author_of(post.post.author_id));

    let mut context = TeraContext::new();
    context.insert("post", &post);
    context.insert("comments", &comments);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("is_author", &is_author);
    render(state, viewer, uri, "blog/detail.html", &context)
}

/// Read a submitted post form; the image part is kept only when a file was chosen
async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, PageError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PageError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| PageError::BadRequest(e.body_text()))?;
            if !filename.is_empty() && !data.is_empty() {
                form.image = Some(UploadedFile {
                    filename,
                    data: data.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| PageError::BadRequest(e.body_text()))?;
            form.set_field(&name, value);
        }
    }

    Ok(form)
}

/// Create/edit/delete page context shared by the post form views
async fn post_form_page(
    state: &AppState,
    viewer: &Viewer,
    uri: &Uri,
    form: &PostForm,
    errors: &FormErrors,
    post: Option<&Post>,
) -> Result<Response, PageError> {
    let categories = state.category_service.list().await?;
    let locations = state.location_service.list().await?;

    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("categories", &categories);
    context.insert("locations", &locations);
    context.insert("is_edit", &post.is_some());
    context.insert("is_delete", &false);
    if let Some(post) = post {
        context.insert("post", post);
    }
    render(state, viewer, uri, "blog/create.html", &context)
}

/// Validate a submission and store its new image, if any
async fn accept_post_form(
    state: &AppState,
    form: &PostForm,
    current_image: Option<&str>,
) -> Result<Result<PostInput, FormErrors>, PageError> {
    let categories = state.category_service.list().await?;
    let locations = state.location_service.list().await?;

    let mut input = match form.validate(&categories, &locations, &state.media, current_image) {
        Ok(input) => input,
        Err(errors) => return Ok(Err(errors)),
    };
    if let Some(file) = &form.image {
        input.image = Some(state.media.store_post_image(&file.filename, &file.data).await?);
    }
    Ok(Ok(input))
}

/// GET /posts/create
async fn create_post_form(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
) -> Result<Response, PageError> {
    let form = PostForm::blank(Utc::now());
    post_form_page(&state, &viewer, &uri, &form, &FormErrors::new(), None).await
}

/// POST /posts/create - On success go to the author's profile
async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let form = read_post_form(multipart).await?;
    let input = match accept_post_form(&state, &form, None).await? {
        Ok(input) => input,
        Err(errors) => {
            let viewer = Viewer(Some(user));
            return post_form_page(&state, &viewer, &uri, &form, &errors, None).await;
        }
    };

    let image = input.image.clone();
    if let Err(e) = state.post_service.create(&user, input).await {
        if let Some(image) = image {
            state.media.remove(&image).await;
        }
        return Err(e.into());
    }

    Ok(Redirect::to(&profile_url(&user)).into_response())
}

/// Load a post for changing it; anyone but the author is sent to the detail page
async fn own_post(state: &AppState, id: i64, user: &User) -> Result<Result<Post, Response>, PageError> {
    match state.post_service.get_for_author(id, user).await {
        Ok(post) => Ok(Ok(post)),
        Err(PostServiceError::NotAuthor { post_id }) => {
            Ok(Err(Redirect::to(&detail_url(post_id)).into_response()))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}/edit
async fn edit_post_form(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    IdPath(id): IdPath<i64>,
) -> Result<Response, PageError> {
    let post = match own_post(&state, id, &user).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect),
    };

    let form = PostForm::from_post(&post);
    let viewer = Viewer(Some(user));
    post_form_page(&state, &viewer, &uri, &form, &FormErrors::new(), Some(&post)).await
}

/// POST /posts/{id}/edit - On success go to the post
async fn edit_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    IdPath(id): IdPath<i64>,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let post = match own_post(&state, id, &user).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect),
    };

    let form = read_post_form(multipart).await?;
    let input = match accept_post_form(&state, &form, post.image.as_deref()).await? {
        Ok(input) => input,
        Err(errors) => {
            let viewer = Viewer(Some(user));
            return post_form_page(&state, &viewer, &uri, &form, &errors, Some(&post)).await;
        }
    };

    let new_image = input.image.clone();
    if let Err(e) = state.post_service.update(id, &user, input).await {
        if let Some(image) = new_image.as_deref().filter(|&image| post.image.as_deref() != Some(image)) {
            state.media.remove(image).await;
        }
        return Err(e.into());
    }

    if let Some(old) = post.image.as_deref() {
        if new_image.as_deref() != Some(old) {
            state.media.remove(old).await;
        }
    }

    Ok(Redirect::to(&detail_url(id)).into_response())
}

/// GET /posts/{id}/delete - Confirmation page
async fn delete_post_confirm(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    IdPath(id): IdPath<i64>,
) -> Result<Response, PageError> {
    let post = match own_post(&state, id, &user).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect),
    };

    let mut context = TeraContext::new();
    context.insert("post", &post);
    context.insert("form", &PostForm::from_post(&post));
    context.insert("is_edit", &false);
    context.insert("is_delete", &true);
    render(&state, &Viewer(Some(user)), &uri, "blog/create.html", &context)
}

/// POST /posts/{id}/delete - On success go to the author's profile
async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    IdPath(id): IdPath<i64>,
) -> Result<Response, PageError> {
    let deleted = match state.post_service.delete(id, &user).await {
        Ok(post) => post,
        Err(PostServiceError::NotAuthor { post_id }) => {
            return Ok(Redirect::to(&detail_url(post_id)).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(image) = deleted.image.as_deref() {
        state.media.remove(image).await;
    }

    Ok(Redirect::to(&profile_url(&user)).into_response())
}
