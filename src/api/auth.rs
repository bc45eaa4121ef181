//! Authentication pages
//!
//! - GET/POST /auth/registration - sign up, then go to the login form
//! - GET/POST /auth/login        - sign in (sets the `session` cookie)
//! - GET/POST /auth/logout       - sign out
//!
//! The first user to register becomes an administrator.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::middleware::{
    clear_session_cookie, session_cookie, AppState, Viewer, LOGIN_URL, SESSION_COOKIE,
};
use crate::api::pages::{render, PageError};
use crate::forms::{safe_redirect, FormErrors, LoginForm, RegistrationForm};
use crate::services::UserServiceError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/registration", get(registration_form).post(register))
        .route("/auth/login", get(login_form).post(login))
        .route("/auth/logout", get(logout).post(logout))
}

/// `?next=` on the login page
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn registration_page(
    state: &AppState,
    viewer: &Viewer,
    uri: &Uri,
    form: &RegistrationForm,
    errors: &FormErrors,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    render(state, viewer, uri, "registration/registration_form.html", &context)
}

/// GET /auth/registration
async fn registration_form(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
) -> Result<Response, PageError> {
    registration_page(&state, &viewer, &uri, &RegistrationForm::default(), &FormErrors::new())
}

/// POST /auth/registration
async fn register(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, PageError> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return registration_page(&state, &viewer, &uri, &form, &errors),
    };

    match state.user_service.register(input).await {
        Ok(_) => Ok(Redirect::to(LOGIN_URL).into_response()),
        Err(UserServiceError::UserExists(_)) => {
            let mut errors = FormErrors::new();
            errors.add_field("username", "A user with that username already exists.");
            registration_page(&state, &viewer, &uri, &form, &errors)
        }
        Err(UserServiceError::ValidationError(message)) => {
            let mut errors = FormErrors::new();
            errors.add_form(message);
            registration_page(&state, &viewer, &uri, &form, &errors)
        }
        Err(e) => Err(e.into()),
    }
}

fn login_page(
    state: &AppState,
    viewer: &Viewer,
    uri: &Uri,
    form: &LoginForm,
    errors: &FormErrors,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    render(state, viewer, uri, "registration/login.html", &context)
}

/// GET /auth/login
async fn login_form(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Query(query): Query<NextQuery>,
) -> Result<Response, PageError> {
    let form = LoginForm {
        next: safe_redirect(query.next.as_deref()).map(str::to_string),
        ..LoginForm::default()
    };
    login_page(&state, &viewer, &uri, &form, &FormErrors::new())
}

/// POST /auth/login - Go to `next` when it is a local path, else home
async fn login(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return login_page(&state, &viewer, &uri, &form, &errors),
    };

    let session = match state.user_service.login(input).await {
        Ok(session) => session,
        Err(UserServiceError::AuthenticationError(_)) => {
            let mut errors = FormErrors::new();
            errors.add_form(
                "Please enter a correct username and password. Note that both fields may be case-sensitive.",
            );
            return login_page(&state, &viewer, &uri, &form, &errors);
        }
        Err(e) => return Err(e.into()),
    };

    let cookie = HeaderValue::from_str(&session_cookie(&session.id, state.site.session_days))
        .map_err(|e| PageError::Internal(anyhow::anyhow!("Invalid session cookie: {}", e)))?;
    let target = form.safe_next().unwrap_or("/");

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    Ok((headers, Redirect::to(target)).into_response())
}

/// GET|POST /auth/logout
async fn logout(
    State(state): State<AppState>,
    uri: Uri,
    request_headers: HeaderMap,
) -> Result<Response, PageError> {
    if let Some(token) = session_token(&request_headers) {
        state.user_service.logout(&token).await?;
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&clear_session_cookie())
            .map_err(|e| PageError::Internal(anyhow::anyhow!("Invalid session cookie: {}", e)))?,
    );

    let page = render(
        &state,
        &Viewer::default(),
        &uri,
        "registration/logged_out.html",
        &TeraContext::new(),
    )?;
    Ok((headers, page).into_response())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
