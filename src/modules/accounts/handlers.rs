use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use bookshelf_http::error::AppError;
use serde::{Deserialize, Serialize};

use super::{
    forms::{
        empty_login_view, empty_registration_view, validate_login, validate_registration,
        LoginInput, PasswordRules, RegistrationInput, INVALID_LOGIN,
    },
    models::{NewUser, User},
    password::{hash_password, verify_password},
    session::{expired_session_cookie, session_cookie, session_token, MaybeUser},
    store::{CreateUserError, SessionStore, UserStore},
};
use crate::{
    forms::{FormErrors, FormView},
    utils::safe_local_path,
    views::Page,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct LoginContext {
    form: FormView,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterContext {
    form: FormView,
}

#[derive(Debug, Serialize)]
pub struct LoggedOutContext {
    login_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

/// `/` sends everyone to the login page.
pub async fn root(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.settings.auth.login_url)
}

pub async fn login_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(&state.settings.auth.dashboard_url).into_response();
    }

    Page::new(
        "login",
        LoginContext {
            form: empty_login_view(),
            next: safe_local_path(query.next.as_deref()).map(str::to_string),
        },
    )
    .into_response()
}

pub async fn login_submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
    headers: HeaderMap,
    Form(input): Form<LoginInput>,
) -> Result<Response, AppError> {
    let auth = &state.settings.auth;
    if user.is_some() {
        return Ok(Redirect::to(&auth.dashboard_url).into_response());
    }

    // the form field wins over the query string
    let next = input
        .next
        .as_deref()
        .or(query.next.as_deref())
        .and_then(|target| safe_local_path(Some(target)))
        .map(str::to_string);

    let rerender = |errors: &FormErrors| {
        Page::new(
            "login",
            LoginContext {
                form: input.view(errors),
                next: next.clone(),
            },
        )
        .into_response()
    };

    let (username, password) = match validate_login(&input) {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(rerender(&errors)),
    };

    let users = UserStore::new(state.pool.clone());
    let Some(user) = authenticate(&users, &username, &password).await? else {
        tracing::info!(username = %username, "login rejected");
        let mut errors = FormErrors::default();
        errors.add_non_field(INVALID_LOGIN);
        return Ok(rerender(&errors));
    };

    let sessions = SessionStore::new(state.pool.clone());
    if let Some(previous) = session_token(&headers, &auth.session_cookie) {
        sessions.close(&previous).await?;
    }
    let target = next.unwrap_or_else(|| auth.dashboard_url.clone());
    start_session(&state, &user, &target).await
}

async fn authenticate(
    users: &UserStore,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let Some(user) = users.find_by_username(username).await? else {
        return Ok(None);
    };
    // hashing is CPU bound
    let stored = user.password_hash.clone();
    let candidate = password.to_string();
    let verified = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored)).await?;
    Ok(verified.then_some(user))
}

pub async fn register_form(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return Redirect::to(&state.settings.auth.dashboard_url).into_response();
    }
    Page::new(
        "register",
        RegisterContext {
            form: empty_registration_view(),
        },
    )
    .into_response()
}

pub async fn register_submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(input): Form<RegistrationInput>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to(&state.settings.auth.dashboard_url).into_response());
    }

    let rules = PasswordRules {
        min_length: state.settings.auth.password_min_length,
    };
    let users = UserStore::new(state.pool.clone());

    let taken = match input.username_candidate() {
        Some(candidate) => users.username_taken(candidate).await?,
        None => false,
    };

    let rerender = |errors: &FormErrors| {
        Page::new("register", RegisterContext { form: input.view(errors) }).into_response()
    };

    let clean = match validate_registration(&input, rules, taken) {
        Ok(clean) => clean,
        Err(errors) => return Ok(rerender(&errors)),
    };

    let password = clean.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;

    let created = users
        .create(NewUser {
            username: &clean.username,
            email: &clean.email,
            password_hash,
            is_superuser: false,
        })
        .await;

    let user = match created {
        Ok(user) => user,
        // lost a race with a concurrent registration
        Err(CreateUserError::UsernameTaken(_)) => {
            let mut errors = FormErrors::default();
            errors.add("username", super::forms::USERNAME_TAKEN);
            return Ok(rerender(&errors));
        }
        Err(CreateUserError::Other(err)) => return Err(err.into()),
    };

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    start_session(&state, &user, &state.settings.auth.dashboard_url).await
}

/// Open a session for `user` and redirect to `target` with the cookie set.
async fn start_session(state: &AppState, user: &User, target: &str) -> Result<Response, AppError> {
    let auth = &state.settings.auth;
    let token = SessionStore::new(state.pool.clone())
        .open(user.id, Duration::from_secs(auth.session_ttl_secs))
        .await?;

    let mut response = Redirect::to(target).into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, session_cookie(auth, &token)?);
    Ok(response)
}

/// Ends the session, if any, on both GET and POST.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let auth = &state.settings.auth;
    if let Some(token) = session_token(&headers, &auth.session_cookie) {
        if SessionStore::new(state.pool.clone()).close(&token).await? {
            tracing::info!("session closed");
        }
    }

    let mut response = Page::new(
        "logged_out",
        LoggedOutContext {
            login_url: auth.login_url.clone(),
        },
    )
    .into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, expired_session_cookie(auth)?);
    Ok(response)
}
