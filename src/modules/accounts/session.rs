//! Cookie-backed sessions and the extractors that read them.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use bookshelf_http::error::AppError;
use bookshelf_kernel::settings::AuthSettings;
use cookie::{Cookie, SameSite};

use super::{models::User, store::SessionStore};
use crate::AppState;

/// The signed-in user. Anonymous requests are redirected to the login page
/// with the requested path in `next`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The signed-in user, if any.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers, &state.settings.auth.session_cookie) else {
            return Ok(MaybeUser(None));
        };
        let user = SessionStore::new(state.pool.clone()).resolve(&token).await?;
        Ok(MaybeUser(user))
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await {
            Ok(MaybeUser(Some(user))) => Ok(CurrentUser(user)),
            Ok(MaybeUser(None)) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                tracing::debug!(path = next, "anonymous request redirected to login");
                Err(Redirect::to(&login_redirect(&state.settings.auth, next)).into_response())
            }
            Err(err) => Err(err.into_response()),
        }
    }
}

/// Login URL carrying `next` so the user comes back after signing in.
pub fn login_redirect(auth: &AuthSettings, next: &str) -> String {
    format!("{}?next={}", auth.login_url, urlencoding::encode(next))
}

/// Raw session token from the request cookies.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value establishing a session.
pub fn session_cookie(auth: &AuthSettings, token: &str) -> Result<HeaderValue, AppError> {
    let max_age = i64::try_from(auth.session_ttl_secs).unwrap_or(i64::MAX);
    let cookie = Cookie::build((auth.session_cookie.as_str(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(auth.secure_cookies)
        .max_age(time::Duration::seconds(max_age))
        .build();
    header_value(cookie)
}

/// `Set-Cookie` value removing the session cookie.
pub fn expired_session_cookie(auth: &AuthSettings) -> Result<HeaderValue, AppError> {
    let mut cookie = Cookie::build((auth.session_cookie.as_str(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    header_value(cookie)
}

fn header_value(cookie: Cookie<'_>) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|err| AppError::Internal(anyhow::anyhow!("invalid session cookie: {}", err)))
}
