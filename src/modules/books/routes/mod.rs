//! Route tables for the catalog. Both URL families mount the same handlers;
//! the family's [`SourceType`] is captured by each route.

use axum::{
    extract::{FromRequestParts, Multipart, Path, State},
    http::request::Parts,
    routing::get,
    Router,
};
use bookshelf_http::error::AppError;

use super::{
    handlers::{self, CreateMode},
    models::SourceType,
};
use crate::{modules::accounts::session::CurrentUser, AppState};

/// Numeric `{id}` path segment. Anything that is not an integer is a missing
/// book rather than a malformed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookId(pub i64);

impl FromRequestParts<AppState> for BookId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Path::<i64>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(BookId(id)),
            Err(rejection) => {
                tracing::debug!(%rejection, "book id rejected");
                Err(AppError::not_found("No book found matching the query"))
            }
        }
    }
}

/// List, create, edit and delete routes of one family.
pub fn family_routes(source: SourceType) -> Router<AppState> {
    let slug = source.slug();

    let list = move |State(state): State<AppState>, CurrentUser(user): CurrentUser| {
        handlers::list(state, user, source)
    };
    let create_form =
        move |CurrentUser(user): CurrentUser| handlers::create_form(user, CreateMode::Fixed(source));
    let create_submit = move |State(state): State<AppState>,
                              CurrentUser(user): CurrentUser,
                              multipart: Multipart| {
        handlers::create_submit(state, user, CreateMode::Fixed(source), multipart)
    };
    let update_form = move |State(state): State<AppState>,
                            CurrentUser(user): CurrentUser,
                            BookId(id): BookId| {
        handlers::update_form(state, user, id, source)
    };
    let update_submit = move |State(state): State<AppState>,
                              CurrentUser(user): CurrentUser,
                              BookId(id): BookId,
                              multipart: Multipart| {
        handlers::update_submit(state, user, id, source, multipart)
    };
    let delete_confirm = move |State(state): State<AppState>,
                               CurrentUser(user): CurrentUser,
                               BookId(id): BookId| {
        handlers::delete_confirm(state, user, id, source)
    };
    let delete_submit = move |State(state): State<AppState>,
                              CurrentUser(user): CurrentUser,
                              BookId(id): BookId| {
        handlers::delete_submit(state, user, id, source)
    };

    Router::new()
        .route(&source.list_path(), get(list).post(list))
        .route(&source.create_path(), get(create_form).post(create_submit))
        .route(
            &format!("/books/{{id}}/edit-{slug}/"),
            get(update_form).post(update_submit),
        )
        .route(
            &format!("/books/{{id}}/delete-{slug}/"),
            get(delete_confirm).post(delete_submit),
        )
}

/// Routes shared by both families: the selector form and the dashboard.
pub fn shared_routes() -> Router<AppState> {
    let selector_form =
        |CurrentUser(user): CurrentUser| handlers::create_form(user, CreateMode::Selector);
    let selector_submit = |State(state): State<AppState>,
                           CurrentUser(user): CurrentUser,
                           multipart: Multipart| {
        handlers::create_submit(state, user, CreateMode::Selector, multipart)
    };
    let dashboard = |State(state): State<AppState>, CurrentUser(user): CurrentUser| {
        handlers::dashboard(state, user)
    };

    Router::new()
        .route("/book-form/", get(selector_form).post(selector_submit))
        .route("/dashboard/", get(dashboard))
}
