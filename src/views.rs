//! JSON view envelope returned by every non-redirect page.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// A rendered page: the view name plus its context, flattened.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub view: &'static str,
    #[serde(flatten)]
    pub context: T,
}

impl<T> Page<T> {
    pub fn new(view: &'static str, context: T) -> Self {
        Self { view, context }
    }
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
