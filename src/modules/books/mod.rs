//! Book catalog: two URL families (FBV and CBV) over one `book` table, the
//! source type selector and the dashboard.

pub mod forms;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::{utils, AppState};
use models::SourceType;

/// Directory below the media root that holds cover images.
pub const UPLOAD_DIR: &str = "books";

/// Books module implementation
pub struct BooksModule {
    state: AppState,
}

impl BooksModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.state.media.ensure_dir(UPLOAD_DIR).await?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            media_root = %self.state.media.root().display(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        let prefix = utils::log_prefix(self.name());
        tracing::debug!(target: "bookshelf.routes", %prefix, "registering catalog routes");

        SourceType::ALL
            .into_iter()
            .fold(Router::new(), |router, source| {
                router.merge(routes::family_routes(source))
            })
            .merge(routes::shared_routes())
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let mut paths = serde_json::Map::new();

        for source in SourceType::ALL {
            let tag = format!("Books ({})", source.label());
            let page = |summary: String, schema: &str| {
                json!({
                    "summary": summary,
                    "tags": [tag],
                    "responses": {
                        "200": {
                            "description": "View",
                            "content": {"application/json": {"schema": {"$ref": format!("#/components/schemas/{schema}")}}}
                        },
                        "303": {"description": "Redirect (login required, or success)"},
                        "404": {
                            "description": "Book not found",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
                        }
                    }
                })
            };
            let label = source.label();

            paths.insert(
                source.list_path(),
                json!({"get": page(format!("List {label} books"), "BookList")}),
            );
            paths.insert(
                source.create_path(),
                json!({
                    "get": page(format!("{label} create form"), "BookFormPage"),
                    "post": page(format!("Create a {label} book (multipart)"), "BookFormPage")
                }),
            );
            paths.insert(
                format!("/books/{{id}}/edit-{}/", source.slug()),
                json!({
                    "get": page(format!("{label} update form"), "BookFormPage"),
                    "post": page("Update a book (multipart)".to_string(), "BookFormPage")
                }),
            );
            paths.insert(
                format!("/books/{{id}}/delete-{}/", source.slug()),
                json!({
                    "get": page(format!("{label} delete confirmation"), "BookConfirmDelete"),
                    "post": {
                        "summary": "Delete a book (superuser only)",
                        "tags": [tag],
                        "responses": {
                            "303": {"description": "Deleted, or denied and sent to the dashboard"},
                            "403": {
                                "description": "Denied (auth.denied_delete = \"forbidden\")",
                                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
                            },
                            "404": {
                                "description": "Book not found",
                                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
                            }
                        }
                    }
                }),
            );
        }

        paths.insert(
            "/book-form/".to_string(),
            json!({
                "get": {"summary": "Book form with source type selector", "tags": ["Books"], "responses": {"200": {"description": "Form view"}}},
                "post": {"summary": "Create a book of the chosen source type (multipart)", "tags": ["Books"], "responses": {"200": {"description": "Form view with errors"}, "303": {"description": "Redirect to the chosen list"}}}
            }),
        );
        paths.insert(
            "/dashboard/".to_string(),
            json!({
                "get": {"summary": "Per-type counts and links", "tags": ["Books"], "responses": {"200": {"description": "Dashboard view"}}}
            }),
        );

        Some(json!({
            "paths": paths,
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "title": {"type": "string", "maxLength": 200},
                            "author": {"type": "string", "maxLength": 200},
                            "image": {"type": "string", "description": "Path relative to the media root"},
                            "image_url": {"type": "string"},
                            "source_type": {"type": "integer", "enum": [1, 2]},
                            "edit_url": {"type": "string"},
                            "delete_url": {"type": "string"}
                        },
                        "required": ["id", "title", "author", "image", "source_type"]
                    },
                    "BookList": {
                        "type": "object",
                        "properties": {
                            "view": {"type": "string"},
                            "label": {"type": "string"},
                            "source_type": {"type": "integer"},
                            "books": {"type": "array", "items": {"$ref": "#/components/schemas/Book"}}
                        },
                        "required": ["view", "books"]
                    },
                    "BookFormPage": {
                        "type": "object",
                        "properties": {
                            "view": {"type": "string"},
                            "type": {"type": "string"},
                            "action": {"type": "string"},
                            "form": {"type": "object"},
                            "object": {"$ref": "#/components/schemas/Book"}
                        },
                        "required": ["view"]
                    },
                    "BookConfirmDelete": {
                        "type": "object",
                        "properties": {
                            "view": {"type": "string"},
                            "type": {"type": "string"},
                            "object": {"$ref": "#/components/schemas/Book"},
                            "can_delete": {"type": "boolean"},
                            "cancel_url": {"type": "string"}
                        },
                        "required": ["view", "object", "can_delete"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE book (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    title       TEXT    NOT NULL CHECK (length(title) BETWEEN 1 AND 200),
                    author      TEXT    NOT NULL CHECK (length(author) BETWEEN 1 AND 200),
                    image       TEXT    NOT NULL,
                    source_type INTEGER NOT NULL DEFAULT 1 CHECK (source_type IN (1, 2))
                );
                CREATE INDEX book_source_type ON book (source_type, id);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(state))
}
