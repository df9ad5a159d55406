//! User accounts: registration, login and logout, and the session extractors
//! other modules use to require a signed-in user.

pub mod forms;
pub mod handlers;
pub mod models;
pub mod password;
pub mod session;
pub mod store;

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{routing::get, Router};
use bookshelf_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::{utils, AppState};
use forms::{validate_registration, PasswordRules, RegistrationInput};
use models::{NewUser, User};
use store::{CreateUserError, SessionStore, UserStore};

/// Accounts module: owns the user and session tables.
pub struct AccountsModule {
    state: AppState,
}

impl AccountsModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for AccountsModule {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            login_url = %ctx.settings.auth.login_url,
            "accounts module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        let prefix = utils::log_prefix(self.name());
        tracing::debug!(target: "bookshelf.routes", %prefix, "registering account routes");

        Router::new()
            .route("/", get(handlers::root))
            .route(
                "/register/",
                get(handlers::register_form).post(handlers::register_submit),
            )
            .route(
                "/login/",
                get(handlers::login_form).post(handlers::login_submit),
            )
            .route(
                "/accounts/login/",
                get(handlers::login_form).post(handlers::login_submit),
            )
            .route("/logout/", get(handlers::logout).post(handlers::logout))
            .route(
                "/accounts/logout/",
                get(handlers::logout).post(handlers::logout),
            )
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let logged_out = json!({
            "summary": "Sign out",
            "tags": ["Accounts"],
            "responses": {"200": {"description": "Logged out view"}}
        });
        let form_page = |summary: &str| {
            json!({
                "summary": summary,
                "tags": ["Accounts"],
                "responses": {
                    "200": {
                        "description": "Form view",
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/FormPage"}}}
                    },
                    "303": {"description": "Redirect after success"}
                }
            })
        };

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Redirect to the login page",
                        "tags": ["Accounts"],
                        "responses": {"303": {"description": "Redirect to login"}}
                    }
                },
                "/register/": {
                    "get": form_page("Registration form"),
                    "post": form_page("Register and sign in")
                },
                "/login/": {
                    "get": form_page("Login form"),
                    "post": form_page("Sign in")
                },
                "/accounts/login/": {
                    "get": form_page("Login form"),
                    "post": form_page("Sign in")
                },
                "/logout/": {"get": logged_out, "post": logged_out},
                "/accounts/logout/": {"get": logged_out, "post": logged_out}
            },
            "components": {
                "schemas": {
                    "FormPage": {
                        "type": "object",
                        "properties": {
                            "view": {"type": "string"},
                            "form": {
                                "type": "object",
                                "properties": {
                                    "is_bound": {"type": "boolean"},
                                    "fields": {"type": "array", "items": {"type": "object"}},
                                    "non_field_errors": {"type": "array", "items": {"type": "string"}}
                                }
                            }
                        },
                        "required": ["view", "form"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE auth_user (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    username      TEXT    NOT NULL UNIQUE,
                    email         TEXT    NOT NULL DEFAULT '',
                    password_hash TEXT    NOT NULL,
                    is_superuser  BOOLEAN NOT NULL DEFAULT 0,
                    date_joined   INTEGER NOT NULL
                );
                CREATE TABLE auth_session (
                    token_hash TEXT    PRIMARY KEY,
                    user_id    INTEGER NOT NULL REFERENCES auth_user (id) ON DELETE CASCADE,
                    created_at INTEGER NOT NULL,
                    expires_at INTEGER NOT NULL
                );
                CREATE INDEX auth_session_expires_at ON auth_session (expires_at);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let purged = clear_expired_sessions(&self.state).await?;
        tracing::info!(module = self.name(), purged, "accounts module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "accounts module stopped");
        Ok(())
    }
}

/// Create an account outside the HTTP flow, e.g. from the command line.
///
/// The same username and password rules as registration apply.
pub async fn create_account(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
    is_superuser: bool,
) -> anyhow::Result<User> {
    let users = UserStore::new(state.pool.clone());
    let input = RegistrationInput {
        username: Some(username.to_string()),
        email: Some(email.to_string()),
        password1: Some(password.to_string()),
        password2: Some(password.to_string()),
    };
    let taken = match input.username_candidate() {
        Some(candidate) => users.username_taken(candidate).await?,
        None => false,
    };
    let rules = PasswordRules {
        min_length: state.settings.auth.password_min_length,
    };

    let clean = validate_registration(&input, rules, taken)
        .map_err(|errors| anyhow!("invalid account: {}", errors.messages().join("; ")))?;

    let password_hash = password::hash_password(&clean.password)?;
    let user = users
        .create(NewUser {
            username: &clean.username,
            email: &clean.email,
            password_hash,
            is_superuser,
        })
        .await
        .map_err(|err| match err {
            CreateUserError::UsernameTaken(name) => anyhow!("username '{}' is already taken", name),
            CreateUserError::Other(err) => err,
        })?;
    Ok(user)
}

/// Delete expired sessions and return how many were removed.
pub async fn clear_expired_sessions(state: &AppState) -> anyhow::Result<u64> {
    SessionStore::new(state.pool.clone()).purge_expired().await
}

/// Create a new instance of the accounts module
pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(AccountsModule::new(state))
}
