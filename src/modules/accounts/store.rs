use std::time::Duration;

use anyhow::Context;
use bookshelf_db::DbPool;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use super::models::{NewUser, User};
use crate::utils::now_unix;

#[derive(Debug, Error)]
pub enum CreateUserError {
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct UserStore {
    pool: DbPool,
}

impl UserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewUser<'_>) -> Result<User, CreateUserError> {
        let result = sqlx::query(
            "INSERT INTO auth_user (username, email, password_hash, is_superuser, date_joined) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new.username)
        .bind(new.email)
        .bind(&new.password_hash)
        .bind(new.is_superuser)
        .bind(now_unix())
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(CreateUserError::UsernameTaken(new.username.to_string()))
            }
            Err(err) => return Err(anyhow::Error::new(err).context("failed to insert user").into()),
        };

        let user = self
            .find_by_id(id)
            .await?
            .context("inserted user vanished")?;
        tracing::info!(
            user_id = user.id,
            username = %user.username,
            is_superuser = user.is_superuser,
            "user created"
        );
        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM auth_user WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load user")
    }

    /// Exact, case-sensitive lookup used for authentication.
    pub async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM auth_user WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load user")
    }

    /// Case-insensitive check used by registration, so `Ann` and `ann`
    /// cannot both sign up.
    pub async fn username_taken(&self, username: &str) -> anyhow::Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM auth_user WHERE username = ? COLLATE NOCASE")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .context("failed to check username")?;
        Ok(found.is_some())
    }
}

/// Server-side sessions keyed by the SHA-256 digest of the cookie token.
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
}

impl SessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open a session for `user_id` and return the raw token for the cookie.
    pub async fn open(&self, user_id: i64, ttl: Duration) -> anyhow::Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        let now = now_unix();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO auth_session (token_hash, user_id, created_at, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(token_digest(&token))
        .bind(user_id)
        .bind(now)
        .bind(now.saturating_add(ttl))
        .execute(&self.pool)
        .await
        .context("failed to open session")?;

        tracing::info!(user_id, "session opened");
        Ok(token)
    }

    /// The user owning a live session, if any. Expired sessions are removed.
    pub async fn resolve(&self, token: &str) -> anyhow::Result<Option<User>> {
        let digest = token_digest(token);
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT user_id, expires_at FROM auth_session WHERE token_hash = ?",
        )
        .bind(&digest)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load session")?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= now_unix() {
            sqlx::query("DELETE FROM auth_session WHERE token_hash = ?")
                .bind(&digest)
                .execute(&self.pool)
                .await
                .context("failed to drop expired session")?;
            return Ok(None);
        }

        UserStore::new(self.pool.clone()).find_by_id(user_id).await
    }

    /// Destroy a session. Returns whether one existed.
    pub async fn close(&self, token: &str) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM auth_session WHERE token_hash = ?")
            .bind(token_digest(token))
            .execute(&self.pool)
            .await
            .context("failed to close session")?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn purge_expired(&self) -> anyhow::Result<u64> {
        let done = sqlx::query("DELETE FROM auth_session WHERE expires_at <= ?")
            .bind(now_unix())
            .execute(&self.pool)
            .await
            .context("failed to purge sessions")?;
        Ok(done.rows_affected())
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
