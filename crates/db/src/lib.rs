//! SQLite connection pool factory and the migration runner that applies
//! module-contributed migrations exactly once.

use std::str::FromStr;

use anyhow::{bail, Context};
use bookshelf_kernel::{settings::DatabaseSettings, Migration};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use time::OffsetDateTime;

/// Connection pool shared by every module.
pub type DbPool = SqlitePool;

const LEDGER_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT    NOT NULL,
        id         TEXT    NOT NULL,
        applied_at INTEGER NOT NULL,
        PRIMARY KEY (module, id)
    )
"#;

/// Open a pool for the configured database, creating the file if needed.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<DbPool> {
    let url = settings.url.trim();
    if url.is_empty() {
        bail!("database url is empty");
    }

    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url '{}'", url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to '{}'", url))?;

    tracing::info!(
        target: "bookshelf-db",
        url,
        max_connections = settings.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

/// Apply every migration not yet recorded in the `_migrations` ledger.
///
/// Each migration runs in its own transaction together with its ledger row,
/// so a failing migration leaves no partial state behind. Returns the number
/// of migrations applied by this call.
pub async fn run_migrations(
    pool: &DbPool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    sqlx::query(LEDGER_DDL)
        .execute(pool)
        .await
        .context("failed to create migration ledger")?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM _migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .context("failed to read migration ledger")?;
        if already.is_some() {
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open transaction")?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
        sqlx::query("INSERT INTO _migrations (module, id, applied_at) VALUES (?, ?, ?)")
            .bind(module)
            .bind(migration.id)
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .execute(&mut *tx)
            .await
            .context("failed to record migration")?;
        tx.commit()
            .await
            .with_context(|| format!("failed to commit migration {}/{}", module, migration.id))?;

        tracing::info!(target: "bookshelf-db", module = %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
