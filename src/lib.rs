//! Bookshelf application library
//!
//! Catalog and account modules, the state they share, and the bootstrap that
//! wires them into the kernel registry and the HTTP server.

use anyhow::Context;
use axum::Router;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub mod forms;
pub mod media;
pub mod modules;
pub mod state;
pub mod utils;
pub mod views;

pub use state::AppState;

/// A bootstrapped application: migrated database, initialized modules.
pub struct Application {
    pub state: AppState,
    pub registry: ModuleRegistry,
}

/// Connect the database, register modules, apply pending migrations, then
/// initialize and start every module.
pub async fn bootstrap(settings: Settings) -> anyhow::Result<Application> {
    let (state, registry) = prepare(settings).await?;
    migrate_registry(&state, &registry).await?;

    let ctx = InitCtx {
        settings: &state.settings,
    };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    Ok(Application { state, registry })
}

/// Apply pending migrations without starting any module.
pub async fn migrate(settings: Settings) -> anyhow::Result<usize> {
    let (state, registry) = prepare(settings).await?;
    let applied = migrate_registry(&state, &registry).await?;
    state.pool.close().await;
    Ok(applied)
}

async fn prepare(settings: Settings) -> anyhow::Result<(AppState, ModuleRegistry)> {
    let pool = bookshelf_db::connect(&settings.database)
        .await
        .context("failed to open database")?;
    let state = AppState::new(pool, settings);

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &state)?;

    Ok((state, registry))
}

async fn migrate_registry(state: &AppState, registry: &ModuleRegistry) -> anyhow::Result<usize> {
    let applied = bookshelf_db::run_migrations(&state.pool, &registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations up to date");
    Ok(applied)
}

impl Application {
    /// Full router: module routes, media files, docs and middleware.
    pub fn router(&self) -> Router {
        bookshelf_http::build_router(&self.registry, &self.state.settings)
    }

    /// Serve until shutdown, then stop modules and close the pool.
    pub async fn serve(self) -> anyhow::Result<()> {
        let app = self.router();
        bookshelf_http::serve(app, &self.state.settings).await?;
        self.shutdown().await
    }

    /// Stop modules in reverse order and close the pool.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.registry.stop_all().await?;
        self.state.pool.close().await;
        Ok(())
    }
}
