use std::sync::Arc;

use bookshelf_db::DbPool;
use bookshelf_kernel::settings::Settings;

use crate::media::MediaStore;

/// Shared application state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub settings: Arc<Settings>,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(pool: DbPool, settings: Settings) -> Self {
        Self {
            media: MediaStore::new(&settings.media),
            settings: Arc::new(settings),
            pool,
        }
    }
}
