// src/site/mod.rs
mod memory;
mod model;
mod sqlite;
mod store;

pub use memory::MemoryStore;
pub use model::{NewSite, Site, SiteId, SiteStatus};
pub use sqlite::SqliteStore;
pub use store::{SiteStore, StoreError};

use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};

/// Build the store selected in the config. Opening or migrating the
/// database is the only fatal startup error.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn SiteStore>, StoreError> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.path)?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
