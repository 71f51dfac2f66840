// src/site/store.rs
use async_trait::async_trait;

use super::model::{Site, SiteId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Corrupt site record {id}: {reason}")]
    Corrupt { id: SiteId, reason: String },
}

/// Persistence for [`Site`] records. Implementations synchronise internally;
/// callers share one instance behind an `Arc`.
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Insert a new site with status `Unknown` and no check time.
    async fn create(&self, url: &str) -> Result<Site, StoreError>;

    async fn find(&self, id: SiteId) -> Result<Option<Site>, StoreError>;

    /// Every site, ordered by id.
    async fn find_all(&self) -> Result<Vec<Site>, StoreError>;

    /// Replace the stored record with `site` as a whole.
    async fn save(&self, site: &Site) -> Result<(), StoreError>;
}
