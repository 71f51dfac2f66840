// src/site/memory.rs
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::model::{Site, SiteId, SiteStatus};
use super::store::{SiteStore, StoreError};

/// Ephemeral store backed by a concurrent map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    sites: Arc<DashMap<SiteId, Site>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn create(&self, url: &str) -> Result<Site, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let site = Site {
            id,
            url: url.to_string(),
            status: SiteStatus::Unknown,
            last_checked: None,
        };
        self.sites.insert(id, site.clone());
        Ok(site)
    }

    async fn find(&self, id: SiteId) -> Result<Option<Site>, StoreError> {
        Ok(self.sites.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<Site>, StoreError> {
        let mut sites: Vec<Site> = self
            .sites
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sites.sort_by_key(|site| site.id);
        Ok(sites)
    }

    async fn save(&self, site: &Site) -> Result<(), StoreError> {
        self.sites.insert(site.id, site.clone());
        // Keep ids unique if a caller saves a record it assigned itself.
        self.next_id.fetch_max(site.id, Ordering::SeqCst);
        Ok(())
    }
}
