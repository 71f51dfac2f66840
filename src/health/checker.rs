// src/health/checker.rs
use crate::metrics::MetricsCollector;
use crate::site::{Site, SiteStatus, SiteStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::classifier::Classifier;
use super::prober::Prober;

/// Probes one site, classifies the outcome and writes the result back.
/// Shared by the on-demand API path and the scheduler.
pub struct Checker {
    store: Arc<dyn SiteStore>,
    prober: Prober,
    classifier: Classifier,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Checker {
    pub fn new(
        store: Arc<dyn SiteStore>,
        prober: Prober,
        classifier: Classifier,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            store,
            prober,
            classifier,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<dyn SiteStore> {
        &self.store
    }

    /// Overwrites `status` and `last_checked` and saves the whole record in
    /// one write. Probe failures end up as `Down`; only store errors are
    /// returned.
    pub async fn check_and_persist(&self, mut site: Site) -> Result<Site, StoreError> {
        let outcome = self.prober.probe(&site.url).await;
        let status = self.classifier.classify(&outcome);
        let previous = site.status;

        site.record_check(status, Utc::now());

        if let Err(e) = self.store.save(&site).await {
            if let Some(metrics) = &self.metrics {
                metrics.record_store_error("save");
            }
            return Err(e);
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_check(status);
        }

        if previous == status {
            debug!("Site {} ({}) still {}", site.id, site.url, status);
        } else {
            match status {
                SiteStatus::Up => info!("Site {} ({}) is now {} (was {})", site.id, site.url, status, previous),
                _ => warn!("Site {} ({}) is now {} (was {})", site.id, site.url, status, previous),
            }
        }

        Ok(site)
    }
}
