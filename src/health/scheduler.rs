// src/health/scheduler.rs
use crate::config::MonitorConfig;
use crate::metrics::{MetricsCollector, Timer};
use crate::site::{Site, SiteStatus, StoreError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::checker::Checker;

/// Periodically re-checks every site whose last check is older than the
/// staleness threshold.
pub struct Scheduler {
    checker: Arc<Checker>,
    sweep_interval: Duration,
    staleness_threshold: Duration,
    max_concurrent_checks: usize,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Outcome of one sweep. A sweep that could not list sites is all zeroes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub total: usize,
    pub checked: usize,
    pub skipped: usize,
    pub up: usize,
    pub down: usize,
    pub blocked: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl SweepSummary {
    fn record(&mut self, result: Result<Site, StoreError>) {
        match result {
            Ok(site) => {
                self.checked += 1;
                match site.status {
                    SiteStatus::Up => self.up += 1,
                    SiteStatus::Down => self.down += 1,
                    SiteStatus::Blocked => self.blocked += 1,
                    SiteStatus::Unknown => {}
                }
            }
            Err(_) => self.failed += 1,
        }
    }
}

impl Scheduler {
    pub fn new(
        config: &MonitorConfig,
        checker: Arc<Checker>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            checker,
            sweep_interval: config.sweep_interval(),
            staleness_threshold: config.staleness_threshold(),
            max_concurrent_checks: config.max_concurrent_checks.max(1),
            metrics,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Sweep immediately, then again `sweep_interval` after each sweep ends,
    /// until [`Scheduler::shutdown`] is called.
    pub async fn start(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            "Starting site scheduler: sweep every {:?}, re-check after {:?}",
            self.sweep_interval, self.staleness_threshold
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            self.sweep().await;

            tokio::select! {
                _ = sleep(self.sweep_interval) => {}
                changed = shutdown_rx.changed() => {
                    // A dropped sender also means nobody can restart us.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Site scheduler shutting down");
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One pass over all sites. Save failures are logged and skipped.
    pub async fn sweep(&self) -> SweepSummary {
        let timer = Timer::new();
        let sites = match self.checker.store().find_all().await {
            Ok(sites) => sites,
            Err(e) => {
                error!("Sweep aborted, could not list sites: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_store_error("find_all");
                }
                return SweepSummary::default();
            }
        };

        let now = Utc::now();
        let total = sites.len();
        let stale: Vec<Site> = sites
            .into_iter()
            .filter(|site| site.is_stale(now, self.staleness_threshold))
            .collect();

        let mut summary = SweepSummary {
            total,
            skipped: total - stale.len(),
            ..SweepSummary::default()
        };

        let checker = self.checker.clone();
        let mut results = stream::iter(stale)
            .map(move |site| check_one(checker.clone(), site))
            .buffer_unordered(self.max_concurrent_checks);

        while let Some(result) = results.next().await {
            summary.record(result);
        }

        let elapsed = timer.elapsed();
        summary.duration = elapsed;
        if let Some(metrics) = &self.metrics {
            metrics.record_sweep(total, elapsed);
        }

        if summary.checked + summary.failed > 0 {
            info!(
                "Sweep complete in {:?}: {} checked ({} up, {} down, {} blocked), {} fresh, {} failed",
                elapsed,
                summary.checked,
                summary.up,
                summary.down,
                summary.blocked,
                summary.skipped,
                summary.failed
            );
        } else {
            debug!("Sweep complete: all {} sites fresh", total);
        }

        summary
    }
}

async fn check_one(checker: Arc<Checker>, site: Site) -> Result<Site, StoreError> {
    let id = site.id;
    let result = checker.check_and_persist(site).await;
    if let Err(e) = &result {
        error!("Failed to save check result for site {}: {}", id, e);
    }
    result
}
