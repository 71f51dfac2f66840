// src/metrics/collector.rs
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::Result;

use crate::site::SiteStatus;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Text exposition of every registered metric.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Check metrics
    pub checks_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,
    pub store_errors_total: IntCounterVec,

    // Sweep metrics
    pub sweeps_total: IntCounter,
    pub sweep_duration_seconds: Histogram,
    pub sites_total: IntGauge,

    // API metrics
    pub api_requests_total: IntCounterVec,
    pub api_request_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let checks_total = IntCounterVec::new(
            Opts::new("site_checks_total", "Completed site checks by resulting status"),
            &["status"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new("site_probe_duration_seconds", "Probe duration in seconds"),
            &["outcome"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let store_errors_total = IntCounterVec::new(
            Opts::new("site_store_errors_total", "Failed site store operations"),
            &["operation"],
        )?;
        registry.register(Box::new(store_errors_total.clone()))?;

        let sweeps_total = IntCounter::new("site_sweeps_total", "Completed scheduler sweeps")?;
        registry.register(Box::new(sweeps_total.clone()))?;

        let sweep_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "site_sweep_duration_seconds",
            "Scheduler sweep duration in seconds",
        ))?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        let sites_total = IntGauge::new("site_sites_total", "Sites seen by the last sweep")?;
        registry.register(Box::new(sites_total.clone()))?;

        let api_requests_total = IntCounterVec::new(
            Opts::new("site_api_requests_total", "Total API requests"),
            &["method", "route", "status_code"],
        )?;
        registry.register(Box::new(api_requests_total.clone()))?;

        let api_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "site_api_request_duration_seconds",
                "API request duration in seconds",
            ),
            &["route"],
        )?;
        registry.register(Box::new(api_request_duration_seconds.clone()))?;

        Ok(Self {
            checks_total,
            probe_duration_seconds,
            store_errors_total,
            sweeps_total,
            sweep_duration_seconds,
            sites_total,
            api_requests_total,
            api_request_duration_seconds,
        })
    }

    pub fn record_check(&self, status: SiteStatus) {
        self.checks_total.with_label_values(&[status.as_str()]).inc();
    }

    pub fn record_probe(&self, transport_error: bool, duration: Duration) {
        let outcome = if transport_error { "transport_error" } else { "response" };
        self.probe_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration.as_secs_f64());
    }

    pub fn record_store_error(&self, operation: &str) {
        self.store_errors_total.with_label_values(&[operation]).inc();
    }

    pub fn record_sweep(&self, sites: usize, duration: Duration) {
        self.sweeps_total.inc();
        self.sites_total.set(sites as i64);
        self.sweep_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_request(&self, method: &str, route: &str, status_code: u16, duration: Duration) {
        let status = status_code.to_string();
        self.api_requests_total
            .with_label_values(&[method, route, &status])
            .inc();

        self.api_request_duration_seconds
            .with_label_values(&[route])
            .observe(duration.as_secs_f64());
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
