// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::health::BLOCK_SIGNATURE;

/// Paths served by the site API; the metrics endpoint must not shadow them.
const API_ROUTES: &[&str] = &["/", "/add_site", "/get_sites", "/get_site", "/check_site"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: SocketAddr,
    pub store: StoreConfig,
    pub monitor: MonitorConfig,
    pub cors: CorsConfig,
    pub metrics: MetricsConfig,
    pub index_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            store: StoreConfig::default(),
            monitor: MonitorConfig::default(),
            cors: CorsConfig::default(),
            metrics: MetricsConfig::default(),
            index_file: PathBuf::from("index.html"),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;

        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            bail!("store.path must be set for the sqlite backend");
        }

        if self.metrics.enabled {
            let path = self.metrics.path.as_str();
            if !path.starts_with('/') {
                bail!("metrics.path must start with '/', got {:?}", path);
            }
            if API_ROUTES
                .iter()
                .any(|route| path == *route || (*route != "/" && path.starts_with(&format!("{}/", route))))
            {
                bail!("metrics.path {:?} collides with an API route", path);
            }
        }

        if self.cors.allow_origin.trim().is_empty() {
            bail!("cors.allow_origin must not be empty");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("sites.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sweep_interval_secs: u64,
    pub staleness_threshold_secs: u64,
    pub probe_timeout_secs: u64,
    pub max_concurrent_checks: usize,
    pub block_signature: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            staleness_threshold_secs: 300,
            probe_timeout_secs: 10,
            max_concurrent_checks: 1,
            block_signature: BLOCK_SIGNATURE.to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            bail!("monitor.sweep_interval_secs must be greater than zero");
        }
        if self.staleness_threshold_secs == 0 {
            bail!("monitor.staleness_threshold_secs must be greater than zero");
        }
        if self.probe_timeout_secs == 0 {
            bail!("monitor.probe_timeout_secs must be greater than zero");
        }
        if self.max_concurrent_checks == 0 {
            bail!("monitor.max_concurrent_checks must be at least 1");
        }
        if self.block_signature.is_empty() {
            bail!("monitor.block_signature must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}
