// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Config file looked up when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    parse_config(&contents, is_yaml(path))
}

/// Load the config at `path`, or fall back to built-in defaults when `path`
/// is the default location and nothing exists there.
pub async fn load_or_default(path: Option<String>) -> Result<Config> {
    load_or_fallback(path, Path::new(DEFAULT_CONFIG_PATH)).await
}

async fn load_or_fallback(path: Option<String>, fallback: &Path) -> Result<Config> {
    match path {
        Some(path) => load_config(path).await,
        None => {
            if tokio::fs::try_exists(fallback).await.unwrap_or(false) {
                load_config(fallback).await
            } else {
                info!("No {} found, using built-in defaults", fallback.display());
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

pub fn parse_config(contents: &str, yaml: bool) -> Result<Config> {
    let config: Config = if yaml {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };

    config.validate()?;
    Ok(config)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}
