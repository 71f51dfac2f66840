// src/main.rs
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use site_monitor::{
    config,
    health::{Checker, Classifier, Prober, Scheduler},
    metrics::MetricsRegistry,
    server::{RequestHandler, ServerBuilder, SiteApi},
    site,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("site_monitor=info".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1);
    info!(
        "Loading configuration from: {}",
        config_path.as_deref().unwrap_or(config::DEFAULT_CONFIG_PATH)
    );
    let config = config::load_or_default(config_path).await?;

    // Open the store; failure here is fatal
    let store = site::open_store(&config.store).context("Failed to open site store")?;

    // Initialize metrics
    let registry = if config.metrics.enabled {
        Some(Arc::new(MetricsRegistry::new()?))
    } else {
        None
    };
    let metrics = registry.as_ref().map(|r| r.collector());

    // Build the checker shared by the API and the scheduler
    let prober = Prober::new(config.monitor.probe_timeout())
        .context("Failed to create HTTP client")?
        .with_metrics(metrics.clone());
    let classifier = Classifier::new(config.monitor.block_signature.clone());
    let checker = Arc::new(Checker::new(store, prober, classifier, metrics.clone()));

    // Start the background scheduler
    let scheduler = Arc::new(Scheduler::new(&config.monitor, checker.clone(), metrics));
    let scheduler_task = tokio::spawn(scheduler.clone().start());

    // Create request handler
    let mut api = SiteApi::new(checker, &config).context("Invalid cors.allow_origin")?;
    if let Some(registry) = registry {
        info!("Metrics exposed at {}", config.metrics.path);
        api = api.with_metrics(registry);
    }
    let handler = RequestHandler::new(Arc::new(api));

    info!("Starting site monitor on {}", config.listen);

    let served = ServerBuilder::new(config.listen)
        .with_handler(handler)
        .serve_with_shutdown(shutdown_signal())
        .await;

    scheduler.shutdown();
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task failed: {}", e);
    }

    served
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
