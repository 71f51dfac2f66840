// src/health/prober.rs
use crate::metrics::{MetricsCollector, Timer};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Result of a single probe, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The exchange did not complete: refused, DNS failure, timeout, or the
    /// body could not be read.
    TransportError(String),
    Response { status: u16, body: String },
}

impl ProbeOutcome {
    pub fn is_transport_error(&self) -> bool {
        matches!(self, ProbeOutcome::TransportError(_))
    }
}

/// Issues one `GET http://<address>/` per call. No retries.
#[derive(Clone)]
pub struct Prober {
    client: Client,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Prober {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsCollector>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn probe(&self, address: &str) -> ProbeOutcome {
        let timer = Timer::new();
        let outcome = match probe_target(address) {
            Ok(target) => self.fetch(target).await,
            Err(e) => ProbeOutcome::TransportError(format!("invalid address {:?}: {}", address, e)),
        };
        let elapsed = timer.elapsed();

        match &outcome {
            ProbeOutcome::Response { status, body } => debug!(
                "Probe {} -> HTTP {} ({} bytes) in {:?}",
                address,
                status,
                body.len(),
                elapsed
            ),
            ProbeOutcome::TransportError(e) => {
                debug!("Probe {} failed after {:?}: {}", address, elapsed, e)
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_probe(outcome.is_transport_error(), elapsed);
        }

        outcome
    }

    async fn fetch(&self, target: Url) -> ProbeOutcome {
        let response = match self.client.get(target).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::TransportError(e.to_string()),
        };

        let status = response.status().as_u16();
        // `bytes()` consumes the response, so the connection is released on
        // every path out of here.
        match response.bytes().await {
            Ok(body) => ProbeOutcome::Response {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            },
            Err(e) => ProbeOutcome::TransportError(format!("reading body: {}", e)),
        }
    }
}

/// `example.com` becomes `http://example.com/`.
pub fn probe_target(address: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("http://{}/", address))
}
