// src/health/classifier.rs
use super::prober::ProbeOutcome;
use crate::site::SiteStatus;

/// Markup served by the known block page in place of the real site.
pub const BLOCK_SIGNATURE: &str = r#"<img src="mdes.jpg" width="800" height="700">"#;

/// Maps a probe outcome to a site status. Pure: no clock, no state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    block_signature: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(BLOCK_SIGNATURE)
    }
}

impl Classifier {
    pub fn new(block_signature: impl Into<String>) -> Self {
        Self {
            block_signature: block_signature.into(),
        }
    }

    pub fn block_signature(&self) -> &str {
        &self.block_signature
    }

    /// First match wins: transport error, then non-200, then the block
    /// signature (exact, case-sensitive substring), otherwise `Up`.
    pub fn classify(&self, outcome: &ProbeOutcome) -> SiteStatus {
        match outcome {
            ProbeOutcome::TransportError(_) => SiteStatus::Down,
            ProbeOutcome::Response { status, .. } if *status != 200 => SiteStatus::Down,
            ProbeOutcome::Response { body, .. } if body.contains(self.block_signature.as_str()) => {
                SiteStatus::Blocked
            }
            ProbeOutcome::Response { .. } => SiteStatus::Up,
        }
    }
}

/// Classify with the default block signature.
pub fn classify(outcome: &ProbeOutcome) -> SiteStatus {
    Classifier::default().classify(outcome)
}
