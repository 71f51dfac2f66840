// src/health/mod.rs
mod checker;
mod classifier;
mod prober;
mod scheduler;

pub use checker::Checker;
pub use classifier::{classify, Classifier, BLOCK_SIGNATURE};
pub use prober::{probe_target, ProbeOutcome, Prober};
pub use scheduler::{Scheduler, SweepSummary};
