#![warn(clippy::unwrap_used)]

pub mod aggregation;
pub mod forecast;
pub mod orchestrator;

pub use orchestrator::{AnalyticsOrchestrator, IngestSummary};
