#![warn(clippy::unwrap_used)]

pub mod campaign;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reports;

pub use config::AppConfig;
pub use error::{ApiError, PulseError, PulseResult};
