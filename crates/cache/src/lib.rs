#![warn(clippy::unwrap_used)]

pub mod layer;
pub mod ttl;

pub use layer::MetricsCacheLayer;
pub use ttl::TtlCache;
