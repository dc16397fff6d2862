#![warn(clippy::unwrap_used)]

pub mod breaker;
pub mod classify;
pub mod client;

pub use breaker::{CircuitBreaker, CircuitState};
pub use classify::{classify, RawFailure};
pub use client::{ApiRequest, ApiResponse, HttpMethod, PlatformTransport, ResilientClient};
