//! Resilient client wrapping a platform transport: per-attempt timeout,
//! error classification, exponential backoff with jitter, and circuit
//! breaker accounting on every attempt.

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::classify::{classify, RawFailure};
use pulse_core::campaign::AdPlatform;
use pulse_core::config::PlatformClientConfig;
use pulse_core::error::{PulseError, PulseResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

/// A platform-bound request. The path is platform-native; the body is the
/// already-translated wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Patch,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            path: path.into(),
            body: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Narrow seam over the actual HTTP transport. Implementations perform one
/// network attempt and report failures in raw, unclassified form.
#[allow(async_fn_in_trait)]
pub trait PlatformTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RawFailure>;
}

/// Retry-with-backoff wrapper around one platform's transport, sharing a
/// circuit breaker across all operations of that platform's adapter.
pub struct ResilientClient<T: PlatformTransport> {
    platform: AdPlatform,
    transport: T,
    config: PlatformClientConfig,
    breaker: CircuitBreaker,
}

impl<T: PlatformTransport> ResilientClient<T> {
    pub fn new(platform: AdPlatform, transport: T, config: PlatformClientConfig) -> Self {
        let breaker = CircuitBreaker::new(config.breaker.clone());
        Self {
            platform,
            transport,
            config,
            breaker,
        }
    }

    pub fn platform(&self) -> AdPlatform {
        self.platform
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Issue a request with retry, backoff, and breaker accounting. The
    /// breaker is consulted before every attempt; a rejected gate surfaces
    /// `CIRCUIT_OPEN` without touching the transport.
    pub async fn send(&self, request: ApiRequest) -> PulseResult<ApiResponse> {
        let mut attempt: u32 = 0;
        loop {
            if !self.breaker.allow_request() {
                metrics::counter!("resilience.circuit_open", "platform" => self.platform.as_str())
                    .increment(1);
                return Err(PulseError::CircuitOpen {
                    platform: self.platform,
                });
            }

            let timeout = Duration::from_millis(self.config.timeout_ms);
            let outcome = tokio::time::timeout(timeout, self.transport.execute(request.clone()))
                .await
                .unwrap_or(Err(RawFailure::Timeout));

            let raw = match outcome {
                Ok(response) => {
                    self.breaker.record_success();
                    debug!(
                        platform = self.platform.as_str(),
                        path = %request.path,
                        attempt,
                        status = response.status,
                        "platform call succeeded"
                    );
                    return Ok(response);
                }
                Err(raw) => raw,
            };

            // Every attempt outcome feeds the breaker, timeouts included.
            self.breaker.record_failure();
            let api_error = classify(self.platform, &raw);
            warn!(
                platform = self.platform.as_str(),
                path = %request.path,
                attempt,
                error_code = %api_error.error_code,
                retryable = api_error.retryable,
                "platform call failed"
            );

            if !api_error.retryable {
                return Err(PulseError::Platform(api_error));
            }
            if attempt >= self.config.max_retries {
                metrics::counter!("resilience.retries_exhausted", "platform" => self.platform.as_str())
                    .increment(1);
                return Err(PulseError::RetriesExhausted {
                    platform: self.platform,
                    attempts: attempt + 1,
                    last: api_error,
                });
            }

            // A failure that left the circuit open makes further attempts
            // pointless; surface the transient error now instead of
            // sleeping into a guaranteed gate rejection.
            if self.breaker.state() == CircuitState::Open {
                return Err(PulseError::TransientPlatform(api_error));
            }

            let delay = self.backoff_for_attempt(attempt);
            metrics::counter!("resilience.retry", "platform" => self.platform.as_str())
                .increment(1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Delay doubles each attempt from the initial value, capped, plus
    /// 0..=jitter_ms of random jitter.
    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .initial_backoff_ms
            .saturating_mul(1u64 << attempt.min(16));
        let capped = base.min(self.config.max_backoff_ms);
        let jitter = rand::thread_rng().gen_range(0..=self.config.jitter_ms);
        Duration::from_millis(capped + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::config::BreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted transport: pops one outcome per attempt and counts calls.
    struct ScriptedTransport {
        outcomes: Mutex<Vec<Result<ApiResponse, RawFailure>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(mut outcomes: Vec<Result<ApiResponse, RawFailure>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl PlatformTransport for ScriptedTransport {
        async fn execute(&self, _request: ApiRequest) -> Result<ApiResponse, RawFailure> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(RawFailure::Transport("script exhausted".into())))
        }
    }

    fn config(max_retries: u32) -> PlatformClientConfig {
        PlatformClientConfig {
            max_retries,
            timeout_ms: 5_000,
            initial_backoff_ms: 1000,
            max_backoff_ms: 32_000,
            jitter_ms: 100,
            breaker: BreakerConfig::default(),
            snapshot_ttl_secs: 60,
        }
    }

    fn ok_response() -> Result<ApiResponse, RawFailure> {
        Ok(ApiResponse {
            status: 200,
            body: serde_json::json!({"id": "123"}),
        })
    }

    fn retryable_failure() -> Result<ApiResponse, RawFailure> {
        Err(RawFailure::Http {
            status: 503,
            body: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failures_then_success() {
        let transport = ScriptedTransport::new(vec![
            retryable_failure(),
            retryable_failure(),
            ok_response(),
        ]);
        let client = ResilientClient::new(AdPlatform::GoogleAds, transport, config(3));

        let response = client
            .send(ApiRequest::get("customers/1/campaigns/2"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(client.transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausting_retries_surfaces_max_retries_exceeded() {
        let transport = ScriptedTransport::new(vec![
            retryable_failure(),
            retryable_failure(),
            retryable_failure(),
            retryable_failure(),
        ]);
        let client = ResilientClient::new(AdPlatform::GoogleAds, transport, config(3));

        let err = client
            .send(ApiRequest::get("customers/1/campaigns/2"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MAX_RETRIES_EXCEEDED");
        // 1 initial attempt + 3 retries.
        assert_eq!(client.transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_surfaces_immediately() {
        let transport = ScriptedTransport::new(vec![Err(RawFailure::Http {
            status: 400,
            body: None,
        })]);
        let client = ResilientClient::new(AdPlatform::GoogleAds, transport, config(3));

        let err = client
            .send(ApiRequest::delete("customers/1/campaigns/2"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PLATFORM_ERROR");
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_short_circuits_without_transport_call() {
        let mut cfg = config(0);
        cfg.breaker = BreakerConfig {
            volume_threshold: 4,
            error_threshold_pct: 50,
            reset_timeout_secs: 3600,
            half_open_probes: 3,
            rolling_window_secs: 3600,
        };
        let transport = ScriptedTransport::new(
            (0..4).map(|_| retryable_failure()).collect::<Vec<_>>(),
        );
        let client = ResilientClient::new(AdPlatform::MetaAds, transport, cfg);

        // 4 failing calls trip the breaker (max_retries 0: one attempt each).
        for _ in 0..4 {
            let _ = client.send(ApiRequest::get("act_1/campaigns")).await;
        }
        assert_eq!(client.transport.calls(), 4);

        // 5th and subsequent calls fail fast and never reach the transport.
        for _ in 0..3 {
            let err = client
                .send(ApiRequest::get("act_1/campaigns"))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "CIRCUIT_OPEN");
        }
        assert_eq!(client.transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_tripping_breaker_surfaces_transient_error() {
        let mut cfg = config(5);
        cfg.breaker = BreakerConfig {
            volume_threshold: 2,
            error_threshold_pct: 50,
            reset_timeout_secs: 3600,
            half_open_probes: 3,
            rolling_window_secs: 3600,
        };
        let transport =
            ScriptedTransport::new(vec![retryable_failure(), retryable_failure()]);
        let client = ResilientClient::new(AdPlatform::GoogleAds, transport, cfg);

        // The second failure trips the circuit with retries still
        // budgeted; the transient error surfaces instead of a backoff
        // sleep into a guaranteed gate rejection.
        let err = client
            .send(ApiRequest::get("customers/1/campaigns"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TRANSIENT_PLATFORM_ERROR");
        assert!(err.is_retryable());
        assert_eq!(client.transport.calls(), 2);
        assert_eq!(client.breaker().state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_retryable_failure() {
        struct HangingTransport;
        impl PlatformTransport for HangingTransport {
            async fn execute(&self, _request: ApiRequest) -> Result<ApiResponse, RawFailure> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(RawFailure::Transport("unreachable".into()))
            }
        }

        let mut cfg = config(1);
        cfg.timeout_ms = 50;
        let client = ResilientClient::new(AdPlatform::GoogleAds, HangingTransport, cfg);

        let err = client
            .send(ApiRequest::get("customers/1/campaigns"))
            .await
            .unwrap_err();
        match err {
            PulseError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(last.error_code, "TIMEOUT");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut cfg = config(10);
        cfg.jitter_ms = 0;
        let client = ResilientClient::new(
            AdPlatform::GoogleAds,
            ScriptedTransport::new(vec![]),
            cfg,
        );
        assert_eq!(client.backoff_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(client.backoff_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(client.backoff_for_attempt(4), Duration::from_millis(16_000));
        assert_eq!(client.backoff_for_attempt(5), Duration::from_millis(32_000));
        assert_eq!(client.backoff_for_attempt(9), Duration::from_millis(32_000));
    }
}
