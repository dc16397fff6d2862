//! Deterministic stand-in transports for running the pipeline without
//! live platform credentials. Each platform answers in its own wire
//! dialect so the adapters exercise their real parsing paths.

use pulse_core::campaign::AdPlatform;
use pulse_resilience::{ApiRequest, ApiResponse, HttpMethod, PlatformTransport, RawFailure};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct SimulatedTransport {
    platform: AdPlatform,
    sequence: AtomicU64,
}

impl SimulatedTransport {
    pub fn new(platform: AdPlatform) -> Self {
        Self {
            platform,
            sequence: AtomicU64::new(0),
        }
    }

    fn stats(&self, n: u64) -> (u64, u64, u64, u64) {
        // Monotonic-ish delivery numbers so successive polls drift upward.
        let impressions = 10_000 + n * 311;
        let clicks = impressions / 40 + n % 17;
        let conversions = clicks / 25;
        let spend_micros = 1_000_000 + n * 7_919;
        (impressions, clicks, conversions, spend_micros)
    }
}

impl PlatformTransport for SimulatedTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RawFailure> {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let (impressions, clicks, conversions, spend_micros) = self.stats(n);

        let body = match (self.platform, request.method) {
            (AdPlatform::GoogleAds, HttpMethod::Get) if request.path.ends_with("/metrics") => {
                json!({
                    "impressions": impressions,
                    "clicks": clicks,
                    "conversions": conversions,
                    "costMicros": spend_micros,
                })
            }
            (AdPlatform::GoogleAds, HttpMethod::Get) => {
                json!({ "name": "simulated", "status": "ENABLED" })
            }
            (AdPlatform::GoogleAds, _) => {
                json!({ "results": [{ "resourceName": format!("customers/1/simulated/{n}") }] })
            }
            (AdPlatform::MetaAds, HttpMethod::Get) if request.path.ends_with("/insights") => {
                json!({
                    "data": [{
                        "impressions": impressions.to_string(),
                        "clicks": clicks.to_string(),
                        "conversions": conversions.to_string(),
                        "spend": (spend_micros / 10_000).to_string(),
                    }]
                })
            }
            (AdPlatform::MetaAds, HttpMethod::Get) => {
                json!({ "name": "simulated", "status": "ACTIVE" })
            }
            (AdPlatform::MetaAds, _) => json!({ "id": format!("{}", 100 + n) }),
        };

        Ok(ApiResponse { status: 200, body })
    }
}
