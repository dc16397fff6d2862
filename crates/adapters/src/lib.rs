#![warn(clippy::unwrap_used)]

//! Platform adapters: one polymorphic contract per external advertising
//! platform, selected once at the sync-service boundary. Every outbound
//! call goes through the resilient client; multi-step operations surface
//! the step that failed and never compensate already-created remote
//! sub-resources.

pub mod google;
pub mod meta;
pub mod snapshot;
pub mod sync;

use pulse_core::campaign::{
    AdPlatform, CampaignSpec, LivePerformance, ProviderCampaignId, RemoteCampaign,
};
use pulse_core::error::{PulseError, PulseResult};
use thiserror::Error;

pub use google::GoogleAdsAdapter;
pub use meta::MetaAdsAdapter;
pub use snapshot::SnapshotCache;
pub use sync::CampaignSyncService;

/// The step of a multi-call adapter operation that failed. Remote
/// sub-resources created by earlier steps are left in place; callers
/// reconcile or retry the whole operation idempotently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStep {
    Validation,
    Campaign,
    AdGroup(usize),
    Ad { group: usize, ad: usize },
    Performance,
}

impl std::fmt::Display for OperationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStep::Validation => write!(f, "validation"),
            OperationStep::Campaign => write!(f, "campaign call"),
            OperationStep::AdGroup(i) => write!(f, "ad group {i}"),
            OperationStep::Ad { group, ad } => write!(f, "ad {ad} of group {group}"),
            OperationStep::Performance => write!(f, "performance read"),
        }
    }
}

/// Adapter failure, tagged with the platform and the step that failed.
#[derive(Debug, Error)]
#[error("{platform} {step} failed: {source}")]
pub struct SyncError {
    pub platform: AdPlatform,
    pub step: OperationStep,
    #[source]
    pub source: PulseError,
}

impl SyncError {
    pub fn new(platform: AdPlatform, step: OperationStep, source: PulseError) -> Self {
        Self {
            platform,
            step,
            source,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Contract shared by both platform adapters. Each operation validates the
/// platform-mandatory nested configuration first (fail fast,
/// non-retryable), translates the domain object to the platform wire
/// shape, then issues calls through the resilient client: campaign first,
/// then per ad group, then per ad.
#[allow(async_fn_in_trait)]
pub trait PlatformAdapter {
    fn platform(&self) -> AdPlatform;

    /// Check that the platform-mandatory nested configuration is present.
    fn validate(&self, spec: &CampaignSpec) -> PulseResult<()>;

    async fn create(&self, spec: &CampaignSpec) -> SyncResult<ProviderCampaignId>;

    async fn update(&self, id: &ProviderCampaignId, spec: &CampaignSpec) -> SyncResult<()>;

    async fn get(&self, id: &ProviderCampaignId) -> SyncResult<RemoteCampaign>;

    async fn delete(&self, id: &ProviderCampaignId) -> SyncResult<()>;

    async fn pause(&self, id: &ProviderCampaignId) -> SyncResult<()>;

    /// Live delivery stats, served from the adapter's short-TTL snapshot
    /// cache to bound polling pressure on the external API.
    async fn live_performance(&self, id: &ProviderCampaignId) -> SyncResult<LivePerformance>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use pulse_core::campaign::{
        AdGroupSpec, AdSpec, CampaignSpec, CampaignStatus, GoogleBiddingStrategy,
        GoogleCampaignConfig, GoogleChannelType, MetaCampaignConfig, MetaObjective,
    };
    use pulse_resilience::{ApiRequest, ApiResponse, PlatformTransport, RawFailure};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    /// Transport double that records every request and either replays a
    /// scripted outcome per call or answers every call the same way.
    #[derive(Clone)]
    pub struct RecordingTransport {
        inner: Arc<Inner>,
    }

    struct Inner {
        script: Mutex<Vec<Result<serde_json::Value, RawFailure>>>,
        fallback: Option<serde_json::Value>,
        calls: AtomicU32,
        paths: Mutex<Vec<String>>,
        bodies: Mutex<Vec<Option<serde_json::Value>>>,
    }

    impl RecordingTransport {
        pub fn always(body: serde_json::Value) -> Self {
            Self {
                inner: Arc::new(Inner {
                    script: Mutex::new(Vec::new()),
                    fallback: Some(body),
                    calls: AtomicU32::new(0),
                    paths: Mutex::new(Vec::new()),
                    bodies: Mutex::new(Vec::new()),
                }),
            }
        }

        pub fn script(mut outcomes: Vec<Result<serde_json::Value, RawFailure>>) -> Self {
            outcomes.reverse();
            Self {
                inner: Arc::new(Inner {
                    script: Mutex::new(outcomes),
                    fallback: None,
                    calls: AtomicU32::new(0),
                    paths: Mutex::new(Vec::new()),
                    bodies: Mutex::new(Vec::new()),
                }),
            }
        }

        pub fn calls(&self) -> u32 {
            self.inner.calls.load(Ordering::Relaxed)
        }

        pub fn paths(&self) -> Vec<String> {
            self.inner.paths.lock().unwrap().clone()
        }

        pub fn bodies(&self) -> Vec<Option<serde_json::Value>> {
            self.inner.bodies.lock().unwrap().clone()
        }
    }

    impl PlatformTransport for RecordingTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RawFailure> {
            self.inner.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.paths.lock().unwrap().push(request.path.clone());
            self.inner.bodies.lock().unwrap().push(request.body.clone());

            let scripted = self.inner.script.lock().unwrap().pop();
            let outcome = match scripted {
                Some(outcome) => outcome,
                None => match &self.inner.fallback {
                    Some(body) => Ok(body.clone()),
                    None => Err(RawFailure::Transport("script exhausted".to_string())),
                },
            };
            outcome.map(|body| ApiResponse { status: 200, body })
        }
    }

    /// A two-group campaign valid for both platforms: group 0 has one ad,
    /// group 1 has two.
    pub fn campaign_spec() -> CampaignSpec {
        CampaignSpec {
            id: Uuid::new_v4(),
            name: "Autumn Push".to_string(),
            status: CampaignStatus::Active,
            budget_micros: 250_000_000,
            start_date: Utc::now(),
            end_date: None,
            ad_groups: vec![
                AdGroupSpec {
                    name: "Search brand".to_string(),
                    bid_micros: 1_200_000,
                    ads: vec![AdSpec {
                        headline: "Fall sale".to_string(),
                        description: "Save 20% this week".to_string(),
                        final_url: "https://example.com/fall".to_string(),
                    }],
                },
                AdGroupSpec {
                    name: "Search generic".to_string(),
                    bid_micros: 900_000,
                    ads: vec![
                        AdSpec {
                            headline: "New arrivals".to_string(),
                            description: "Latest styles in stock".to_string(),
                            final_url: "https://example.com/new".to_string(),
                        },
                        AdSpec {
                            headline: "Free shipping".to_string(),
                            description: "On orders over $50".to_string(),
                            final_url: "https://example.com/shipping".to_string(),
                        },
                    ],
                },
            ],
            google: Some(GoogleCampaignConfig {
                customer_id: "1".to_string(),
                advertising_channel_type: GoogleChannelType::Search,
                bidding_strategy: GoogleBiddingStrategy::MaximizeClicks,
            }),
            meta: Some(MetaCampaignConfig {
                ad_account_id: "77".to_string(),
                objective: MetaObjective::OutcomeSales,
                optimization_goal: "LINK_CLICKS".to_string(),
                billing_event: "IMPRESSIONS".to_string(),
                special_ad_categories: vec![],
            }),
        }
    }
}
