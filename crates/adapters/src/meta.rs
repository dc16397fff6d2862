//! Meta Ads adapter. Resources live under `act_{account}/...` collections
//! and are identified by opaque numeric ids returned in the `id` field.
//! Failures surface as a string `error.code` in the response body rather
//! than a meaningful HTTP status.

use crate::snapshot::SnapshotCache;
use crate::{OperationStep, PlatformAdapter, SyncError, SyncResult};
use pulse_core::campaign::{
    AdPlatform, CampaignSpec, CampaignStatus, LivePerformance, MetaCampaignConfig, MetaObjective,
    ProviderCampaignId, RemoteCampaign,
};
use pulse_core::config::PlatformClientConfig;
use pulse_core::error::{PulseError, PulseResult};
use pulse_resilience::{ApiRequest, PlatformTransport, ResilientClient};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaCampaignPayload {
    name: String,
    objective: String,
    status: String,
    lifetime_budget: i64,
    special_ad_categories: Vec<String>,
    start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaAdSetPayload {
    name: String,
    campaign_id: String,
    status: String,
    optimization_goal: String,
    billing_event: String,
    bid_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaAdPayload {
    name: String,
    adset_id: String,
    status: String,
    creative: MetaCreative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaCreative {
    title: String,
    body: String,
    link_url: String,
}

fn status_str(status: CampaignStatus) -> &'static str {
    match status {
        CampaignStatus::Active => "ACTIVE",
        CampaignStatus::Draft | CampaignStatus::Paused => "PAUSED",
        CampaignStatus::Ended => "ARCHIVED",
    }
}

fn parse_status(raw: &str) -> CampaignStatus {
    match raw {
        "ACTIVE" => CampaignStatus::Active,
        "ARCHIVED" | "DELETED" => CampaignStatus::Ended,
        _ => CampaignStatus::Paused,
    }
}

fn objective_str(objective: MetaObjective) -> &'static str {
    match objective {
        MetaObjective::OutcomeAwareness => "OUTCOME_AWARENESS",
        MetaObjective::OutcomeTraffic => "OUTCOME_TRAFFIC",
        MetaObjective::OutcomeEngagement => "OUTCOME_ENGAGEMENT",
        MetaObjective::OutcomeLeads => "OUTCOME_LEADS",
        MetaObjective::OutcomeSales => "OUTCOME_SALES",
    }
}

/// Insights values arrive as JSON strings in Graph responses; accept a
/// bare number too.
fn u64_field(body: &serde_json::Value, pointer: &str) -> u64 {
    match body.pointer(pointer) {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn created_id(body: &serde_json::Value) -> Option<String> {
    body.pointer("/id").and_then(|v| v.as_str()).map(str::to_string)
}

pub struct MetaAdsAdapter<T: PlatformTransport> {
    client: ResilientClient<T>,
    snapshots: SnapshotCache,
}

impl<T: PlatformTransport> MetaAdsAdapter<T> {
    pub fn new(transport: T, config: PlatformClientConfig) -> Self {
        let snapshots = SnapshotCache::new(config.snapshot_ttl_secs);
        Self {
            client: ResilientClient::new(AdPlatform::MetaAds, transport, config),
            snapshots,
        }
    }

    pub fn client(&self) -> &ResilientClient<T> {
        &self.client
    }

    fn err(&self, step: OperationStep, source: PulseError) -> SyncError {
        SyncError::new(AdPlatform::MetaAds, step, source)
    }

    fn config<'a>(&self, spec: &'a CampaignSpec) -> SyncResult<&'a MetaCampaignConfig> {
        spec.meta.as_ref().ok_or_else(|| {
            self.err(
                OperationStep::Validation,
                PulseError::Validation(format!(
                    "campaign {} is missing the mandatory Meta Ads configuration",
                    spec.id
                )),
            )
        })
    }

    fn to_wire(&self, spec: &CampaignSpec, config: &MetaCampaignConfig) -> MetaCampaignPayload {
        MetaCampaignPayload {
            name: spec.name.clone(),
            objective: objective_str(config.objective).to_string(),
            status: status_str(spec.status).to_string(),
            lifetime_budget: spec.budget_micros / 10_000,
            special_ad_categories: config.special_ad_categories.clone(),
            start_time: spec.start_date.to_rfc3339(),
            stop_time: spec.end_date.map(|d| d.to_rfc3339()),
        }
    }

    fn wire_json<W: Serialize>(&self, step: OperationStep, wire: &W) -> SyncResult<serde_json::Value> {
        serde_json::to_value(wire).map_err(|e| self.err(step, e.into()))
    }

    /// Create the ad sets and ads belonging to a campaign id. Shared
    /// between create and update; stops at the first failure.
    async fn push_sub_resources(
        &self,
        config: &MetaCampaignConfig,
        campaign_id: &str,
        spec: &CampaignSpec,
    ) -> SyncResult<()> {
        let account = &config.ad_account_id;
        for (gi, group) in spec.ad_groups.iter().enumerate() {
            let wire = MetaAdSetPayload {
                name: group.name.clone(),
                campaign_id: campaign_id.to_string(),
                status: "ACTIVE".to_string(),
                optimization_goal: config.optimization_goal.clone(),
                billing_event: config.billing_event.clone(),
                bid_amount: group.bid_micros / 10_000,
            };
            let body = self.wire_json(OperationStep::AdGroup(gi), &wire)?;
            let response = self
                .client
                .send(ApiRequest::post(format!("act_{account}/adsets"), body))
                .await
                .map_err(|e| self.err(OperationStep::AdGroup(gi), e))?;
            let adset_id = created_id(&response.body).ok_or_else(|| {
                self.err(
                    OperationStep::AdGroup(gi),
                    PulseError::Unknown("ad set response carried no id".to_string()),
                )
            })?;

            for (ai, ad) in group.ads.iter().enumerate() {
                let step = OperationStep::Ad { group: gi, ad: ai };
                let wire = MetaAdPayload {
                    name: ad.headline.clone(),
                    adset_id: adset_id.clone(),
                    status: "ACTIVE".to_string(),
                    creative: MetaCreative {
                        title: ad.headline.clone(),
                        body: ad.description.clone(),
                        link_url: ad.final_url.clone(),
                    },
                };
                let body = self.wire_json(step, &wire)?;
                self.client
                    .send(ApiRequest::post(format!("act_{account}/ads"), body))
                    .await
                    .map_err(|e| self.err(step, e))?;
            }
        }
        Ok(())
    }
}

impl<T: PlatformTransport> PlatformAdapter for MetaAdsAdapter<T> {
    fn platform(&self) -> AdPlatform {
        AdPlatform::MetaAds
    }

    fn validate(&self, spec: &CampaignSpec) -> PulseResult<()> {
        self.config(spec).map(|_| ()).map_err(|e| e.source)
    }

    async fn create(&self, spec: &CampaignSpec) -> SyncResult<ProviderCampaignId> {
        let config = self.config(spec)?;
        let account = config.ad_account_id.clone();
        let body = self.wire_json(OperationStep::Campaign, &self.to_wire(spec, config))?;

        debug!(campaign = %spec.id, ad_account = %account, "creating Meta Ads campaign");
        let response = self
            .client
            .send(ApiRequest::post(format!("act_{account}/campaigns"), body))
            .await
            .map_err(|e| self.err(OperationStep::Campaign, e))?;

        let campaign_id = created_id(&response.body).ok_or_else(|| {
            self.err(
                OperationStep::Campaign,
                PulseError::Unknown("campaign response carried no id".to_string()),
            )
        })?;

        self.push_sub_resources(config, &campaign_id, spec).await?;
        Ok(ProviderCampaignId(campaign_id))
    }

    async fn update(&self, id: &ProviderCampaignId, spec: &CampaignSpec) -> SyncResult<()> {
        let config = self.config(spec)?;
        let body = self.wire_json(OperationStep::Campaign, &self.to_wire(spec, config))?;
        // Graph mutates existing nodes through POST on the node id.
        self.client
            .send(ApiRequest::post(id.0.clone(), body))
            .await
            .map_err(|e| self.err(OperationStep::Campaign, e))?;
        self.push_sub_resources(config, &id.0, spec).await
    }

    async fn get(&self, id: &ProviderCampaignId) -> SyncResult<RemoteCampaign> {
        let response = self
            .client
            .send(ApiRequest::get(id.0.clone()))
            .await
            .map_err(|e| self.err(OperationStep::Campaign, e))?;

        let name = response
            .body
            .pointer("/name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let status = response
            .body
            .pointer("/status")
            .and_then(|v| v.as_str())
            .map(parse_status)
            .unwrap_or(CampaignStatus::Paused);

        // Independent read; a failed performance fetch degrades the
        // snapshot to None instead of failing the get.
        let performance = self.live_performance(id).await.ok();

        Ok(RemoteCampaign {
            provider_id: id.clone(),
            platform: AdPlatform::MetaAds,
            name,
            status,
            performance,
        })
    }

    async fn delete(&self, id: &ProviderCampaignId) -> SyncResult<()> {
        self.client
            .send(ApiRequest::delete(id.0.clone()))
            .await
            .map_err(|e| self.err(OperationStep::Campaign, e))?;
        Ok(())
    }

    async fn pause(&self, id: &ProviderCampaignId) -> SyncResult<()> {
        let body = serde_json::json!({ "status": "PAUSED" });
        self.client
            .send(ApiRequest::post(id.0.clone(), body))
            .await
            .map_err(|e| self.err(OperationStep::Campaign, e))?;
        Ok(())
    }

    async fn live_performance(&self, id: &ProviderCampaignId) -> SyncResult<LivePerformance> {
        if let Some(snapshot) = self.snapshots.get(&id.0) {
            return Ok(snapshot);
        }

        let response = self
            .client
            .send(ApiRequest::get(format!("{}/insights", id.0)))
            .await
            .map_err(|e| self.err(OperationStep::Performance, e))?;

        let body = &response.body;
        let snapshot = LivePerformance {
            impressions: u64_field(body, "/data/0/impressions"),
            clicks: u64_field(body, "/data/0/clicks"),
            conversions: u64_field(body, "/data/0/conversions"),
            spend_micros: (u64_field(body, "/data/0/spend") * 10_000) as i64,
            fetched_at: chrono::Utc::now(),
        };
        self.snapshots.put(id.0.clone(), snapshot.clone());
        Ok(snapshot)
    }
}
