//! Google Ads adapter. Resources are addressed by `customers/{cid}/...`
//! paths and identified by resource names; the wire shape is camelCase
//! with SCREAMING_CASE enum strings.

use crate::snapshot::SnapshotCache;
use crate::{OperationStep, PlatformAdapter, SyncError, SyncResult};
use pulse_core::campaign::{
    AdPlatform, CampaignSpec, CampaignStatus, GoogleCampaignConfig, LivePerformance,
    ProviderCampaignId, RemoteCampaign,
};
use pulse_core::config::PlatformClientConfig;
use pulse_core::error::{PulseError, PulseResult};
use pulse_resilience::{ApiRequest, PlatformTransport, ResilientClient};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCampaignResource {
    name: String,
    status: String,
    advertising_channel_type: String,
    bidding_strategy_type: String,
    campaign_budget: GoogleBudget,
    start_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleBudget {
    amount_micros: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAdGroup {
    name: String,
    campaign: String,
    status: String,
    cpc_bid_micros: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAdGroupAd {
    ad_group: String,
    status: String,
    ad: GoogleAd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAd {
    headline: String,
    description: String,
    final_urls: Vec<String>,
}

fn status_str(status: CampaignStatus) -> &'static str {
    match status {
        CampaignStatus::Active => "ENABLED",
        CampaignStatus::Draft | CampaignStatus::Paused => "PAUSED",
        CampaignStatus::Ended => "REMOVED",
    }
}

fn parse_status(raw: &str) -> CampaignStatus {
    match raw {
        "ENABLED" => CampaignStatus::Active,
        "REMOVED" => CampaignStatus::Ended,
        _ => CampaignStatus::Paused,
    }
}

fn channel_str(config: &GoogleCampaignConfig) -> String {
    format!("{:?}", config.advertising_channel_type).to_uppercase()
}

fn bidding_str(config: &GoogleCampaignConfig) -> String {
    format!("{:?}", config.bidding_strategy).to_uppercase()
}

pub struct GoogleAdsAdapter<T: PlatformTransport> {
    client: ResilientClient<T>,
    snapshots: SnapshotCache,
}

impl<T: PlatformTransport> GoogleAdsAdapter<T> {
    pub fn new(transport: T, config: PlatformClientConfig) -> Self {
        let snapshots = SnapshotCache::new(config.snapshot_ttl_secs);
        Self {
            client: ResilientClient::new(AdPlatform::GoogleAds, transport, config),
            snapshots,
        }
    }

    pub fn client(&self) -> &ResilientClient<T> {
        &self.client
    }

    fn err(&self, step: OperationStep, source: PulseError) -> SyncError {
        SyncError::new(AdPlatform::GoogleAds, step, source)
    }

    fn config<'a>(&self, spec: &'a CampaignSpec) -> SyncResult<&'a GoogleCampaignConfig> {
        spec.google.as_ref().ok_or_else(|| {
            self.err(
                OperationStep::Validation,
                PulseError::Validation(format!(
                    "campaign {} is missing the mandatory Google Ads configuration",
                    spec.id
                )),
            )
        })
    }

    fn to_wire(&self, spec: &CampaignSpec, config: &GoogleCampaignConfig) -> GoogleCampaignResource {
        GoogleCampaignResource {
            name: spec.name.clone(),
            status: status_str(spec.status).to_string(),
            advertising_channel_type: channel_str(config),
            bidding_strategy_type: bidding_str(config),
            campaign_budget: GoogleBudget {
                amount_micros: spec.budget_micros,
            },
            start_date: spec.start_date.format("%Y-%m-%d").to_string(),
            end_date: spec.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }

    fn wire_json<W: Serialize>(&self, step: OperationStep, wire: &W) -> SyncResult<serde_json::Value> {
        serde_json::to_value(wire).map_err(|e| self.err(step, e.into()))
    }

    /// Create the ad-group and ad sub-resources under a campaign resource
    /// name. Shared between create and update; stops at the first failure.
    async fn push_sub_resources(
        &self,
        customer_id: &str,
        campaign_resource: &str,
        spec: &CampaignSpec,
    ) -> SyncResult<()> {
        for (gi, group) in spec.ad_groups.iter().enumerate() {
            let wire = GoogleAdGroup {
                name: group.name.clone(),
                campaign: campaign_resource.to_string(),
                status: "ENABLED".to_string(),
                cpc_bid_micros: group.bid_micros,
            };
            let body = self.wire_json(OperationStep::AdGroup(gi), &wire)?;
            let response = self
                .client
                .send(ApiRequest::post(
                    format!("customers/{customer_id}/adGroups"),
                    body,
                ))
                .await
                .map_err(|e| self.err(OperationStep::AdGroup(gi), e))?;
            let group_resource = resource_name(&response.body).ok_or_else(|| {
                self.err(
                    OperationStep::AdGroup(gi),
                    PulseError::Unknown("ad group response carried no resource name".to_string()),
                )
            })?;

            for (ai, ad) in group.ads.iter().enumerate() {
                let step = OperationStep::Ad { group: gi, ad: ai };
                let wire = GoogleAdGroupAd {
                    ad_group: group_resource.clone(),
                    status: "ENABLED".to_string(),
                    ad: GoogleAd {
                        headline: ad.headline.clone(),
                        description: ad.description.clone(),
                        final_urls: vec![ad.final_url.clone()],
                    },
                };
                let body = self.wire_json(step, &wire)?;
                self.client
                    .send(ApiRequest::post(
                        format!("customers/{customer_id}/adGroupAds"),
                        body,
                    ))
                    .await
                    .map_err(|e| self.err(step, e))?;
            }
        }
        Ok(())
    }
}

/// Pull the resource name out of a mutate response, accepting both the
/// batched (`results[0].resourceName`) and single-resource shapes.
fn resource_name(body: &serde_json::Value) -> Option<String> {
    body.pointer("/results/0/resourceName")
        .or_else(|| body.pointer("/resourceName"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

impl<T: PlatformTransport> PlatformAdapter for GoogleAdsAdapter<T> {
    fn platform(&self) -> AdPlatform {
        AdPlatform::GoogleAds
    }

    fn validate(&self, spec: &CampaignSpec) -> PulseResult<()> {
        self.config(spec).map(|_| ()).map_err(|e| e.source)
    }

    async fn create(&self, spec: &CampaignSpec) -> SyncResult<ProviderCampaignId> {
        let config = self.config(spec)?;
        let customer_id = config.customer_id.clone();
        let body = self.wire_json(OperationStep::Campaign, &self.to_wire(spec, config))?;

        debug!(campaign = %spec.id, customer_id = %customer_id, "creating Google Ads campaign");
        let response = self
            .client
            .send(ApiRequest::post(
                format!("customers/{customer_id}/campaigns"),
                body,
            ))
            .await
            .map_err(|e| self.err(OperationStep::Campaign, e))?;

        let campaign_resource = resource_name(&response.body).ok_or_else(|| {
            self.err(
                OperationStep::Campaign,
                PulseError::Unknown("campaign response carried no resource name".to_string()),
            )
        })?;

        self.push_sub_resources(&customer_id, &campaign_resource, spec)
            .await?;
        Ok(ProviderCampaignId(campaign_resource))
    }

    async fn update(&self, id: &ProviderCampaignId, spec: &CampaignSpec) -> SyncResult<()> {
        let config = self.config(spec)?;
        let body = self.wire_json(OperationStep::Campaign, &self.to_wire(spec, config))?;
        self.client
            .send(ApiRequest::patch(id.0.clone(), body))
            .await
            .map_err(|e| self.err(OperationStep::Campaign, e))?;
        self.push_sub_resources(&config.customer_id, &id.0, spec)
            .await
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
            platform: AdPlatform::GoogleAds,
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
            .send(ApiRequest::patch(id.0.clone(), body))
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
            .send(ApiRequest::get(format!("{}/metrics", id.0)))
            .await
            .map_err(|e| self.err(OperationStep::Performance, e))?;

        let m = &response.body;
        let snapshot = LivePerformance {
            impressions: m.pointer("/impressions").and_then(|v| v.as_u64()).unwrap_or(0),
            clicks: m.pointer("/clicks").and_then(|v| v.as_u64()).unwrap_or(0),
            conversions: m.pointer("/conversions").and_then(|v| v.as_u64()).unwrap_or(0),
            spend_micros: m.pointer("/costMicros").and_then(|v| v.as_i64()).unwrap_or(0),
            fetched_at: chrono::Utc::now(),
        };
        self.snapshots.put(id.0.clone(), snapshot.clone());
        Ok(snapshot)
    }
}
