//! Domain campaign model used at the platform-adapter boundary. Each
//! external platform requires its own nested configuration block; adapters
//! fail fast when the mandatory block is missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdPlatform {
    GoogleAds,
    MetaAds,
}

impl AdPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdPlatform::GoogleAds => "google_ads",
            AdPlatform::MetaAds => "meta_ads",
        }
    }
}

impl std::fmt::Display for AdPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Ended,
}

/// A campaign as our platform models it, before translation to either
/// external platform's wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSpec {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    /// Total budget in micro-units of the account currency.
    pub budget_micros: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub ad_groups: Vec<AdGroupSpec>,
    /// Mandatory when the campaign targets Google Ads.
    #[serde(default)]
    pub google: Option<GoogleCampaignConfig>,
    /// Mandatory when the campaign targets Meta Ads.
    #[serde(default)]
    pub meta: Option<MetaCampaignConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdGroupSpec {
    pub name: String,
    /// Default bid in micro-units.
    pub bid_micros: i64,
    pub ads: Vec<AdSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSpec {
    pub headline: String,
    pub description: String,
    pub final_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleCampaignConfig {
    pub customer_id: String,
    pub advertising_channel_type: GoogleChannelType,
    pub bidding_strategy: GoogleBiddingStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoogleChannelType {
    Search,
    Display,
    Video,
    PerformanceMax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoogleBiddingStrategy {
    MaximizeClicks,
    MaximizeConversions,
    TargetCpa,
    TargetRoas,
    ManualCpc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCampaignConfig {
    pub ad_account_id: String,
    pub objective: MetaObjective,
    pub optimization_goal: String,
    pub billing_event: String,
    #[serde(default)]
    pub special_ad_categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaObjective {
    OutcomeAwareness,
    OutcomeTraffic,
    OutcomeEngagement,
    OutcomeLeads,
    OutcomeSales,
}

/// Identifier assigned by the external platform when a resource is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCampaignId(pub String);

impl std::fmt::Display for ProviderCampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a campaign as the external platform reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCampaign {
    pub provider_id: ProviderCampaignId,
    pub platform: AdPlatform,
    pub name: String,
    pub status: CampaignStatus,
    /// Live delivery stats, when a fresh or cached snapshot is available.
    pub performance: Option<LivePerformance>,
}

/// Live delivery stats read from the platform, cached with a short TTL to
/// bound polling pressure on the external API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePerformance {
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub spend_micros: i64,
    pub fetched_at: DateTime<Utc>,
}
