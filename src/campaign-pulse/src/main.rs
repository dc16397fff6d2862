//! Campaign Pulse daemon. Wires the platform sync layer to the analytics
//! pipeline: creates one simulated campaign per platform, then polls live
//! delivery stats on an interval and feeds them through ingestion so the
//! cached reports, realtime snapshots, and forecasts stay warm.

mod transport;

use chrono::Utc;
use clap::Parser;
use pulse_adapters::{CampaignSyncService, GoogleAdsAdapter, MetaAdsAdapter};
use pulse_analytics::AnalyticsOrchestrator;
use pulse_cache::MetricsCacheLayer;
use pulse_core::campaign::{
    AdGroupSpec, AdPlatform, AdSpec, CampaignSpec, CampaignStatus, GoogleBiddingStrategy,
    GoogleCampaignConfig, GoogleChannelType, LivePerformance, MetaCampaignConfig, MetaObjective,
    ProviderCampaignId,
};
use pulse_core::config::AppConfig;
use pulse_core::metrics::{Metric, MetricType};
use pulse_store::MemoryMetricsStore;
use std::sync::Arc;
use tracing::{error, info, warn};
use transport::SimulatedTransport;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "campaign-pulse")]
#[command(about = "Cross-platform campaign sync and metrics analytics pipeline")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CAMPAIGN_PULSE__NODE_ID")]
    node_id: Option<String>,

    /// Ingestion chunk size (overrides config)
    #[arg(long, env = "CAMPAIGN_PULSE__INGEST__CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Seconds between live-performance polls
    #[arg(long, default_value_t = 30)]
    poll_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_pulse=info,pulse_analytics=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Campaign Pulse starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.ingest.chunk_size = chunk_size;
    }

    info!(
        node_id = %config.node_id,
        chunk_size = config.ingest.chunk_size,
        poll_secs = cli.poll_secs,
        "Configuration loaded"
    );

    let sync = Arc::new(CampaignSyncService::new(
        GoogleAdsAdapter::new(
            SimulatedTransport::new(AdPlatform::GoogleAds),
            config.google.clone(),
        ),
        MetaAdsAdapter::new(
            SimulatedTransport::new(AdPlatform::MetaAds),
            config.meta.clone(),
        ),
    ));

    let store = Arc::new(MemoryMetricsStore::new());
    let cache = Arc::new(MetricsCacheLayer::new(&config.cache));
    let orchestrator = Arc::new(AnalyticsOrchestrator::new(
        store,
        cache,
        config.ingest.clone(),
        config.store.clone(),
        config.cache.clone(),
    ));

    orchestrator.start_maintenance();

    let spec = demo_spec();
    let mut tracked: Vec<(AdPlatform, ProviderCampaignId)> = Vec::new();
    for platform in [AdPlatform::GoogleAds, AdPlatform::MetaAds] {
        match sync.create(platform, &spec).await {
            Ok(id) => tracked.push((platform, id)),
            Err(e) => error!(%platform, error = %e, "campaign creation failed"),
        }
    }

    info!(campaigns = tracked.len(), "Campaign Pulse is polling");

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(cli.poll_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                for (platform, provider_id) in &tracked {
                    match sync.live_performance(*platform, provider_id).await {
                        Ok(perf) => ingest_sample(&orchestrator, spec.id, &perf).await,
                        Err(e) => {
                            warn!(%platform, provider_id = %provider_id, error = %e, "performance poll failed");
                        }
                    }
                }
                report_pulse(&orchestrator, spec.id).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    orchestrator.shutdown().await;
    info!("Campaign Pulse stopped");
    Ok(())
}

/// Translate one delivery snapshot into stored metric samples, deriving
/// the ratio metrics the platforms do not report directly.
async fn ingest_sample(
    orchestrator: &AnalyticsOrchestrator<MemoryMetricsStore>,
    campaign_id: Uuid,
    perf: &LivePerformance,
) {
    let ts = Utc::now();
    let cost = perf.spend_micros as f64 / 1_000_000.0;
    let mut samples = vec![
        Metric::new(MetricType::Impressions, perf.impressions as f64, ts),
        Metric::new(MetricType::Clicks, perf.clicks as f64, ts),
        Metric::new(MetricType::Conversions, perf.conversions as f64, ts),
        Metric::new(MetricType::Cost, cost, ts),
    ];
    if perf.impressions > 0 {
        let ctr = perf.clicks as f64 / perf.impressions as f64 * 100.0;
        samples.push(Metric::new(MetricType::Ctr, ctr, ts));
        let cpm = cost / perf.impressions as f64 * 1_000.0;
        samples.push(Metric::new(MetricType::Cpm, cpm, ts));
    }
    if perf.clicks > 0 {
        samples.push(Metric::new(MetricType::Cpc, cost / perf.clicks as f64, ts));
    }

    if let Err(e) = orchestrator.track_metrics(campaign_id, samples).await {
        error!(campaign_id = %campaign_id, error = %e, "ingestion failed");
    }
}

async fn report_pulse(
    orchestrator: &AnalyticsOrchestrator<MemoryMetricsStore>,
    campaign_id: Uuid,
) {
    match orchestrator.get_realtime_metrics(campaign_id).await {
        Ok(snapshot) => {
            let clicks = snapshot
                .metrics
                .get(&MetricType::Clicks)
                .copied()
                .unwrap_or(0.0);
            info!(campaign_id = %campaign_id, clicks, "realtime pulse");
        }
        Err(e) => warn!(campaign_id = %campaign_id, error = %e, "realtime read failed"),
    }
}

fn demo_spec() -> CampaignSpec {
    CampaignSpec {
        id: Uuid::new_v4(),
        name: "Pulse demo".to_string(),
        status: CampaignStatus::Active,
        budget_micros: 500_000_000,
        start_date: Utc::now(),
        end_date: None,
        ad_groups: vec![AdGroupSpec {
            name: "Default group".to_string(),
            bid_micros: 1_000_000,
            ads: vec![AdSpec {
                headline: "Campaign Pulse".to_string(),
                description: "Simulated delivery".to_string(),
                final_url: "https://example.com".to_string(),
            }],
        }],
        google: Some(GoogleCampaignConfig {
            customer_id: "1".to_string(),
            advertising_channel_type: GoogleChannelType::Search,
            bidding_strategy: GoogleBiddingStrategy::MaximizeClicks,
        }),
        meta: Some(MetaCampaignConfig {
            ad_account_id: "1".to_string(),
            objective: MetaObjective::OutcomeTraffic,
            optimization_goal: "LINK_CLICKS".to_string(),
            billing_event: "IMPRESSIONS".to_string(),
            special_ad_categories: vec![],
        }),
    }
}
