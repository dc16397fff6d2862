//! Platform-facing sync service. Holds one adapter per external platform
//! and routes each operation by the requested platform, so callers never
//! touch an adapter type directly.

use crate::google::GoogleAdsAdapter;
use crate::meta::MetaAdsAdapter;
use crate::{PlatformAdapter, SyncResult};
use pulse_core::campaign::{
    AdPlatform, CampaignSpec, LivePerformance, ProviderCampaignId, RemoteCampaign,
};
use pulse_core::error::PulseResult;
use pulse_resilience::PlatformTransport;
use tracing::info;

pub struct CampaignSyncService<TG: PlatformTransport, TM: PlatformTransport> {
    google: GoogleAdsAdapter<TG>,
    meta: MetaAdsAdapter<TM>,
}

impl<TG: PlatformTransport, TM: PlatformTransport> CampaignSyncService<TG, TM> {
    pub fn new(google: GoogleAdsAdapter<TG>, meta: MetaAdsAdapter<TM>) -> Self {
        Self { google, meta }
    }

    pub fn validate(&self, platform: AdPlatform, spec: &CampaignSpec) -> PulseResult<()> {
        match platform {
            AdPlatform::GoogleAds => self.google.validate(spec),
            AdPlatform::MetaAds => self.meta.validate(spec),
        }
    }

    pub async fn create(
        &self,
        platform: AdPlatform,
        spec: &CampaignSpec,
    ) -> SyncResult<ProviderCampaignId> {
        let id = match platform {
            AdPlatform::GoogleAds => self.google.create(spec).await?,
            AdPlatform::MetaAds => self.meta.create(spec).await?,
        };
        metrics::counter!("sync.campaigns_created", "platform" => platform.as_str()).increment(1);
        info!(campaign = %spec.id, %platform, provider_id = %id, "campaign created");
        Ok(id)
    }

    pub async fn update(
        &self,
        platform: AdPlatform,
        id: &ProviderCampaignId,
        spec: &CampaignSpec,
    ) -> SyncResult<()> {
        match platform {
            AdPlatform::GoogleAds => self.google.update(id, spec).await?,
            AdPlatform::MetaAds => self.meta.update(id, spec).await?,
        }
        info!(campaign = %spec.id, %platform, provider_id = %id, "campaign updated");
        Ok(())
    }

    pub async fn get(
        &self,
        platform: AdPlatform,
        id: &ProviderCampaignId,
    ) -> SyncResult<RemoteCampaign> {
        match platform {
            AdPlatform::GoogleAds => self.google.get(id).await,
            AdPlatform::MetaAds => self.meta.get(id).await,
        }
    }

    pub async fn delete(&self, platform: AdPlatform, id: &ProviderCampaignId) -> SyncResult<()> {
        match platform {
            AdPlatform::GoogleAds => self.google.delete(id).await?,
            AdPlatform::MetaAds => self.meta.delete(id).await?,
        }
        info!(%platform, provider_id = %id, "campaign deleted");
        Ok(())
    }

    pub async fn pause(&self, platform: AdPlatform, id: &ProviderCampaignId) -> SyncResult<()> {
        match platform {
            AdPlatform::GoogleAds => self.google.pause(id).await?,
            AdPlatform::MetaAds => self.meta.pause(id).await?,
        }
        info!(%platform, provider_id = %id, "campaign paused");
        Ok(())
    }

    pub async fn live_performance(
        &self,
        platform: AdPlatform,
        id: &ProviderCampaignId,
    ) -> SyncResult<LivePerformance> {
        match platform {
            AdPlatform::GoogleAds => self.google.live_performance(id).await,
            AdPlatform::MetaAds => self.meta.live_performance(id).await,
        }
    }
}
