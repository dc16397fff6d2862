use serde::Deserialize;

/// Root application configuration. Loaded from environment variables with
/// the prefix `CAMPAIGN_PULSE__` and optional TOML config files.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub google: PlatformClientConfig,
    #[serde(default)]
    pub meta: PlatformClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Metrics per persisted sub-batch.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Attempts for a failed batch insert (storage-contention guard).
    #[serde(default = "default_batch_retry_attempts")]
    pub batch_retry_attempts: u32,
    /// Fixed delay between batch insert attempts.
    #[serde(default = "default_batch_retry_delay_ms")]
    pub batch_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_report_ttl_secs")]
    pub report_ttl_secs: u64,
    #[serde(default = "default_realtime_ttl_secs")]
    pub realtime_ttl_secs: u64,
    /// Interval of the background eviction sweep.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

/// Per-platform settings for the resilient client and its circuit breaker.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformClientConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// TTL of the live performance snapshot cache.
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Minimum number of requests before the failure rate is evaluated.
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: u64,
    /// Failure-rate percentage above which the circuit opens.
    #[serde(default = "default_error_threshold_pct")]
    pub error_threshold_pct: u64,
    /// Seconds the circuit stays open before probing.
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
    /// Probe successes required in half-open to close the circuit.
    #[serde(default = "default_half_open_probes")]
    pub half_open_probes: u64,
    /// Seconds after which closed-state counters roll over.
    #[serde(default = "default_rolling_window_secs")]
    pub rolling_window_secs: u64,
}

fn default_node_id() -> String {
    "pulse-node-1".to_string()
}

fn default_chunk_size() -> usize {
    100
}

fn default_batch_retry_attempts() -> u32 {
    3
}

fn default_batch_retry_delay_ms() -> u64 {
    1000
}

fn default_report_ttl_secs() -> u64 {
    300
}

fn default_realtime_ttl_secs() -> u64 {
    60
}

fn default_maintenance_interval_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    32_000
}

fn default_jitter_ms() -> u64 {
    100
}

fn default_snapshot_ttl_secs() -> u64 {
    60
}

fn default_volume_threshold() -> u64 {
    10
}

fn default_error_threshold_pct() -> u64 {
    50
}

fn default_reset_timeout_secs() -> u64 {
    30
}

fn default_half_open_probes() -> u64 {
    3
}

fn default_rolling_window_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            ingest: IngestConfig::default(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            google: PlatformClientConfig::default(),
            meta: PlatformClientConfig::default(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch_retry_attempts: default_batch_retry_attempts(),
            batch_retry_delay_ms: default_batch_retry_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            report_ttl_secs: default_report_ttl_secs(),
            realtime_ttl_secs: default_realtime_ttl_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

impl Default for PlatformClientConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_ms: default_jitter_ms(),
            breaker: BreakerConfig::default(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            volume_threshold: default_volume_threshold(),
            error_threshold_pct: default_error_threshold_pct(),
            reset_timeout_secs: default_reset_timeout_secs(),
            half_open_probes: default_half_open_probes(),
            rolling_window_secs: default_rolling_window_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CAMPAIGN_PULSE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
