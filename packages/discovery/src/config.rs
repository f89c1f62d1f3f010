//! Configuration for the discovery core.
//!
//! All knobs live in one struct, loaded from environment variables with
//! sensible defaults. Components receive the config (or the slice of it
//! they need) explicitly from the composition root; there is no ambient
//! global state.

use std::time::Duration;

/// The query variants submitted per discovery when none are supplied.
pub const DEFAULT_PLACES_VARIANTS: [&str; 4] = [
    "food bank",
    "food pantry",
    "food distribution",
    "community food",
];

/// Tunables for the discovery orchestrator and its components.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Query strings submitted to the places provider per discovery.
    pub places_variants: Vec<String>,
    /// How long cached places results stay valid.
    pub places_cache_ttl: Duration,
    /// Decimal places used when rounding coordinates into the cache key.
    pub places_lat_lng_round: u32,
    /// Width of the global worker pool shared across jobs.
    pub worker_concurrency: usize,
    /// Budget for a single places search variant.
    pub places_timeout: Duration,
    /// Budget for scraping one URL (all sub-pages included).
    pub scrape_timeout: Duration,
    /// Budget for one extraction call.
    pub extract_timeout: Duration,
    /// Hard ceiling for an entire job; the orchestrator auto-cancels past it.
    pub job_timeout: Duration,
    /// Minimum interval between `progress` events on a job stream.
    pub progress_coalesce: Duration,
    /// Buffered events per subscriber before it is considered too slow
    /// and dropped from the stream.
    pub subscriber_buffer: usize,
    /// How long a running job may go with zero subscribers before the
    /// orchestrator cancels it.
    pub zero_subscriber_grace: Duration,
    /// How long a terminal job stays queryable before the registry
    /// garbage-collects it.
    pub job_retention: Duration,
    /// Per-caller `start_job` calls allowed per minute.
    pub start_jobs_per_minute: u32,
    /// Per-caller `subscribe` calls allowed per minute.
    pub subscribes_per_minute: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            places_variants: DEFAULT_PLACES_VARIANTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            places_cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            places_lat_lng_round: 3,
            worker_concurrency: 6,
            places_timeout: Duration::from_secs(15),
            scrape_timeout: Duration::from_secs(30),
            extract_timeout: Duration::from_secs(45),
            job_timeout: Duration::from_secs(600),
            progress_coalesce: Duration::from_millis(250),
            subscriber_buffer: 256,
            zero_subscriber_grace: Duration::from_secs(30),
            job_retention: Duration::from_secs(60),
            start_jobs_per_minute: 10,
            subscribes_per_minute: 60,
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from `DISCOVERY_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            places_variants: env_list("DISCOVERY_PLACES_VARIANTS")
                .unwrap_or(defaults.places_variants),
            places_cache_ttl: env_secs("DISCOVERY_PLACES_CACHE_TTL")
                .unwrap_or(defaults.places_cache_ttl),
            places_lat_lng_round: env_parse("DISCOVERY_PLACES_LAT_LNG_ROUND")
                .unwrap_or(defaults.places_lat_lng_round),
            worker_concurrency: env_parse("DISCOVERY_WORKER_CONCURRENCY")
                .unwrap_or(defaults.worker_concurrency),
            places_timeout: env_secs("DISCOVERY_PLACES_TIMEOUT")
                .unwrap_or(defaults.places_timeout),
            scrape_timeout: env_secs("DISCOVERY_SCRAPE_TIMEOUT")
                .unwrap_or(defaults.scrape_timeout),
            extract_timeout: env_secs("DISCOVERY_EXTRACT_TIMEOUT")
                .unwrap_or(defaults.extract_timeout),
            job_timeout: env_secs("DISCOVERY_JOB_TIMEOUT").unwrap_or(defaults.job_timeout),
            progress_coalesce: env_parse("DISCOVERY_PROGRESS_COALESCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_coalesce),
            subscriber_buffer: env_parse("DISCOVERY_SUBSCRIBER_BUFFER")
                .unwrap_or(defaults.subscriber_buffer),
            zero_subscriber_grace: env_secs("DISCOVERY_ZERO_SUBSCRIBER_GRACE")
                .unwrap_or(defaults.zero_subscriber_grace),
            job_retention: env_secs("DISCOVERY_JOB_RETENTION").unwrap_or(defaults.job_retention),
            start_jobs_per_minute: env_parse("DISCOVERY_START_JOBS_PER_MINUTE")
                .unwrap_or(defaults.start_jobs_per_minute),
            subscribes_per_minute: env_parse("DISCOVERY_SUBSCRIBES_PER_MINUTE")
                .unwrap_or(defaults.subscribes_per_minute),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
