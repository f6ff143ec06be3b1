//! Centralized configuration for hlsbench.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered through the viewer and orchestrator code.

use std::time::Duration;

use url::Url;

use crate::playlist::SegmentRef;
use crate::{BenchmarkError, Result};

/// Default base URL of the target server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8888";
/// Default number of simulated viewers.
pub const DEFAULT_VIEWER_COUNT: u32 = 100;
/// Default run length per viewer.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);

/// Central configuration for one benchmark run.
///
/// Groups related settings into logical sections. Treated as immutable once
/// the run starts; the orchestrator takes it by value.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub target: TargetConfig,
    /// Number of simulated viewers
    pub viewer_count: u32,
    /// Playback duration per viewer
    pub duration: Duration,
    pub ramp: RampConfig,
    pub playback: PlaybackConfig,
    pub network: NetworkConfig,
    /// Time allowed past the longest legitimate viewer overrun before
    /// remaining viewers are cancelled
    pub shutdown_grace: Duration,
}

/// Where the stream lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Base URL of the server, e.g. `http://localhost:8888`
    pub base_url: String,
    /// Stream identifier, resolves to `/hls/{stream}.m3u8`
    pub stream: String,
}

impl TargetConfig {
    /// URL of the stream's media playlist.
    pub fn playlist_url(&self) -> String {
        format!("{}/hls/{}.m3u8", self.trimmed_base(), self.stream)
    }

    /// URL of a segment referenced by the playlist.
    pub fn segment_url(&self, segment: &SegmentRef) -> String {
        format!("{}/hls/{}", self.trimmed_base(), segment.as_str())
    }

    fn trimmed_base(&self) -> &str {
        self.base_url.strip_suffix('/').unwrap_or(&self.base_url)
    }
}

/// Viewer ramp-up pacing.
#[derive(Debug, Clone)]
pub struct RampConfig {
    /// Viewers launched per batch
    pub batch_size: u32,
    /// Pause between consecutive batches
    pub batch_delay: Duration,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_millis(500),
        }
    }
}

/// Per-viewer playback cadence.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Delay between playlist refreshes
    pub poll_interval: Duration,
    /// Suffix identifying segment lines in a playlist
    pub segment_suffix: String,
    /// Seed for segment selection (None = nondeterministic)
    pub seed: Option<u64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            segment_suffix: ".ts".to_string(),
            seed: None,
        }
    }
}

/// HTTP client configuration for the shared connection pool.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Total timeout for a single request, body included
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: concat!("hlsbench/", env!("CARGO_PKG_VERSION")).to_string(),
            pool_max_idle_per_host: 32,
        }
    }
}

impl BenchmarkConfig {
    /// Creates a configuration with default population, duration and pacing.
    pub fn new(base_url: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            target: TargetConfig {
                base_url: base_url.into(),
                stream: stream.into(),
            },
            viewer_count: DEFAULT_VIEWER_COUNT,
            duration: DEFAULT_DURATION,
            ramp: RampConfig::default(),
            playback: PlaybackConfig::default(),
            network: NetworkConfig::default(),
            shutdown_grace: Duration::from_secs(30),
        }
    }

    /// Applies environment variable overrides.
    ///
    /// Values that fail to parse are ignored and the current setting kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(seconds) = env_parse::<u64>("HLSBENCH_REQUEST_TIMEOUT") {
            self.network.request_timeout = Duration::from_secs(seconds);
        }

        if let Some(seconds) = env_parse::<u64>("HLSBENCH_CONNECT_TIMEOUT") {
            self.network.connect_timeout = Duration::from_secs(seconds);
        }

        if let Some(size) = env_parse::<u32>("HLSBENCH_BATCH_SIZE") {
            self.ramp.batch_size = size;
        }

        if let Some(millis) = env_parse::<u64>("HLSBENCH_BATCH_DELAY_MS") {
            self.ramp.batch_delay = Duration::from_millis(millis);
        }

        if let Some(millis) = env_parse::<u64>("HLSBENCH_POLL_INTERVAL_MS") {
            self.playback.poll_interval = Duration::from_millis(millis);
        }

        if let Some(seed) = env_parse::<u64>("HLSBENCH_SEED") {
            self.playback.seed = Some(seed);
        }

        if let Some(seconds) = env_parse::<u64>("HLSBENCH_SHUTDOWN_GRACE") {
            self.shutdown_grace = Duration::from_secs(seconds);
        }

        self
    }

    /// Validates the configuration before a run.
    ///
    /// # Errors
    ///
    /// - `BenchmarkError::Configuration` - Base URL is not an absolute http(s)
    ///   URL, stream name is empty, batch size is zero or request timeout is zero
    pub fn validate(&self) -> Result<()> {
        let base_url = self.target.base_url.trim();
        if base_url.is_empty() {
            return Err(configuration_error("base URL is empty"));
        }

        let parsed = Url::parse(base_url)
            .map_err(|e| configuration_error(format!("invalid base URL '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(configuration_error(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        if self.target.stream.trim().is_empty() {
            return Err(configuration_error("stream name is empty"));
        }

        if self.ramp.batch_size == 0 {
            return Err(configuration_error("batch size must be at least 1"));
        }

        if self.network.request_timeout.is_zero() {
            return Err(configuration_error("request timeout must be non-zero"));
        }

        Ok(())
    }

    /// How long the barrier may stay open after all viewers are connected.
    ///
    /// A viewer can start its last iteration just before `duration` runs out.
    /// That iteration makes up to two requests, each bounded by the request
    /// timeout, and is followed by one poll interval. The grace period is
    /// counted from the end of that overrun.
    pub fn barrier_timeout(&self) -> Duration {
        self.duration
            .saturating_add(self.network.request_timeout.saturating_mul(2))
            .saturating_add(self.playback.poll_interval)
            .saturating_add(self.shutdown_grace)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn configuration_error(reason: impl Into<String>) -> BenchmarkError {
    BenchmarkError::Configuration {
        reason: reason.into(),
    }
}
