//! Command-line arguments and their mapping onto `BenchmarkConfig`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hlsbench_core::config::{
    BenchmarkConfig, DEFAULT_BASE_URL, DEFAULT_DURATION, DEFAULT_VIEWER_COUNT,
};
use hlsbench_core::tracing_setup::CliLogLevel;

/// Simulates many concurrent viewers playing an HLS stream.
#[derive(Debug, Parser)]
#[command(name = "hlsbench")]
#[command(about = "Benchmark an HLS streaming server with simulated viewers")]
#[command(version)]
pub struct Cli {
    /// Base URL of the target server
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub url: String,

    /// Stream name to connect to
    #[arg(long)]
    pub stream: String,

    /// Number of simulated viewers
    #[arg(long, default_value_t = DEFAULT_VIEWER_COUNT)]
    pub viewers: u32,

    /// Duration in seconds each viewer keeps playing
    #[arg(long, default_value_t = DEFAULT_DURATION.as_secs())]
    pub duration: u64,

    /// Viewers launched per ramp-up batch
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Pause between ramp-up batches, in milliseconds
    #[arg(long)]
    pub batch_delay_ms: Option<u64>,

    /// Delay between playlist refreshes per viewer, in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Seed for segment selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Console log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Warn)]
    pub log_level: CliLogLevel,

    /// Directory for the full trace log
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,

    /// Serve a simulated origin in-process and benchmark it instead of --url
    #[arg(long)]
    pub simulate: bool,
}

impl Cli {
    /// Builds the run configuration: defaults, then environment, then flags.
    pub fn to_config(&self, base_url: String) -> BenchmarkConfig {
        let mut config = BenchmarkConfig::new(base_url, self.stream.clone()).with_env_overrides();
        config.viewer_count = self.viewers;
        config.duration = Duration::from_secs(self.duration);

        if let Some(size) = self.batch_size {
            config.ramp.batch_size = size;
        }
        if let Some(millis) = self.batch_delay_ms {
            config.ramp.batch_delay = Duration::from_millis(millis);
        }
        if let Some(millis) = self.poll_interval_ms {
            config.playback.poll_interval = Duration::from_millis(millis);
        }
        if let Some(seconds) = self.request_timeout {
            config.network.request_timeout = Duration::from_secs(seconds);
        }
        if let Some(seed) = self.seed {
            config.playback.seed = Some(seed);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["hlsbench", "--stream", "live"]).unwrap();

        assert_eq!(cli.url, "http://localhost:8888");
        assert_eq!(cli.viewers, 100);
        assert_eq!(cli.duration, 60);
        assert_eq!(cli.log_level, CliLogLevel::Warn);
        assert!(!cli.simulate);

        let config = cli.to_config(cli.url.clone());
        assert_eq!(config.target.playlist_url(), "http://localhost:8888/hls/live.m3u8");
        assert_eq!(config.viewer_count, 100);
        assert_eq!(config.duration, Duration::from_secs(60));
    }

    #[test]
    fn test_stream_is_required() {
        assert!(Cli::try_parse_from(["hlsbench"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "hlsbench",
            "--url",
            "http://origin:8080",
            "--stream",
            "cam",
            "--viewers",
            "23",
            "--duration",
            "5",
            "--batch-size",
            "4",
            "--batch-delay-ms",
            "50",
            "--poll-interval-ms",
            "250",
            "--request-timeout",
            "3",
            "--seed",
            "9",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let config = cli.to_config(cli.url.clone());
        assert_eq!(config.target.base_url, "http://origin:8080");
        assert_eq!(config.target.stream, "cam");
        assert_eq!(config.viewer_count, 23);
        assert_eq!(config.duration, Duration::from_secs(5));
        assert_eq!(config.ramp.batch_size, 4);
        assert_eq!(config.ramp.batch_delay, Duration::from_millis(50));
        assert_eq!(config.playback.poll_interval, Duration::from_millis(250));
        assert_eq!(config.network.request_timeout, Duration::from_secs(3));
        assert_eq!(config.playback.seed, Some(9));
        assert_eq!(cli.log_level, CliLogLevel::Debug);
    }

    #[test]
    fn test_negative_viewers_rejected() {
        assert!(Cli::try_parse_from(["hlsbench", "--stream", "live", "--viewers", "-1"]).is_err());
    }
}
