//! Shared setup for tests that run against the simulated origin.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hlsbench_core::test_mocks::RecordingReporter;
use hlsbench_core::{BenchmarkConfig, BenchmarkEvent, BenchmarkSummary, Orchestrator};
use hlsbench_sim::{OriginBehavior, SimulatedOrigin, SimulatedOriginHandle};

pub const STREAM: &str = "live";

/// Starts an origin serving `STREAM` with the given behavior.
pub async fn spawn_origin(behavior: OriginBehavior) -> SimulatedOriginHandle {
    SimulatedOrigin::spawn(STREAM, behavior)
        .await
        .expect("simulated origin should bind to loopback")
}

/// Configuration pointed at `origin` with test-sized pacing.
pub fn quick_config(
    origin: &SimulatedOriginHandle,
    viewers: u32,
    duration: Duration,
) -> BenchmarkConfig {
    let mut config = BenchmarkConfig::new(origin.base_url(), STREAM);
    config.viewer_count = viewers;
    config.duration = duration;
    config.ramp.batch_delay = Duration::from_millis(50);
    config.playback.poll_interval = Duration::from_millis(200);
    config.playback.seed = Some(7);
    config.network.request_timeout = Duration::from_secs(2);
    config.shutdown_grace = Duration::from_secs(5);
    config
}

/// Runs one benchmark over HTTP, recording every event.
pub async fn run_recorded(config: BenchmarkConfig) -> (BenchmarkSummary, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = Orchestrator::over_http(config, reporter.clone())
        .expect("test configuration should be valid");
    let summary = orchestrator.run().await;
    (summary, reporter)
}

pub fn is_playlist_failure(event: &BenchmarkEvent) -> bool {
    matches!(event, BenchmarkEvent::PlaylistFailed { .. })
}

pub fn is_segment_failure(event: &BenchmarkEvent) -> bool {
    matches!(event, BenchmarkEvent::SegmentFailed { .. })
}

pub fn is_viewer_error(event: &BenchmarkEvent) -> bool {
    matches!(event, BenchmarkEvent::ViewerErrored { .. })
}
