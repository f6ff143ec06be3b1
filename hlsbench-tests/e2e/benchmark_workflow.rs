//! Full benchmark runs with default pacing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hlsbench_core::test_mocks::RecordingReporter;
use hlsbench_core::{BenchmarkConfig, BenchmarkEvent, BenchmarkPhase, Orchestrator};
use hlsbench_sim::OriginBehavior;

use crate::fixtures::{STREAM, is_playlist_failure, is_segment_failure, spawn_origin};

#[tokio::test]
async fn test_healthy_origin_full_run() {
    let origin = spawn_origin(OriginBehavior::default()).await;

    let mut config = BenchmarkConfig::new(origin.base_url(), STREAM);
    config.viewer_count = 5;
    config.duration = Duration::from_secs(3);

    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = Orchestrator::over_http(config.clone(), reporter.clone()).unwrap();
    let phase = orchestrator.subscribe_phase();

    let started = Instant::now();
    let summary = orchestrator.run().await;
    let elapsed = started.elapsed();

    // Duration, plus at most one poll interval of overrun and request time.
    assert!(elapsed >= config.duration);
    assert!(elapsed < config.duration + config.playback.poll_interval + Duration::from_secs(1));
    assert_eq!(*phase.borrow(), BenchmarkPhase::Done);

    let lines = reporter.lines();
    assert_eq!(lines[0], "Starting benchmark with 5 viewers for 3 seconds");
    assert_eq!(lines[1], "Connecting viewers: 5/5");
    assert_eq!(
        lines
            .iter()
            .filter(|line| line.as_str() == "All 5 viewers connected. Running for 3 seconds...")
            .count(),
        1
    );
    assert_eq!(
        lines
            .iter()
            .filter(|line| line.starts_with("Benchmark completed after 3 seconds"))
            .count(),
        1
    );
    assert!(lines.last().unwrap().starts_with("Benchmark completed"));

    assert_eq!(reporter.count_where(is_playlist_failure), 0);
    assert_eq!(reporter.count_where(is_segment_failure), 0);
    assert_eq!(summary.finished, 5);
    assert_eq!(summary.failed(), 0);

    // Iterations at 0s and 2s for every viewer.
    for report in &summary.reports {
        assert_eq!(report.iterations, 2, "viewer {}", report.viewer_id);
        assert_eq!(report.segment_requests, 2);
        assert_eq!(report.segment_bytes, 2 * 188 * 64);
    }
    assert_eq!(origin.stats().playlist_requests(), 10);
    assert_eq!(origin.stats().segment_requests(), 10);
    origin.shutdown().await;
}

#[tokio::test]
async fn test_mixed_failures_do_not_stop_the_run() {
    let origin = spawn_origin(OriginBehavior::default().with_segment_status(500)).await;

    let mut config = BenchmarkConfig::new(origin.base_url(), STREAM);
    config.viewer_count = 12;
    config.duration = Duration::from_secs(1);
    config.ramp.batch_size = 5;

    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = Orchestrator::over_http(config, reporter.clone()).unwrap();
    let summary = orchestrator.run().await;

    let batches: Vec<(u32, u32)> = reporter
        .events()
        .iter()
        .filter_map(|event| match event {
            BenchmarkEvent::BatchLaunched { batch, launched, .. } => Some((*batch, *launched)),
            _ => None,
        })
        .collect();
    assert_eq!(batches, vec![(0, 5), (1, 10), (2, 12)]);

    assert_eq!(summary.viewers, 12);
    assert_eq!(summary.finished, 12);
    assert_eq!(reporter.count_where(is_segment_failure), 12);
    assert!(
        reporter
            .lines()
            .iter()
            .any(|line| line == "All 12 viewers connected. Running for 1 seconds...")
    );
    origin.shutdown().await;
}
