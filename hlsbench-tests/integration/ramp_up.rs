//! Ramp-up pacing, cancellation and setup errors over real HTTP.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hlsbench_core::{
    BenchmarkConfig, BenchmarkError, BenchmarkEvent, Orchestrator, SilentReporter, ViewerOutcome,
    run_benchmark,
};
use hlsbench_core::test_mocks::RecordingReporter;
use hlsbench_sim::OriginBehavior;

use crate::fixtures::{quick_config, run_recorded, spawn_origin};

#[tokio::test]
async fn test_batches_launch_every_viewer_once() {
    let origin = spawn_origin(OriginBehavior::default()).await;
    let mut config = quick_config(&origin, 23, Duration::ZERO);
    config.ramp.batch_delay = Duration::from_millis(100);

    let started = Instant::now();
    let (summary, reporter) = run_recorded(config).await;
    let elapsed = started.elapsed();

    let launched: Vec<u32> = reporter
        .events()
        .iter()
        .filter_map(|event| match event {
            BenchmarkEvent::BatchLaunched { launched, .. } => Some(*launched),
            _ => None,
        })
        .collect();
    assert_eq!(launched, vec![10, 20, 23]);

    let ids: HashSet<u32> = summary.reports.iter().map(|report| report.viewer_id).collect();
    assert_eq!(ids, (0..23).collect::<HashSet<_>>());

    // Two pauses between three batches, none after the last.
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(1500));

    // Zero duration: no viewer makes a request.
    assert_eq!(summary.finished, 23);
    assert_eq!(origin.stats().playlist_requests(), 0);
    origin.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_trigger_cancels_running_viewers() {
    let origin = spawn_origin(OriginBehavior::default()).await;
    let config = quick_config(&origin, 4, Duration::from_secs(30));

    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = Orchestrator::over_http(config, reporter.clone()).unwrap();
    let trigger = orchestrator.shutdown_trigger();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.trigger();
    });

    let started = Instant::now();
    let summary = orchestrator.run().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(summary.cancelled, 4);
    assert!(
        summary
            .reports
            .iter()
            .all(|report| report.outcome == ViewerOutcome::Cancelled && report.iterations >= 1)
    );
    assert_eq!(
        reporter.count_where(|event| matches!(event, BenchmarkEvent::Cancelled { .. })),
        1
    );
    origin.shutdown().await;
}

#[tokio::test]
async fn test_slow_origin_within_timeout_is_not_cancelled() {
    let origin =
        spawn_origin(OriginBehavior::default().with_latency(Duration::from_millis(400))).await;
    let mut config = quick_config(&origin, 3, Duration::from_millis(100));
    config.network.request_timeout = Duration::from_secs(2);
    config.shutdown_grace = Duration::from_millis(100);

    let (summary, reporter) = run_recorded(config).await;

    assert_eq!(summary.finished, 3);
    assert_eq!(summary.cancelled, 0);
    assert!(
        !reporter
            .lines()
            .iter()
            .any(|line| line.starts_with("Stopping remaining viewers"))
    );
    assert_eq!(origin.stats().segment_requests(), 3);
    origin.shutdown().await;
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_before_launch() {
    let mut config = BenchmarkConfig::new("not a url", "live");
    config.viewer_count = 3;

    let error = run_benchmark(config, Arc::new(SilentReporter))
        .await
        .unwrap_err();
    assert!(matches!(error, BenchmarkError::Configuration { .. }));
    assert!(error.is_user_error());

    let mut config = BenchmarkConfig::new("http://127.0.0.1:1", "live");
    config.ramp.batch_size = 0;
    let error = run_benchmark(config, Arc::new(SilentReporter))
        .await
        .unwrap_err();
    assert!(matches!(error, BenchmarkError::Configuration { .. }));
}

#[tokio::test]
async fn test_trailing_slash_on_base_url() {
    let origin = spawn_origin(OriginBehavior::default()).await;
    let mut config = quick_config(&origin, 2, Duration::from_millis(100));
    config.target.base_url = format!("{}/", origin.base_url());

    let (summary, _) = run_recorded(config).await;

    assert_eq!(summary.finished, 2);
    assert_eq!(origin.stats().playlist_requests(), 2);
    assert_eq!(origin.stats().unknown_requests(), 0);
    origin.shutdown().await;
}
