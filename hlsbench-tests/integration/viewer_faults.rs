//! Fault injection against the simulated origin: soft segment misses, hard
//! playlist rejections, timeouts and unreachable servers.

use std::time::Duration;

use hlsbench_core::{BenchmarkConfig, ViewerOutcome};
use hlsbench_sim::OriginBehavior;

use crate::fixtures::{
    is_playlist_failure, is_segment_failure, is_viewer_error, quick_config, run_recorded,
    spawn_origin,
};

#[tokio::test]
async fn test_segment_errors_are_soft_failures() {
    let origin = spawn_origin(OriginBehavior::default().with_segment_status(503)).await;

    // Duration shorter than the poll interval: exactly one iteration each.
    let mut config = quick_config(&origin, 7, Duration::from_millis(500));
    config.playback.poll_interval = Duration::from_secs(1);

    let (summary, reporter) = run_recorded(config).await;

    assert_eq!(reporter.count_where(is_segment_failure), 7);
    assert_eq!(reporter.count_where(is_playlist_failure), 0);
    assert_eq!(reporter.count_where(is_viewer_error), 0);
    assert!(
        reporter
            .lines()
            .iter()
            .any(|line| line.ends_with("Failed to get segment: 503"))
    );

    assert_eq!(summary.finished, 7);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.segment_misses, 7);
    assert_eq!(origin.stats().playlist_requests(), 7);
    assert_eq!(origin.stats().segment_requests(), 7);
    origin.shutdown().await;
}

#[tokio::test]
async fn test_playlist_rejection_stops_each_viewer_once() {
    let origin = spawn_origin(OriginBehavior::default().with_playlist_status(404)).await;
    let config = quick_config(&origin, 5, Duration::from_secs(1));

    let (summary, reporter) = run_recorded(config).await;

    assert_eq!(reporter.count_where(is_playlist_failure), 5);
    assert_eq!(summary.rejected, 5);
    for report in &summary.reports {
        assert_eq!(report.outcome, ViewerOutcome::PlaylistRejected { status: 404 });
        assert_eq!(report.playlist_requests, 1);
    }
    assert_eq!(origin.stats().playlist_requests(), 5);
    assert_eq!(origin.stats().segment_requests(), 0);

    // Rejected viewers still let the benchmark complete.
    let lines = reporter.lines();
    assert!(lines.last().unwrap().starts_with("Benchmark completed after 1 seconds"));
    origin.shutdown().await;
}

#[tokio::test]
async fn test_empty_playlist_keeps_polling() {
    let origin = spawn_origin(OriginBehavior::default().with_segments(Vec::<String>::new())).await;
    let config = quick_config(&origin, 3, Duration::from_secs(1));

    let (summary, reporter) = run_recorded(config).await;

    assert_eq!(summary.finished, 3);
    assert_eq!(reporter.count_where(is_segment_failure), 0);
    assert_eq!(origin.stats().segment_requests(), 0);
    assert!(
        summary
            .reports
            .iter()
            .all(|report| report.playlist_requests >= 2 && report.segment_requests == 0)
    );
    origin.shutdown().await;
}

#[tokio::test]
async fn test_request_timeout_ends_viewer_with_error() {
    let origin =
        spawn_origin(OriginBehavior::default().with_latency(Duration::from_millis(1500))).await;
    let mut config = quick_config(&origin, 2, Duration::from_secs(1));
    config.network.request_timeout = Duration::from_millis(300);

    let (summary, reporter) = run_recorded(config).await;

    assert_eq!(summary.errored, 2);
    assert_eq!(reporter.count_where(is_viewer_error), 2);
    assert!(summary.reports.iter().all(|report| matches!(
        &report.outcome,
        ViewerOutcome::Errored { reason } if reason.contains("timed out")
    )));
    origin.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_server_errors_every_viewer() {
    // Bind and release a port so nothing is listening on it.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = BenchmarkConfig::new(format!("http://127.0.0.1:{port}"), "live");
    config.viewer_count = 4;
    config.duration = Duration::from_secs(1);
    config.ramp.batch_delay = Duration::from_millis(50);
    config.network.request_timeout = Duration::from_secs(2);

    let (summary, reporter) = run_recorded(config).await;

    assert_eq!(summary.errored, 4);
    assert_eq!(reporter.count_where(is_viewer_error), 4);
    assert!(
        reporter
            .lines()
            .iter()
            .any(|line| line.starts_with("Viewer 0 error: "))
    );
    assert!(reporter.lines().last().unwrap().starts_with("Benchmark completed"));
}
