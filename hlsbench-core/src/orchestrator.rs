//! Benchmark orchestrator: ramp-up, barrier, completion.
//!
//! Viewer IDs `[0, viewer_count)` are launched in consecutive batches with
//! a pause between batches (none after the last one). Every launched task
//! is tracked for the whole run and joined at the end. A viewer's failure
//! only ends that viewer; the barrier completes once every task has.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::BenchmarkConfig;
use crate::reporter::{BenchmarkEvent, ProgressReporter};
use crate::shutdown::{ShutdownTrigger, shutdown_channel};
use crate::source::{HttpStreamSource, StreamSource, build_http_client};
use crate::viewer::{ViewerContext, ViewerOutcome, ViewerReport, run_viewer};
use crate::Result;

/// Lifecycle of a run. Transitions only move forward; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkPhase {
    /// Batches are being launched
    Ramping,
    /// All viewers launched, waiting on the barrier
    Running,
    /// Every viewer has terminated
    Done,
}

impl std::fmt::Display for BenchmarkPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchmarkPhase::Ramping => write!(f, "RAMPING"),
            BenchmarkPhase::Running => write!(f, "RUNNING"),
            BenchmarkPhase::Done => write!(f, "DONE"),
        }
    }
}

/// Identifier attached to a run's log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partition of viewer IDs into launch batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampPlan {
    viewer_count: u32,
    batch_size: u32,
}

impl RampPlan {
    /// A batch size of zero is treated as one.
    pub fn new(viewer_count: u32, batch_size: u32) -> Self {
        Self {
            viewer_count,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_count(&self) -> u32 {
        self.viewer_count.div_ceil(self.batch_size)
    }

    /// Pauses between batches. There is no pause after the final batch.
    pub fn pause_count(&self) -> u32 {
        self.batch_count().saturating_sub(1)
    }

    /// Consecutive ID ranges in launch order; only the last may be short.
    pub fn batches(&self) -> impl Iterator<Item = Range<u32>> {
        let Self {
            viewer_count,
            batch_size,
        } = *self;

        (0..self.batch_count()).map(move |index| {
            let start = index * batch_size;
            start..start.saturating_add(batch_size).min(viewer_count)
        })
    }
}

/// Completion tally for a whole run.
///
/// Counts outcomes only; no latency or throughput statistics.
#[derive(Debug, Clone)]
pub struct BenchmarkSummary {
    pub run_id: RunId,
    /// Viewers actually launched
    pub viewers: u32,
    pub finished: u32,
    pub rejected: u32,
    pub errored: u32,
    pub cancelled: u32,
    pub segment_misses: u64,
    pub elapsed: Duration,
    /// One report per launched viewer, in launch order
    pub reports: Vec<ViewerReport>,
}

impl BenchmarkSummary {
    fn new(run_id: RunId, reports: Vec<ViewerReport>, elapsed: Duration) -> Self {
        let mut summary = Self {
            run_id,
            viewers: reports.len() as u32,
            finished: 0,
            rejected: 0,
            errored: 0,
            cancelled: 0,
            segment_misses: 0,
            elapsed,
            reports: Vec::new(),
        };

        for report in &reports {
            summary.segment_misses += u64::from(report.segment_misses);
            match report.outcome {
                ViewerOutcome::Finished => summary.finished += 1,
                ViewerOutcome::PlaylistRejected { .. } => summary.rejected += 1,
                ViewerOutcome::Errored { .. } => summary.errored += 1,
                ViewerOutcome::Cancelled => summary.cancelled += 1,
            }
        }

        summary.reports = reports;
        summary
    }

    /// Viewers that stopped on a hard failure.
    pub fn failed(&self) -> u32 {
        self.rejected + self.errored
    }
}

enum Interrupt {
    Deadline,
    Shutdown,
}

/// Drives one benchmark run from ramp-up to completion.
pub struct Orchestrator {
    config: BenchmarkConfig,
    source: Arc<dyn StreamSource>,
    reporter: Arc<dyn ProgressReporter>,
    shutdown: ShutdownTrigger,
    phase: watch::Sender<BenchmarkPhase>,
    run_id: RunId,
}

impl Orchestrator {
    pub fn new(
        config: BenchmarkConfig,
        source: Arc<dyn StreamSource>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let (shutdown, _) = shutdown_channel();
        let (phase, _) = watch::channel(BenchmarkPhase::Ramping);

        Self {
            config,
            source,
            reporter,
            shutdown,
            phase,
            run_id: RunId::new(),
        }
    }

    /// Creates an orchestrator whose viewers share one pooled HTTP client.
    ///
    /// The client lives as long as the orchestrator and its viewer tasks and
    /// is released when the run ends, on every path.
    ///
    /// # Errors
    ///
    /// - `BenchmarkError::Configuration` - Configuration failed validation
    /// - `BenchmarkError::Setup` - HTTP client could not be built
    pub fn over_http(config: BenchmarkConfig, reporter: Arc<dyn ProgressReporter>) -> Result<Self> {
        config.validate()?;

        let client = build_http_client(&config.network)?;
        let source = HttpStreamSource::new(
            client,
            config.target.clone(),
            config.network.request_timeout,
        );

        Ok(Self::new(config, Arc::new(source), reporter))
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Trigger that stops ramp-up and cancels running viewers.
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<BenchmarkPhase> {
        self.phase.subscribe()
    }

    /// Runs the benchmark to completion.
    ///
    /// Never fails: viewer errors are reported and counted in the summary.
    pub async fn run(self) -> BenchmarkSummary {
        let span = tracing::info_span!("benchmark", run_id = %self.run_id);
        self.execute().instrument(span).await
    }

    async fn execute(self) -> BenchmarkSummary {
        let started = Instant::now();
        let viewers = self.config.viewer_count;
        let duration = self.config.duration;

        tracing::info!(
            viewers,
            duration_secs = duration.as_secs(),
            target = %self.config.target.playlist_url(),
            "Starting benchmark"
        );
        self.reporter.report(BenchmarkEvent::Started { viewers, duration });
        self.enter_phase(BenchmarkPhase::Ramping);

        let handles = self.ramp_up().await;

        self.enter_phase(BenchmarkPhase::Running);
        if handles.len() as u32 == viewers {
            self.reporter.report(BenchmarkEvent::AllConnected { viewers, duration });
        }

        let reports = self.await_viewers(handles).await;
        let summary = BenchmarkSummary::new(self.run_id, reports, started.elapsed());

        self.enter_phase(BenchmarkPhase::Done);
        tracing::info!(
            finished = summary.finished,
            rejected = summary.rejected,
            errored = summary.errored,
            cancelled = summary.cancelled,
            segment_misses = summary.segment_misses,
            "Benchmark completed"
        );
        self.reporter.report(BenchmarkEvent::Completed {
            duration,
            elapsed: summary.elapsed,
            finished: summary.finished,
            failed: summary.failed(),
            cancelled: summary.cancelled,
        });

        summary
    }

    async fn ramp_up(&self) -> Vec<(u32, JoinHandle<ViewerReport>)> {
        let plan = RampPlan::new(self.config.viewer_count, self.config.ramp.batch_size);
        let total = self.config.viewer_count;
        let mut shutdown = self.shutdown.subscribe();

        let ctx = ViewerContext {
            source: Arc::clone(&self.source),
            reporter: Arc::clone(&self.reporter),
            playback: Arc::new(self.config.playback.clone()),
            shutdown: self.shutdown.subscribe(),
        };

        let mut handles = Vec::new();
        for (index, batch) in plan.batches().enumerate() {
            if shutdown.is_triggered() {
                tracing::info!(launched = handles.len(), "Ramp-up stopped by shutdown");
                break;
            }

            handles.reserve(batch.len());
            for viewer_id in batch {
                let viewer = run_viewer(ctx.clone(), viewer_id, self.config.duration);
                handles.push((viewer_id, tokio::spawn(viewer.in_current_span())));
            }

            let batch = index as u32;
            tracing::debug!(batch, launched = handles.len(), total, "Batch launched");
            self.reporter.report(BenchmarkEvent::BatchLaunched {
                batch,
                launched: handles.len() as u32,
                total,
            });

            if batch + 1 < plan.batch_count() {
                let interrupted = tokio::select! {
                    _ = sleep(self.config.ramp.batch_delay) => false,
                    _ = shutdown.triggered() => true,
                };
                if interrupted {
                    tracing::info!(launched = handles.len(), "Ramp-up stopped by shutdown");
                    break;
                }
            }
        }

        handles
    }

    async fn await_viewers(
        &self,
        handles: Vec<(u32, JoinHandle<ViewerReport>)>,
    ) -> Vec<ViewerReport> {
        let (ids, tasks): (Vec<u32>, Vec<_>) = handles.into_iter().unzip();

        let mut barrier = std::pin::pin!(join_all(tasks));
        let mut shutdown = self.shutdown.subscribe();
        let deadline = sleep(self.config.barrier_timeout());

        let interrupted = tokio::select! {
            results = &mut barrier => Ok(results),
            _ = deadline => Err(Interrupt::Deadline),
            _ = shutdown.triggered() => Err(Interrupt::Shutdown),
        };

        let results = match interrupted {
            Ok(results) => results,
            Err(interrupt) => {
                let reason = match interrupt {
                    Interrupt::Deadline => format!(
                        "viewers still running {}s after all connected",
                        self.config.barrier_timeout().as_secs()
                    ),
                    Interrupt::Shutdown => "shutdown requested".to_string(),
                };
                tracing::warn!(%reason, "Cancelling remaining viewers");
                self.reporter.report(BenchmarkEvent::Cancelled { reason });
                self.shutdown.trigger();
                barrier.await
            }
        };

        ids.into_iter()
            .zip(results)
            .map(|(viewer_id, result)| match result {
                Ok(report) => report,
                Err(join_error) => {
                    let reason = format!("viewer task failed: {join_error}");
                    tracing::error!(viewer_id, %reason, "Viewer task did not complete");
                    self.reporter.report(BenchmarkEvent::ViewerErrored {
                        viewer_id,
                        reason: reason.clone(),
                    });
                    ViewerReport::aborted(viewer_id, reason)
                }
            })
            .collect()
    }

    fn enter_phase(&self, phase: BenchmarkPhase) {
        self.phase.send_replace(phase);
        tracing::debug!(%phase, "Entering phase");
        self.reporter.report(BenchmarkEvent::PhaseChanged(phase));
    }
}

/// Runs a benchmark against a live server with a shared pooled client.
///
/// # Errors
///
/// - `BenchmarkError::Configuration` - Configuration failed validation
/// - `BenchmarkError::Setup` - HTTP client could not be built
pub async fn run_benchmark(
    config: BenchmarkConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<BenchmarkSummary> {
    let orchestrator = Orchestrator::over_http(config, reporter)?;
    Ok(orchestrator.run().await)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;
    use crate::ViewerError;
    use crate::playlist::SegmentRef;
    use crate::source::Fetched;
    use crate::test_mocks::{RecordingReporter, ScriptedSource};

    const TWO_SEGMENTS: &str = "#EXTM3U\n#EXTINF:2.0,\nlive-1.ts\n#EXTINF:2.0,\nlive-2.ts\n";

    fn test_config(viewers: u32, duration: Duration) -> BenchmarkConfig {
        let mut config = BenchmarkConfig::new("http://127.0.0.1:8888", "live");
        config.viewer_count = viewers;
        config.duration = duration;
        config.playback.seed = Some(1);
        config
    }

    fn orchestrator(
        config: BenchmarkConfig,
        source: Arc<ScriptedSource>,
        reporter: Arc<RecordingReporter>,
    ) -> Orchestrator {
        Orchestrator::new(config, source, reporter)
    }

    fn launched_counts(reporter: &RecordingReporter) -> Vec<u32> {
        reporter
            .events()
            .into_iter()
            .filter_map(|event| match event {
                BenchmarkEvent::BatchLaunched { launched, .. } => Some(launched),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ramp_plan_partitions_23_viewers() {
        let plan = RampPlan::new(23, 10);
        let batches: Vec<_> = plan.batches().collect();

        assert_eq!(batches, vec![0..10, 10..20, 20..23]);
        assert_eq!(plan.batch_count(), 3);
        assert_eq!(plan.pause_count(), 2);
    }

    #[test]
    fn test_ramp_plan_edge_sizes() {
        assert_eq!(RampPlan::new(0, 10).batches().count(), 0);
        assert_eq!(RampPlan::new(0, 10).pause_count(), 0);
        assert_eq!(RampPlan::new(10, 10).batches().collect::<Vec<_>>(), vec![0..10]);
        assert_eq!(RampPlan::new(3, 0).batch_count(), 3);
    }

    proptest! {
        #[test]
        fn prop_ramp_plan_covers_every_id_once(viewers in 0u32..500, batch_size in 1u32..64) {
            let plan = RampPlan::new(viewers, batch_size);
            let batches: Vec<_> = plan.batches().collect();

            let ids: Vec<u32> = batches.iter().cloned().flatten().collect();
            prop_assert_eq!(ids, (0..viewers).collect::<Vec<_>>());

            if let Some((last, full)) = batches.split_last() {
                prop_assert!(full.iter().all(|batch| batch.len() as u32 == batch_size));
                prop_assert!(!last.is_empty() && last.len() as u32 <= batch_size);
            }
            prop_assert_eq!(plan.pause_count(), (batches.len() as u32).saturating_sub(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_every_viewer_id_exactly_once() {
        let source = Arc::new(ScriptedSource::new(TWO_SEGMENTS));
        let reporter = Arc::new(RecordingReporter::new());

        let summary = orchestrator(test_config(23, Duration::ZERO), source, reporter.clone())
            .run()
            .await;

        let ids: Vec<u32> = summary.reports.iter().map(|r| r.viewer_id).collect();
        assert_eq!(ids, (0..23).collect::<Vec<_>>());
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 23);
        assert_eq!(summary.viewers, 23);
        assert_eq!(summary.finished, 23);
        assert_eq!(launched_counts(&reporter), vec![10, 20, 23]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_after_final_batch() {
        let source = Arc::new(ScriptedSource::new(TWO_SEGMENTS));
        let reporter = Arc::new(RecordingReporter::new());

        let summary = orchestrator(test_config(23, Duration::ZERO), source, reporter)
            .run()
            .await;

        // Two pauses of 500ms; zero-duration viewers finish instantly.
        assert!(summary.elapsed >= Duration::from_millis(1000));
        assert!(summary.elapsed < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_viewers_passes_through_all_phases() {
        let source = Arc::new(ScriptedSource::new(TWO_SEGMENTS));
        let reporter = Arc::new(RecordingReporter::new());

        let orchestrator = orchestrator(
            test_config(0, Duration::from_secs(60)),
            source.clone(),
            reporter.clone(),
        );
        let phase = orchestrator.subscribe_phase();
        let summary = orchestrator.run().await;

        assert_eq!(summary.viewers, 0);
        assert!(summary.reports.is_empty());
        assert_eq!(*phase.borrow(), BenchmarkPhase::Done);
        assert_eq!(source.playlist_requests(), 0);

        let events = reporter.events();
        assert_eq!(
            events,
            vec![
                BenchmarkEvent::Started {
                    viewers: 0,
                    duration: Duration::from_secs(60)
                },
                BenchmarkEvent::PhaseChanged(BenchmarkPhase::Ramping),
                BenchmarkEvent::PhaseChanged(BenchmarkPhase::Running),
                BenchmarkEvent::AllConnected {
                    viewers: 0,
                    duration: Duration::from_secs(60)
                },
                BenchmarkEvent::PhaseChanged(BenchmarkPhase::Done),
                BenchmarkEvent::Completed {
                    duration: Duration::from_secs(60),
                    elapsed: summary.elapsed,
                    finished: 0,
                    failed: 0,
                    cancelled: 0,
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_lines_in_order() {
        let source = Arc::new(ScriptedSource::new(TWO_SEGMENTS));
        let reporter = Arc::new(RecordingReporter::new());

        orchestrator(test_config(12, Duration::from_secs(3)), source, reporter.clone())
            .run()
            .await;

        let lines = reporter.lines();
        assert_eq!(lines[0], "Starting benchmark with 12 viewers for 3 seconds");
        assert_eq!(lines[1], "Connecting viewers: 10/12");
        assert_eq!(lines[2], "Connecting viewers: 12/12");
        assert_eq!(lines[3], "All 12 viewers connected. Running for 3 seconds...");
        assert!(lines[4].starts_with("Benchmark completed after 3 seconds"));
        assert_eq!(lines.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_viewers_do_not_fail_barrier() {
        let source = Arc::new(ScriptedSource::new(TWO_SEGMENTS).with_playlist_status(503));
        let reporter = Arc::new(RecordingReporter::new());

        let summary = orchestrator(
            test_config(15, Duration::from_secs(30)),
            source.clone(),
            reporter.clone(),
        )
        .run()
        .await;

        assert_eq!(summary.rejected, 15);
        assert_eq!(summary.failed(), 15);
        assert_eq!(source.playlist_requests(), 15);
        assert_eq!(
            reporter.count_where(|e| matches!(
                e,
                BenchmarkEvent::PlaylistFailed { status: 503, .. }
            )),
            15
        );
        assert!(matches!(
            reporter.events().last(),
            Some(BenchmarkEvent::Completed { failed: 15, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_stuck_viewers() {
        let source = Arc::new(ScriptedSource::new(TWO_SEGMENTS).with_hanging_playlist());
        let reporter = Arc::new(RecordingReporter::new());

        let mut config = test_config(4, Duration::from_secs(2));
        config.network.request_timeout = Duration::from_secs(1);
        config.playback.poll_interval = Duration::from_secs(1);
        config.shutdown_grace = Duration::from_secs(5);

        let summary = orchestrator(config, source, reporter.clone()).run().await;

        // 2s + 2 * 1s + 1s + 5s
        assert_eq!(summary.cancelled, 4);
        assert!(summary.elapsed >= Duration::from_secs(10));
        assert!(summary.elapsed < Duration::from_secs(11));
        assert_eq!(
            reporter.count_where(|e| matches!(e, BenchmarkEvent::Cancelled { .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_requests_within_timeout_are_not_cancelled() {
        let source =
            Arc::new(ScriptedSource::new(TWO_SEGMENTS).with_latency(Duration::from_secs(40)));
        let reporter = Arc::new(RecordingReporter::new());

        let mut config = test_config(3, Duration::from_secs(1));
        config.network.request_timeout = Duration::from_secs(60);
        assert!(config.validate().is_ok());

        let summary = orchestrator(config, source.clone(), reporter.clone())
            .run()
            .await;

        // One iteration: 40s playlist, 40s segment, 2s poll interval.
        assert_eq!(summary.finished, 3);
        assert_eq!(summary.cancelled, 0);
        assert!(summary.elapsed >= Duration::from_secs(82));
        assert_eq!(source.segment_requests(), 3);
        assert_eq!(
            reporter.count_where(|e| matches!(e, BenchmarkEvent::Cancelled { .. })),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_ramp_stops_launching() {
        let source = Arc::new(ScriptedSource::new(TWO_SEGMENTS));
        let reporter = Arc::new(RecordingReporter::new());

        let orchestrator = orchestrator(
            test_config(30, Duration::from_secs(60)),
            source,
            reporter.clone(),
        );
        let trigger = orchestrator.shutdown_trigger();
        let run = tokio::spawn(orchestrator.run());

        // Batches go out at 0ms and 500ms; the third would be at 1000ms.
        sleep(Duration::from_millis(600)).await;
        trigger.trigger();

        let summary = run.await.unwrap();
        assert_eq!(summary.viewers, 20);
        assert_eq!(summary.cancelled, 20);
        assert_eq!(launched_counts(&reporter), vec![10, 20]);
        assert_eq!(
            reporter.count_where(|e| matches!(e, BenchmarkEvent::AllConnected { .. })),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_population_is_not_preallocated() {
        let source = Arc::new(ScriptedSource::new(TWO_SEGMENTS));
        let reporter = Arc::new(RecordingReporter::new());

        let orchestrator = orchestrator(
            test_config(u32::MAX, Duration::from_secs(60)),
            source,
            reporter.clone(),
        );
        orchestrator.shutdown_trigger().trigger();
        let summary = orchestrator.run().await;

        assert_eq!(summary.viewers, 0);
        assert!(launched_counts(&reporter).is_empty());
        assert!(matches!(
            reporter.events().first(),
            Some(BenchmarkEvent::Started {
                viewers: u32::MAX,
                ..
            })
        ));
    }

    struct PanickingSource;

    #[async_trait]
    impl StreamSource for PanickingSource {
        async fn fetch_playlist(&self) -> std::result::Result<Fetched<String>, ViewerError> {
            panic!("playlist handler exploded");
        }

        async fn fetch_segment(
            &self,
            _segment: &SegmentRef,
        ) -> std::result::Result<Fetched<u64>, ViewerError> {
            Ok(Fetched::Status(500))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_viewer_is_isolated() {
        let reporter = Arc::new(RecordingReporter::new());
        let summary = Orchestrator::new(
            test_config(3, Duration::from_secs(10)),
            Arc::new(PanickingSource),
            reporter.clone(),
        )
        .run()
        .await;

        assert_eq!(summary.viewers, 3);
        assert_eq!(summary.errored, 3);
        assert_eq!(
            reporter.count_where(|e| matches!(e, BenchmarkEvent::ViewerErrored { .. })),
            3
        );
    }

    #[test]
    fn test_over_http_rejects_invalid_config() {
        let config = BenchmarkConfig::new("http://localhost:8888", "");
        let reporter = Arc::new(RecordingReporter::new());

        let result = Orchestrator::over_http(config, reporter);
        assert!(matches!(
            result,
            Err(crate::BenchmarkError::Configuration { .. })
        ));
    }
}
