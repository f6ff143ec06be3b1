//! Viewer simulator: one simulated viewer's playback loop.
//!
//! Each iteration refreshes the playlist, fetches one randomly chosen
//! segment, then waits out the poll interval. The end-time check happens
//! before each iteration, never mid-iteration, so a viewer can overrun its
//! nominal duration by up to one iteration plus the poll interval.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::time::{Instant, sleep};
use tracing::Instrument;

use crate::ViewerError;
use crate::config::PlaybackConfig;
use crate::playlist::MediaPlaylist;
use crate::reporter::{BenchmarkEvent, ProgressReporter};
use crate::shutdown::Shutdown;
use crate::source::{Fetched, StreamSource};

/// Everything a viewer shares with the rest of the run. Read-only.
#[derive(Clone)]
pub struct ViewerContext {
    pub source: Arc<dyn StreamSource>,
    pub reporter: Arc<dyn ProgressReporter>,
    pub playback: Arc<PlaybackConfig>,
    pub shutdown: Shutdown,
}

/// How a viewer's loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerOutcome {
    /// Duration elapsed
    Finished,
    /// Playlist request answered with a non-success status
    PlaylistRejected { status: u16 },
    /// Transport error, timeout or unreadable body
    Errored { reason: String },
    /// Run-wide shutdown was triggered
    Cancelled,
}

impl ViewerOutcome {
    /// Checks if the viewer stopped because of a hard failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ViewerOutcome::PlaylistRejected { .. } | ViewerOutcome::Errored { .. }
        )
    }
}

/// Per-viewer tally, returned when the loop exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerReport {
    pub viewer_id: u32,
    /// Iterations started
    pub iterations: u32,
    pub playlist_requests: u32,
    pub segment_requests: u32,
    /// Segment requests answered with a non-success status
    pub segment_misses: u32,
    /// Segment bytes drained
    pub segment_bytes: u64,
    pub outcome: ViewerOutcome,
}

impl ViewerReport {
    fn new(viewer_id: u32) -> Self {
        Self {
            viewer_id,
            iterations: 0,
            playlist_requests: 0,
            segment_requests: 0,
            segment_misses: 0,
            segment_bytes: 0,
            outcome: ViewerOutcome::Finished,
        }
    }

    /// Report for a viewer task that died without producing one.
    pub(crate) fn aborted(viewer_id: u32, reason: String) -> Self {
        Self {
            outcome: ViewerOutcome::Errored { reason },
            ..Self::new(viewer_id)
        }
    }
}

/// Runs one viewer until `duration` elapses, a hard failure occurs, or the
/// run is shut down.
///
/// Failures are reported through the context's reporter and never returned
/// as errors; the outcome is recorded in the report.
pub async fn run_viewer(ctx: ViewerContext, viewer_id: u32, duration: Duration) -> ViewerReport {
    let span = tracing::debug_span!("viewer", viewer_id);
    playback_loop(ctx, viewer_id, duration).instrument(span).await
}

async fn playback_loop(ctx: ViewerContext, viewer_id: u32, duration: Duration) -> ViewerReport {
    let ViewerContext {
        source,
        reporter,
        playback,
        mut shutdown,
    } = ctx;

    let mut report = ViewerReport::new(viewer_id);
    let mut rng = viewer_rng(playback.seed, viewer_id);
    let end_time = Instant::now() + duration;

    while Instant::now() < end_time {
        if shutdown.is_triggered() {
            report.outcome = ViewerOutcome::Cancelled;
            return report;
        }

        report.iterations += 1;
        let step = tokio::select! {
            result = play_iteration(
                source.as_ref(),
                reporter.as_ref(),
                &playback.segment_suffix,
                &mut rng,
                &mut report,
            ) => Some(result),
            _ = shutdown.triggered() => None,
        };

        match step {
            None => {
                report.outcome = ViewerOutcome::Cancelled;
                return report;
            }
            Some(Ok(())) => {}
            Some(Err(ViewerError::PlaylistRejected { status })) => {
                tracing::debug!(viewer_id, status, "Playlist rejected, viewer stopping");
                reporter.report(BenchmarkEvent::PlaylistFailed { viewer_id, status });
                report.outcome = ViewerOutcome::PlaylistRejected { status };
                return report;
            }
            Some(Err(error)) => {
                let reason = error.to_string();
                tracing::debug!(viewer_id, error = %reason, "Viewer stopping on error");
                reporter.report(BenchmarkEvent::ViewerErrored {
                    viewer_id,
                    reason: reason.clone(),
                });
                report.outcome = ViewerOutcome::Errored { reason };
                return report;
            }
        }

        let cancelled = tokio::select! {
            _ = sleep(playback.poll_interval) => false,
            _ = shutdown.triggered() => true,
        };
        if cancelled {
            report.outcome = ViewerOutcome::Cancelled;
            return report;
        }
    }

    tracing::trace!(viewer_id, iterations = report.iterations, "Viewer finished");
    report
}

async fn play_iteration(
    source: &dyn StreamSource,
    reporter: &dyn ProgressReporter,
    segment_suffix: &str,
    rng: &mut ChaCha8Rng,
    report: &mut ViewerReport,
) -> Result<(), ViewerError> {
    let viewer_id = report.viewer_id;

    report.playlist_requests += 1;
    let body = match source.fetch_playlist().await? {
        Fetched::Success(body) => body,
        Fetched::Status(status) => return Err(ViewerError::PlaylistRejected { status }),
    };

    let playlist = MediaPlaylist::parse(&body, segment_suffix);
    let Some(segment) = playlist.choose_segment(rng).cloned() else {
        tracing::trace!(viewer_id, "Playlist lists no segments");
        return Ok(());
    };

    report.segment_requests += 1;
    match source.fetch_segment(&segment).await? {
        Fetched::Success(bytes) => {
            report.segment_bytes += bytes;
        }
        Fetched::Status(status) => {
            tracing::debug!(viewer_id, status, %segment, "Segment fetch missed");
            report.segment_misses += 1;
            reporter.report(BenchmarkEvent::SegmentFailed { viewer_id, status });
        }
    }

    Ok(())
}

fn viewer_rng(seed: Option<u64>, viewer_id: u32) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(u64::from(viewer_id))),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    }
}
