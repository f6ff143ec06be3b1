//! Progress reporting.
//!
//! Every status line the benchmark produces goes through a
//! `ProgressReporter`, in the order start, batch progress, all connected,
//! completion. Viewer failures interleave freely.

use std::time::Duration;

use crate::orchestrator::BenchmarkPhase;

/// Observable events of a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchmarkEvent {
    /// Run accepted, ramp-up about to begin
    Started { viewers: u32, duration: Duration },
    /// Orchestrator moved to a new phase
    PhaseChanged(BenchmarkPhase),
    /// One batch of viewers was launched
    BatchLaunched { batch: u32, launched: u32, total: u32 },
    /// Every viewer has been launched
    AllConnected { viewers: u32, duration: Duration },
    /// Hard failure: playlist request returned a non-success status
    PlaylistFailed { viewer_id: u32, status: u16 },
    /// Soft failure: segment request returned a non-success status
    SegmentFailed { viewer_id: u32, status: u16 },
    /// Hard failure: anything else that ended a viewer
    ViewerErrored { viewer_id: u32, reason: String },
    /// Shutdown was requested before the barrier was satisfied
    Cancelled { reason: String },
    /// Every viewer has terminated
    Completed {
        duration: Duration,
        elapsed: Duration,
        finished: u32,
        failed: u32,
        cancelled: u32,
    },
}

impl std::fmt::Display for BenchmarkEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchmarkEvent::Started { viewers, duration } => write!(
                f,
                "Starting benchmark with {viewers} viewers for {} seconds",
                duration.as_secs()
            ),
            BenchmarkEvent::PhaseChanged(phase) => write!(f, "Benchmark phase: {phase}"),
            BenchmarkEvent::BatchLaunched {
                launched, total, ..
            } => write!(f, "Connecting viewers: {launched}/{total}"),
            BenchmarkEvent::AllConnected { viewers, duration } => write!(
                f,
                "All {viewers} viewers connected. Running for {} seconds...",
                duration.as_secs()
            ),
            BenchmarkEvent::PlaylistFailed { viewer_id, status } => {
                write!(f, "Viewer {viewer_id}: Failed to get playlist: {status}")
            }
            BenchmarkEvent::SegmentFailed { viewer_id, status } => {
                write!(f, "Viewer {viewer_id}: Failed to get segment: {status}")
            }
            BenchmarkEvent::ViewerErrored { viewer_id, reason } => {
                write!(f, "Viewer {viewer_id} error: {reason}")
            }
            BenchmarkEvent::Cancelled { reason } => {
                write!(f, "Stopping remaining viewers: {reason}")
            }
            BenchmarkEvent::Completed {
                duration,
                elapsed,
                finished,
                failed,
                cancelled,
            } => write!(
                f,
                "Benchmark completed after {} seconds ({:.1}s elapsed; \
                 {finished} finished, {failed} failed, {cancelled} cancelled).",
                duration.as_secs(),
                elapsed.as_secs_f64()
            ),
        }
    }
}

/// Sink for benchmark events. Shared by the orchestrator and every viewer.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: BenchmarkEvent);
}

/// Prints status lines to stdout.
///
/// Phase changes are diagnostics and only go to tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: BenchmarkEvent) {
        match event {
            BenchmarkEvent::PhaseChanged(phase) => {
                tracing::debug!(%phase, "Benchmark phase changed");
            }
            event => println!("{event}"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _event: BenchmarkEvent) {}
}
