//! Mock implementations for testing viewers and the orchestrator.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ViewerError;
use crate::playlist::SegmentRef;
use crate::reporter::{BenchmarkEvent, ProgressReporter};
use crate::source::{Fetched, StreamSource};

/// Scripted response for one route.
#[derive(Debug, Clone)]
enum Scripted<T> {
    Respond(T),
    Status(u16),
    Fail(ViewerError),
    Hang,
}

/// Stream source answering every request from a fixed script.
///
/// Counts requests and records which segments were asked for. Latency,
/// when set, is applied with `tokio::time::sleep` so paused-clock tests
/// stay deterministic.
#[derive(Debug)]
pub struct ScriptedSource {
    playlist: Scripted<String>,
    segment: Scripted<u64>,
    latency: Duration,
    playlist_requests: AtomicU32,
    segment_requests: AtomicU32,
    requested_segments: Mutex<Vec<SegmentRef>>,
}

impl ScriptedSource {
    /// Creates a source serving `playlist_body` and 1 KiB segments.
    pub fn new(playlist_body: impl Into<String>) -> Self {
        Self {
            playlist: Scripted::Respond(playlist_body.into()),
            segment: Scripted::Respond(1024),
            latency: Duration::ZERO,
            playlist_requests: AtomicU32::new(0),
            segment_requests: AtomicU32::new(0),
            requested_segments: Mutex::new(Vec::new()),
        }
    }

    pub fn with_playlist_status(mut self, status: u16) -> Self {
        self.playlist = Scripted::Status(status);
        self
    }

    pub fn with_playlist_error(mut self, error: ViewerError) -> Self {
        self.playlist = Scripted::Fail(error);
        self
    }

    /// Playlist requests never complete.
    pub fn with_hanging_playlist(mut self) -> Self {
        self.playlist = Scripted::Hang;
        self
    }

    pub fn with_segment_status(mut self, status: u16) -> Self {
        self.segment = Scripted::Status(status);
        self
    }

    pub fn with_segment_error(mut self, error: ViewerError) -> Self {
        self.segment = Scripted::Fail(error);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn playlist_requests(&self) -> u32 {
        self.playlist_requests.load(Ordering::SeqCst)
    }

    pub fn segment_requests(&self) -> u32 {
        self.segment_requests.load(Ordering::SeqCst)
    }

    pub fn requested_segments(&self) -> Vec<SegmentRef> {
        self.requested_segments.lock().clone()
    }

    async fn answer<T: Clone>(&self, script: &Scripted<T>) -> Result<Fetched<T>, ViewerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match script {
            Scripted::Respond(value) => Ok(Fetched::Success(value.clone())),
            Scripted::Status(status) => Ok(Fetched::Status(*status)),
            Scripted::Fail(error) => Err(error.clone()),
            Scripted::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn fetch_playlist(&self) -> Result<Fetched<String>, ViewerError> {
        self.playlist_requests.fetch_add(1, Ordering::SeqCst);
        self.answer(&self.playlist).await
    }

    async fn fetch_segment(&self, segment: &SegmentRef) -> Result<Fetched<u64>, ViewerError> {
        self.segment_requests.fetch_add(1, Ordering::SeqCst);
        self.requested_segments.lock().push(segment.clone());
        self.answer(&self.segment).await
    }
}

/// Reporter that keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<BenchmarkEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BenchmarkEvent> {
        self.events.lock().clone()
    }

    pub fn count_where(&self, predicate: impl Fn(&BenchmarkEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }

    /// Rendered status lines, as the console reporter would print them.
    pub fn lines(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| !matches!(event, BenchmarkEvent::PhaseChanged(_)))
            .map(ToString::to_string)
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: BenchmarkEvent) {
        self.events.lock().push(event);
    }
}
