//! Simulated HLS origin server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::SimError;
use crate::behavior::OriginBehavior;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(1);

/// Request counters, shared with the running server.
#[derive(Debug, Default)]
pub struct OriginStats {
    playlist_requests: AtomicU64,
    segment_requests: AtomicU64,
    unknown_requests: AtomicU64,
}

impl OriginStats {
    pub fn playlist_requests(&self) -> u64 {
        self.playlist_requests.load(Ordering::SeqCst)
    }

    pub fn segment_requests(&self) -> u64 {
        self.segment_requests.load(Ordering::SeqCst)
    }

    /// Requests for paths the origin does not serve
    pub fn unknown_requests(&self) -> u64 {
        self.unknown_requests.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct OriginState {
    playlist_name: Arc<str>,
    behavior: Arc<OriginBehavior>,
    playlist_body: Bytes,
    segment_body: Bytes,
    stats: Arc<OriginStats>,
}

/// Entry point for starting a simulated origin.
pub struct SimulatedOrigin;

impl SimulatedOrigin {
    /// Starts serving `stream` on an ephemeral loopback port.
    ///
    /// The server runs in a background task until the handle is shut down
    /// or dropped.
    ///
    /// # Errors
    ///
    /// - `SimError::Bind` - Loopback listener could not be bound
    pub async fn spawn(
        stream: &str,
        behavior: OriginBehavior,
    ) -> Result<SimulatedOriginHandle, SimError> {
        Self::spawn_on("127.0.0.1:0", stream, behavior).await
    }

    /// Starts serving `stream` on the given address.
    ///
    /// # Errors
    ///
    /// - `SimError::Bind` - Listener could not be bound to `address`
    pub async fn spawn_on(
        address: &str,
        stream: &str,
        behavior: OriginBehavior,
    ) -> Result<SimulatedOriginHandle, SimError> {
        let bind_error = |reason: String| SimError::Bind {
            address: address.to_string(),
            reason,
        };

        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| bind_error(e.to_string()))?;
        let local_addr = listener.local_addr().map_err(|e| bind_error(e.to_string()))?;

        let stats = Arc::new(OriginStats::default());
        let state = OriginState {
            playlist_name: format!("{stream}.m3u8").into(),
            playlist_body: Bytes::from(behavior.render_playlist()),
            segment_body: Bytes::from(behavior.render_segment()),
            behavior: Arc::new(behavior),
            stats: Arc::clone(&stats),
        };

        let app = Router::new()
            .route("/hls/{file}", get(serve_hls))
            .fallback(serve_unknown)
            .with_state(state);

        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_receiver.await;
            });
            if let Err(e) = server.await {
                tracing::error!("Simulated origin error: {}", e);
            }
        });

        tracing::info!("Simulated origin serving /hls/{}.m3u8 on {}", stream, local_addr);

        Ok(SimulatedOriginHandle {
            local_addr,
            stats,
            shutdown_sender: Some(shutdown_sender),
            task: Some(task),
        })
    }
}

/// Running origin. Dropping it stops the server.
pub struct SimulatedOriginHandle {
    local_addr: SocketAddr,
    stats: Arc<OriginStats>,
    shutdown_sender: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedOriginHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL to hand to the benchmark, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn stats(&self) -> &OriginStats {
        &self.stats
    }

    /// Stops accepting connections and waits briefly for in-flight
    /// requests to drain.
    pub async fn shutdown(mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
        if let Some(task) = self.task.take()
            && tokio::time::timeout(SHUTDOWN_DRAIN, task).await.is_err()
        {
            tracing::debug!("Simulated origin still draining connections, detaching");
        }
    }
}

impl Drop for SimulatedOriginHandle {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
    }
}

async fn serve_hls(State(state): State<OriginState>, Path(file): Path<String>) -> Response {
    if !state.behavior.latency.is_zero() {
        tokio::time::sleep(state.behavior.latency).await;
    }

    if file == *state.playlist_name {
        state.stats.playlist_requests.fetch_add(1, Ordering::SeqCst);
        return respond(
            state.behavior.playlist_status,
            PLAYLIST_CONTENT_TYPE,
            state.playlist_body.clone(),
        );
    }

    if state.behavior.segments.iter().any(|segment| *segment == file) {
        state.stats.segment_requests.fetch_add(1, Ordering::SeqCst);
        return respond(
            state.behavior.segment_status,
            SEGMENT_CONTENT_TYPE,
            state.segment_body.clone(),
        );
    }

    tracing::debug!("Simulated origin: unknown file {}", file);
    state.stats.unknown_requests.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND.into_response()
}

async fn serve_unknown(State(state): State<OriginState>) -> StatusCode {
    state.stats.unknown_requests.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

fn respond(status: u16, content_type: &'static str, body: Bytes) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::OK {
        ([(header::CONTENT_TYPE, content_type)], body).into_response()
    } else {
        status.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_playlist_and_segments() {
        let origin = SimulatedOrigin::spawn("live", OriginBehavior::default())
            .await
            .unwrap();
        let client = reqwest::Client::new();

        let playlist = client
            .get(format!("{}/hls/live.m3u8", origin.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(playlist.status(), 200);
        assert_eq!(
            playlist.headers()[reqwest::header::CONTENT_TYPE],
            PLAYLIST_CONTENT_TYPE
        );
        assert!(playlist.text().await.unwrap().contains("segment-1.ts"));

        let segment = client
            .get(format!("{}/hls/segment-0.ts", origin.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(segment.status(), 200);
        assert_eq!(segment.bytes().await.unwrap().len(), 188 * 64);

        assert_eq!(origin.stats().playlist_requests(), 1);
        assert_eq!(origin.stats().segment_requests(), 1);
        origin.shutdown().await;
    }

    #[tokio::test]
    async fn test_injected_statuses() {
        let behavior = OriginBehavior::default()
            .with_playlist_status(404)
            .with_segment_status(503);
        let origin = SimulatedOrigin::spawn("cam", behavior).await.unwrap();
        let client = reqwest::Client::new();

        let playlist = client
            .get(format!("{}/hls/cam.m3u8", origin.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(playlist.status(), 404);

        let segment = client
            .get(format!("{}/hls/segment-1.ts", origin.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(segment.status(), 503);
        origin.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_paths_are_not_found() {
        let origin = SimulatedOrigin::spawn("live", OriginBehavior::default())
            .await
            .unwrap();
        let client = reqwest::Client::new();

        for path in ["/hls/other.m3u8", "/hls/segment-9.ts", "/index.html"] {
            let response = client
                .get(format!("{}{}", origin.base_url(), path))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 404, "{path}");
        }

        assert_eq!(origin.stats().unknown_requests(), 3);
        assert_eq!(origin.stats().playlist_requests(), 0);
        origin.shutdown().await;
    }

    #[tokio::test]
    async fn test_latency_is_applied() {
        let behavior = OriginBehavior::default().with_latency(Duration::from_millis(150));
        let origin = SimulatedOrigin::spawn("live", behavior).await.unwrap();

        let started = std::time::Instant::now();
        let response = reqwest::get(format!("{}/hls/live.m3u8", origin.base_url()))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(started.elapsed() >= Duration::from_millis(150));
        origin.shutdown().await;
    }
}
