//! Stream source abstraction over the shared HTTP client.
//!
//! Viewers only talk to a `StreamSource`, so the playback loop can be driven
//! by the real pooled client or by scripted responses in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{NetworkConfig, TargetConfig};
use crate::playlist::SegmentRef;
use crate::{BenchmarkError, ViewerError};

/// Result of a fetch that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// 2xx response with its payload
    Success(T),
    /// Any other status code
    Status(u16),
}

/// Where viewers fetch playlists and segments from.
///
/// Implementations must support concurrent use by every viewer in the run
/// without external locking.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Fetches the stream's media playlist as text.
    ///
    /// # Errors
    ///
    /// - `ViewerError::Transport` - Connection failed or was reset
    /// - `ViewerError::Timeout` - Request exceeded the configured timeout
    /// - `ViewerError::Body` - Body could not be read as text
    async fn fetch_playlist(&self) -> Result<Fetched<String>, ViewerError>;

    /// Fetches a segment, draining and discarding its body.
    ///
    /// Returns the number of bytes drained on success.
    ///
    /// # Errors
    ///
    /// - `ViewerError::Transport` - Connection failed or was reset
    /// - `ViewerError::Timeout` - Request exceeded the configured timeout
    /// - `ViewerError::Body` - Body stream broke off
    async fn fetch_segment(&self, segment: &SegmentRef) -> Result<Fetched<u64>, ViewerError>;
}

/// Builds the pooled client shared by all viewers for the whole run.
///
/// # Errors
///
/// - `BenchmarkError::Setup` - TLS backend or resolver could not be initialised
pub fn build_http_client(config: &NetworkConfig) -> Result<reqwest::Client, BenchmarkError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.as_str())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
        .map_err(|e| BenchmarkError::Setup {
            reason: format!("failed to build HTTP client: {e}"),
        })
}

/// `StreamSource` backed by the shared `reqwest::Client`.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HttpStreamSource {
    client: reqwest::Client,
    target: Arc<TargetConfig>,
    request_timeout: Duration,
}

impl HttpStreamSource {
    pub fn new(client: reqwest::Client, target: TargetConfig, request_timeout: Duration) -> Self {
        Self {
            client,
            target: Arc::new(target),
            request_timeout,
        }
    }

    fn map_error(&self, error: reqwest::Error) -> ViewerError {
        ViewerError::from_reqwest(&error, self.request_timeout)
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    async fn fetch_playlist(&self) -> Result<Fetched<String>, ViewerError> {
        let url = self.target.playlist_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(Fetched::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.map_error(e))?;
        Ok(Fetched::Success(body))
    }

    async fn fetch_segment(&self, segment: &SegmentRef) -> Result<Fetched<u64>, ViewerError> {
        let url = self.target.segment_url(segment);
        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(Fetched::Status(status.as_u16()));
        }

        let mut drained = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(e))? {
            drained += chunk.len() as u64;
        }

        Ok(Fetched::Success(drained))
    }
}
