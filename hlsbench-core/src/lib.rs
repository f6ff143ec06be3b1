//! hlsbench Core - Viewer simulation and ramp-up engine for HLS load generation
//!
//! This crate provides the building blocks for putting a streaming server
//! under concurrent playback load: configuration, playlist parsing, the
//! per-viewer playback loop, and the orchestrator that ramps up a viewer
//! population in batches and waits for all of it to finish.

pub mod config;
pub mod orchestrator;
pub mod playlist;
pub mod reporter;
pub mod shutdown;
pub mod source;
pub mod tracing_setup;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

use std::time::Duration;

// Re-export main types for convenient access
pub use config::BenchmarkConfig;
pub use orchestrator::{
    BenchmarkPhase, BenchmarkSummary, Orchestrator, RampPlan, RunId, run_benchmark,
};
pub use playlist::{MediaPlaylist, SegmentRef};
pub use reporter::{BenchmarkEvent, ConsoleReporter, ProgressReporter, SilentReporter};
pub use shutdown::{Shutdown, ShutdownTrigger, shutdown_channel};
pub use source::{Fetched, HttpStreamSource, StreamSource, build_http_client};
pub use viewer::{ViewerContext, ViewerOutcome, ViewerReport, run_viewer};

/// Errors that end a single viewer's playback loop.
///
/// These never cross viewer boundaries: the viewer that hit one logs it,
/// stops, and the rest of the population keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    #[error("Failed to get playlist: {status}")]
    PlaylistRejected { status: u16 },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Invalid response body: {reason}")]
    Body { reason: String },
}

impl ViewerError {
    /// Maps a client error, keeping timeouts distinguishable.
    pub fn from_reqwest(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            ViewerError::Timeout { after: timeout }
        } else if error.is_decode() || error.is_body() {
            ViewerError::Body {
                reason: error.to_string(),
            }
        } else {
            ViewerError::Transport {
                reason: error.to_string(),
            }
        }
    }
}

/// Run-level errors that abort the benchmark before or while it starts.
#[derive(Debug, thiserror::Error)]
pub enum BenchmarkError {
    #[error("Setup error: {reason}")]
    Setup { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl BenchmarkError {
    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, BenchmarkError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, BenchmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_error_messages_carry_status() {
        let error = ViewerError::PlaylistRejected { status: 404 };
        assert_eq!(error.to_string(), "Failed to get playlist: 404");

        let timeout = ViewerError::Timeout {
            after: Duration::from_millis(300),
        };
        assert_eq!(timeout.to_string(), "Request timed out after 300ms");
    }

    #[test]
    fn test_configuration_errors_are_user_errors() {
        let error = BenchmarkError::Configuration {
            reason: "stream name is empty".to_string(),
        };
        assert!(error.is_user_error());

        let setup = BenchmarkError::Setup {
            reason: "tls backend unavailable".to_string(),
        };
        assert!(!setup.is_user_error());
    }
}
