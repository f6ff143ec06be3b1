//! hlsbench Simulation - In-process HLS origin for offline runs and tests.
//!
//! Serves a media playlist and its segments over real HTTP on a loopback
//! port, with configurable status codes and latency per route so failure
//! handling can be exercised end to end.
//!
//! # Example
//!
//! ```rust,no_run
//! use hlsbench_sim::{OriginBehavior, SimulatedOrigin};
//!
//! # async fn example() -> Result<(), hlsbench_sim::SimError> {
//! let behavior = OriginBehavior::default().with_segment_status(503);
//! let origin = SimulatedOrigin::spawn("live", behavior).await?;
//! println!("Serving {}/hls/live.m3u8", origin.base_url());
//! origin.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod behavior;
pub mod origin;

pub use behavior::OriginBehavior;
pub use origin::{OriginStats, SimulatedOrigin, SimulatedOriginHandle};

/// Errors raised while starting the simulated origin.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Failed to bind simulated origin to {address}: {reason}")]
    Bind { address: String, reason: String },
}
