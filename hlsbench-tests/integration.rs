//! Integration tests for hlsbench
//!
//! These tests drive the orchestrator and viewers over real HTTP against the
//! simulated origin, with timings shortened so each case runs in about a
//! second.

#[path = "fixtures.rs"]
mod fixtures;

#[path = "integration/ramp_up.rs"]
mod ramp_up;
#[path = "integration/viewer_faults.rs"]
mod viewer_faults;
