//! End-to-end tests for hlsbench
//!
//! Full benchmark runs with production pacing against the simulated origin,
//! checking the status lines a user would see.

#[path = "../fixtures.rs"]
mod fixtures;

mod benchmark_workflow;
