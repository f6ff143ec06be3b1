//! Logging setup tests
//!
//! Installing a global subscriber is once per process, so these live in
//! their own test binary.

use hlsbench_core::tracing_setup::init_tracing_with_fallback;
use tempfile::TempDir;
use tracing::Level;

#[test]
fn test_unwritable_logs_dir_falls_back_to_console() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("read-only");
    std::fs::write(&blocker, b"").unwrap();

    let log_file = init_tracing_with_fallback(Level::WARN, Some(&blocker.join("logs")))
        .expect("console logging should still be installed");
    assert!(log_file.is_none());

    // The console subscriber is now the global one.
    assert!(init_tracing_with_fallback(Level::WARN, Some(dir.path())).is_err());
}
