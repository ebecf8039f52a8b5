//! Tests for `src/logging.rs`.

use vaultguard::logging::LoggingGuard;

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_file_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // The global subscriber can only be installed once per process, so the
    // result is ignored; the directory is created before installation.
    let _result = vaultguard::logging::init_file(&logs_dir, "debug");
    assert!(logs_dir.exists(), "logs directory should be created");
}
