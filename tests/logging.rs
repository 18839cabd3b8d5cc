use tracing::Level;

// The subscriber is process-global, so this binary holds a single test.
#[test]
fn test_rust_log_sets_level() {
    std::env::set_var("RUST_LOG", "debug");
    filswap::init_logging().unwrap();

    assert!(tracing::enabled!(Level::DEBUG));
    assert!(!tracing::enabled!(Level::TRACE));
}
