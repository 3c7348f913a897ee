/// Install the `env_logger` backend.
///
/// Set `DUALSUBS_LOG` to control the level (e.g. `DUALSUBS_LOG=debug`).
/// Safe to call more than once; only the first call installs the logger.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::new().filter_or("DUALSUBS_LOG", "info"))
        .format_timestamp_millis()
        .try_init();
}

/// Same as [`init_logger`], but routes output through the test harness capture.
pub fn init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::new().filter_or("DUALSUBS_LOG", "debug"))
        .is_test(true)
        .try_init();
}
