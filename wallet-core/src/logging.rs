//! Logger installation for binaries and tests. The library itself only logs
//! through the `log` facade.

use crate::config::{RuntimeConfig, KEY_LOG_LEVEL};

/// Install `env_logger` with `RUST_LOG`, falling back to `default_level`.
/// Returns false when a logger was already installed.
pub fn init_logging(default_level: &str) -> bool {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.to_lowercase()),
    )
    .format_timestamp_millis()
    .try_init()
    .is_ok()
}

/// Install the logger at the configured `LOG_LEVEL`.
pub fn init_logging_from_config(config: &RuntimeConfig) -> bool {
    init_logging(&config.get_or_default(KEY_LOG_LEVEL, "info"))
}

/// Quiet logger for tests; safe to call from every test.
pub fn init_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .try_init();
}
