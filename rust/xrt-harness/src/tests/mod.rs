// Tests module
// Reference token suite: deployment, mint and send against a live dev node
// Lifecycle: node startup, port conflicts and teardown


use crate::config::HarnessConfig;
use tracing_subscriber::EnvFilter;

/// Logs from `XRT_LOG`/`RUST_LOG`, captured per test
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("XRT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Free port, deterministic accounts
///
/// Starts from the `XRT_HARNESS_CONFIG` file when set; `XRT_HARNESS_*`
/// variables are applied last, so `XRT_HARNESS_PORT` replaces the free port.
pub fn test_config(seed: &str) -> HarnessConfig {
    HarnessConfig::from_config_env()
        .and_then(|config| config.with_port(0).with_seed(seed).with_env_overrides())
        .expect("harness configuration from environment")
}
