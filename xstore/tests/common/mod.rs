use std::time::Duration;

use xstore::{Options, TimeoutMutex};

/// Route `tracing` output of the library into the test harness' captured output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xstore=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn opts(lock_timeout_ms: u64) -> Options {
    let mut o = Options::new();
    o.lock_timeout(Duration::from_millis(lock_timeout_ms));
    o.lock_poll_interval(Duration::from_millis(10));
    o
}

#[allow(dead_code)]
pub fn lock_with_timeout<K: Eq + Clone + std::fmt::Debug>(lock_timeout_ms: u64) -> TimeoutMutex<K> {
    TimeoutMutex::new(&opts(lock_timeout_ms))
}
