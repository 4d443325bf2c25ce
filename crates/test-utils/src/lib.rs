//! Shared harness for warmdag's integration tests.
//!
//! - [`recorder`]: a `StageHandler` that also witnesses start/finish order.
//! - [`builders`]: terse construction of configs for CLI-level tests.

pub mod builders;
pub mod recorder;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound on any single awaited run in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Output only shows for failing tests unless run with `--nocapture`.
/// `RUST_LOG=warmdag=debug cargo test` narrows it to the scheduler.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
///
/// A hung warm-up run (lost wakeup, undetected cycle) then shows up as a
/// panic instead of a stuck test binary.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("warm-up did not finish within {TEST_TIMEOUT:?}"))
}
