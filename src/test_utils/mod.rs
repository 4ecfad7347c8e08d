//! Test utilities for boxcache
//!
//! In-memory stand-ins for the catalog, fetcher and UI, plus manifest fixtures.
//! They let tests drive [`BoxCoordinator`](crate::coordinator::BoxCoordinator)
//! without touching the network and observe exactly how often it fetched.
//!
//! # Example
//!
//! ```rust,no_run
//! use boxcache_cli::test_utils::{CountingFetcher, FetchBehavior, MemoryCatalog};
//!
//! let catalog = MemoryCatalog::new();
//! let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed);
//! assert_eq!(fetcher.calls(), 0);
//! ```

mod fakes;
mod fixtures;

pub use fakes::{CountingFetcher, FetchBehavior, MemoryCatalog, RecordingUi};
pub use fixtures::ManifestFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=boxcache::coordinator=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(true)
            .try_init();
    });
}
