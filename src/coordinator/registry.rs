//! Per-box lock registry.
//!
//! Hands out one async mutex per box key. Two tiers of locking are involved:
//!
//! ```text
//! lock_for("base") ──┐  map shard guard: held only for entry()/or_insert_with()
//! lock_for("base") ──┤
//!                    └─> same Arc<Mutex<()>>, held across the whole fetch
//!
//! lock_for("other") ───> different mutex, never waits on "base"
//! ```
//!
//! Entries are never removed. The key space is the set of box names in
//! configuration, not request volume, so growth is bounded.

use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

/// Identifies which requests must serialize: the configured box name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxKey(String);

impl BoxKey {
    /// Create a key from a box name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The box name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoxKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Lazily populated map from [`BoxKey`] to its mutex.
#[derive(Debug, Default)]
pub struct BoxLockRegistry {
    locks: DashMap<BoxKey, Arc<Mutex<()>>>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<BoxLockRegistry>> = OnceLock::new();

impl BoxLockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    ///
    /// Every coordinator built with [`BoxCoordinator::new`](super::BoxCoordinator::new)
    /// shares this instance, so box fetches serialize across the whole process.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(Self::new())))
    }

    /// Get the mutex for `key`, creating it on first use.
    ///
    /// Always returns the same mutex for equal keys. Concurrent first calls for
    /// the same key are serialized by the map's entry lock, so they cannot
    /// create two different mutexes.
    pub fn lock_for(&self, key: &BoxKey) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self.locks.entry(key.clone()).or_insert_with(|| {
            tracing::trace!(target: "boxcache::coordinator", "Creating lock for box '{}'", key);
            Arc::new(Mutex::new(()))
        });
        Arc::clone(entry.value())
    }

    /// Number of keys that have a lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no lock has been created yet.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Whether a lock exists for `key`.
    pub fn contains(&self, key: &BoxKey) -> bool {
        self.locks.contains_key(key)
    }
}
