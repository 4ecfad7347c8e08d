//! In-memory fakes for the catalog, fetcher and UI seams.

use crate::catalog::{BoxCatalog, BoxEntry, BoxMetadata};
use crate::core::BoxError;
use crate::fetch::{BoxAddRequest, BoxFetcher};
use crate::ui::Ui;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Catalog held in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    boxes: Arc<Mutex<HashMap<(String, String), BoxEntry>>>,
    find_calls: Arc<AtomicUsize>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` under `provider`, replacing any existing entry.
    pub fn insert(&self, name: &str, provider: &str) -> BoxEntry {
        let entry = BoxEntry {
            name: name.to_string(),
            provider: provider.to_string(),
            directory: PathBuf::from("/memory").join(name).join(provider),
            metadata: BoxMetadata {
                name: name.to_string(),
                provider: provider.to_string(),
                url: format!("memory://{name}"),
                sha256: String::new(),
                size: 0,
                added_at: Utc::now(),
            },
        };
        lock(&self.boxes).insert((name.to_string(), provider.to_string()), entry.clone());
        entry
    }

    /// Whether `name` is registered under `provider`.
    pub fn contains(&self, name: &str, provider: &str) -> bool {
        lock(&self.boxes).contains_key(&(name.to_string(), provider.to_string()))
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        lock(&self.boxes).len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times [`BoxCatalog::find`] was called.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

impl BoxCatalog for MemoryCatalog {
    async fn find(&self, name: &str, formats: &[String]) -> Result<Option<BoxEntry>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let boxes = lock(&self.boxes);
        Ok(formats
            .iter()
            .find_map(|provider| boxes.get(&(name.to_string(), provider.clone())).cloned()))
    }
}

/// What a [`CountingFetcher`] does when asked to add a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchBehavior {
    /// Register the box and succeed.
    Succeed,
    /// Register the box but report that it already existed, as a writer that
    /// lost a race would.
    AlreadyExists,
    /// Fail with [`BoxError::DownloadFailed`] without registering anything.
    Fail,
}

/// Fetcher that registers boxes into a [`MemoryCatalog`] and counts calls.
///
/// Clones share counters, so a test can keep one handle and give another to the
/// coordinator.
#[derive(Debug, Clone)]
pub struct CountingFetcher {
    catalog: MemoryCatalog,
    behavior: FetchBehavior,
    delay: Duration,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    requests: Arc<Mutex<Vec<BoxAddRequest>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl CountingFetcher {
    /// Create a fetcher writing into `catalog`.
    pub fn new(catalog: MemoryCatalog, behavior: FetchBehavior) -> Self {
        Self {
            catalog,
            behavior,
            delay: Duration::ZERO,
            calls: Arc::default(),
            requests: Arc::default(),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
        }
    }

    /// Sleep for `delay` inside every fetch, simulating a slow download.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Total number of fetches.
    pub fn calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    /// Number of fetches for box `name`.
    pub fn calls_for(&self, name: &str) -> usize {
        lock(&self.calls).get(name).copied().unwrap_or(0)
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<BoxAddRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Highest number of fetches that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl BoxFetcher for CountingFetcher {
    async fn add(&self, request: &BoxAddRequest) -> Result<BoxEntry> {
        *lock(&self.calls).entry(request.name.clone()).or_default() += 1;
        lock(&self.requests).push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let provider = request.formats.first().cloned().unwrap_or_default();
        match self.behavior {
            FetchBehavior::Succeed => Ok(self.catalog.insert(&request.name, &provider)),
            FetchBehavior::AlreadyExists => {
                self.catalog.insert(&request.name, &provider);
                Err(BoxError::BoxAlreadyExists {
                    name: request.name.clone(),
                    provider,
                }
                .into())
            }
            FetchBehavior::Fail => Err(BoxError::DownloadFailed {
                url: request.url.clone(),
                reason: "simulated failure".to_string(),
            }
            .into()),
        }
    }
}

/// UI that records every message.
#[derive(Debug, Default)]
pub struct RecordingUi {
    messages: Mutex<Vec<String>>,
}

impl RecordingUi {
    /// Messages received so far, in order.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl Ui for RecordingUi {
    fn info(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }

    fn warn(&self, message: &str) {
        lock(&self.messages).push(format!("warning: {message}"));
    }

    fn success(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}
