//! Adding boxes to the catalog.
//!
//! [`BoxFetcher`] is the seam the coordinator calls when a box is missing.
//! [`BoxAdder`] is the real implementation: it downloads the archive into a
//! staging directory inside the catalog and then registers it.
//!
//! ```text
//! add(request)
//!   ├─ already registered under any format ─> Err(BoxAlreadyExists)
//!   ├─ download url -> boxes/.staging-XXXX/box.box   (sha256 + size)
//!   └─ register(name, formats[0])              ─> Ok(entry)
//!                                                  Err(BoxAlreadyExists) if raced
//! ```
//!
//! Staging lives on the same filesystem as the catalog so registration is a
//! rename. The staging directory is removed when the add finishes, whether it
//! succeeded or not.

pub mod download;

pub use download::{DownloadOptions, Downloaded, Downloader};

use crate::catalog::{BoxCollection, BoxEntry, BoxMetadata};
use crate::constants::{BOX_ARCHIVE_FILE_NAME, DEFAULT_DOWNLOAD_TIMEOUT_SECS, STAGING_DIR_PREFIX};
use crate::core::BoxError;
use crate::ui::Ui;
use anyhow::{Context, Result};
use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to add one box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxAddRequest {
    /// Box name to register.
    pub name: String,
    /// Acceptable provider formats; the box is registered under the first.
    pub formats: Vec<String>,
    /// Where to fetch the archive from.
    pub url: String,
    /// Extra CA certificate for the download, already resolved to a usable path.
    pub ca_cert: Option<PathBuf>,
    /// Client certificate for the download.
    pub client_cert: Option<PathBuf>,
    /// Skip TLS verification.
    pub insecure: bool,
}

/// Adds a box to the catalog.
pub trait BoxFetcher: Send + Sync {
    /// Fetch and register the box described by `request`.
    ///
    /// Must fail with [`BoxError::BoxAlreadyExists`] when the box is already
    /// registered, including when another writer registered it first.
    fn add(&self, request: &BoxAddRequest) -> impl Future<Output = Result<BoxEntry>> + Send;
}

/// Downloads boxes into a [`BoxCollection`].
#[derive(Clone)]
pub struct BoxAdder {
    collection: BoxCollection,
    ui: Arc<dyn Ui>,
    timeout: Option<Duration>,
}

impl BoxAdder {
    /// Create an adder with the default download timeout.
    pub fn new(collection: BoxCollection, ui: Arc<dyn Ui>) -> Self {
        Self {
            collection,
            ui,
            timeout: Some(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS)),
        }
    }

    /// Override the download timeout. `None` disables it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The catalog boxes are added to.
    pub fn collection(&self) -> &BoxCollection {
        &self.collection
    }
}

impl BoxFetcher for BoxAdder {
    async fn add(&self, request: &BoxAddRequest) -> Result<BoxEntry> {
        let provider = request.formats.first().ok_or_else(|| BoxError::ConfigError {
            message: format!("no box format given for box '{}'", request.name),
        })?;

        if let Some(existing) = self.collection.find(&request.name, &request.formats).await? {
            return Err(BoxError::BoxAlreadyExists {
                name: existing.name,
                provider: existing.provider,
            }
            .into());
        }

        let boxes_dir = self.collection.dir();
        tokio::fs::create_dir_all(boxes_dir)
            .await
            .with_context(|| format!("Failed to create boxes directory {}", boxes_dir.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir_in(boxes_dir)
            .with_context(|| format!("Failed to create staging directory in {}", boxes_dir.display()))?;
        let archive = staging.path().join(BOX_ARCHIVE_FILE_NAME);

        tracing::info!(
            target: "boxcache::fetch",
            "Adding box '{}' ({}) from {}",
            request.name,
            provider,
            request.url
        );
        self.ui.info(&format!("Adding box '{}' ({}) from {}", request.name, provider, request.url));

        let downloader = Downloader::new(DownloadOptions {
            ca_cert: request.ca_cert.clone(),
            client_cert: request.client_cert.clone(),
            insecure: request.insecure,
            timeout: self.timeout,
        });
        let downloaded = downloader.fetch(&request.url, &archive, self.ui.as_ref(), &request.name).await?;

        let metadata = BoxMetadata {
            name: request.name.clone(),
            provider: provider.clone(),
            url: request.url.clone(),
            sha256: downloaded.sha256,
            size: downloaded.size,
            added_at: Utc::now(),
        };
        let entry = self.collection.register(&request.name, provider, &archive, &metadata).await?;

        self.ui.success(&format!("Successfully added box '{}' ({})", entry.name, entry.provider));
        Ok(entry)
    }
}
