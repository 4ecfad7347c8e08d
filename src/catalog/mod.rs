//! Local box catalog.
//!
//! The catalog maps `(box name, provider format)` to an installed box. The
//! [`BoxCatalog`] trait is the read side the coordinator depends on;
//! [`BoxCollection`] is the directory-backed implementation used by the CLI.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.boxcache/boxes/
//! ├── base/
//! │   ├── virtualbox/
//! │   │   ├── box.box          # the archive as downloaded
//! │   │   └── metadata.json    # BoxMetadata
//! │   └── libvirt/
//! ├── org-SLASH-image/         # "org/image", slash escaped
//! │   └── virtualbox/
//! └── .staging-Xa81kq/         # in-flight downloads
//! ```
//!
//! # Concurrency
//!
//! Registration creates the provider directory with a single `create_dir`, which
//! either succeeds or fails with `AlreadyExists`. Two writers racing to register the
//! same box therefore resolve to exactly one winner; the loser gets
//! [`BoxError::BoxAlreadyExists`].

use crate::constants::{BOX_ARCHIVE_FILE_NAME, BOX_METADATA_FILE_NAME, BOX_NAME_SLASH_ESCAPE};
use crate::core::BoxError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Metadata recorded for every installed box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxMetadata {
    /// Box name as configured (unescaped).
    pub name: String,
    /// Provider format the box is registered under.
    pub provider: String,
    /// URL the box was fetched from.
    pub url: String,
    /// Hex-encoded SHA-256 of the archive.
    pub sha256: String,
    /// Archive size in bytes.
    pub size: u64,
    /// When the box was registered.
    pub added_at: DateTime<Utc>,
}

/// A box present in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxEntry {
    /// Box name.
    pub name: String,
    /// Provider format this entry was found under.
    pub provider: String,
    /// Catalog directory of this entry.
    pub directory: PathBuf,
    /// Recorded metadata.
    pub metadata: BoxMetadata,
}

impl BoxEntry {
    /// Path of the box archive.
    pub fn archive_path(&self) -> PathBuf {
        self.directory.join(BOX_ARCHIVE_FILE_NAME)
    }
}

/// Read access to a box catalog.
pub trait BoxCatalog: Send + Sync {
    /// Find a box by name, trying each provider format in order.
    ///
    /// Returns the first match, or `None` if the box isn't registered under any
    /// of the formats.
    fn find(
        &self,
        name: &str,
        formats: &[String],
    ) -> impl Future<Output = Result<Option<BoxEntry>>> + Send;
}

/// Directory-backed box catalog.
#[derive(Debug, Clone)]
pub struct BoxCollection {
    dir: PathBuf,
}

impl BoxCollection {
    /// Create a catalog rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    /// Root directory of the catalog.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn box_dir(&self, name: &str, provider: &str) -> Result<PathBuf, BoxError> {
        let escaped = escape_name(name);
        validate_component("box name", &escaped)?;
        validate_component("provider", provider)?;
        Ok(self.dir.join(escaped).join(provider))
    }

    /// Find a box by name under the first matching provider format.
    ///
    /// # Errors
    ///
    /// - [`BoxError::ConfigError`] for names that cannot be stored
    /// - IO errors probing the catalog, or unreadable metadata for a matching entry
    pub async fn find(&self, name: &str, formats: &[String]) -> Result<Option<BoxEntry>> {
        for provider in formats {
            let directory = self.box_dir(name, provider)?;
            let metadata_path = directory.join(BOX_METADATA_FILE_NAME);
            if !path_exists(&metadata_path).await? {
                continue;
            }

            let metadata = read_metadata(&metadata_path).await?;
            tracing::debug!(
                target: "boxcache::catalog",
                "Found box '{}' for provider '{}' at {}",
                name,
                provider,
                directory.display()
            );
            return Ok(Some(BoxEntry {
                name: name.to_string(),
                provider: provider.clone(),
                directory,
                metadata,
            }));
        }
        Ok(None)
    }

    /// List every installed box, sorted by name then provider.
    ///
    /// Staging directories and incomplete entries without metadata are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog directory cannot be read.
    pub async fn all(&self) -> Result<Vec<BoxEntry>> {
        let mut entries = Vec::new();
        if !path_exists(&self.dir).await? {
            return Ok(entries);
        }

        let mut names = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read boxes directory {}", self.dir.display()))?;
        while let Some(name_entry) = names.next_entry().await? {
            if name_entry.file_name().to_string_lossy().starts_with('.')
                || !name_entry.file_type().await?.is_dir()
            {
                continue;
            }

            let mut providers = fs::read_dir(name_entry.path()).await?;
            while let Some(provider_entry) = providers.next_entry().await? {
                let directory = provider_entry.path();
                let metadata_path = directory.join(BOX_METADATA_FILE_NAME);
                if !path_exists(&metadata_path).await? {
                    continue;
                }
                match read_metadata(&metadata_path).await {
                    Ok(metadata) => entries.push(BoxEntry {
                        name: metadata.name.clone(),
                        provider: metadata.provider.clone(),
                        directory,
                        metadata,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            target: "boxcache::catalog",
                            "Skipping unreadable box at {}: {:#}",
                            directory.display(),
                            e
                        );
                    }
                }
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.provider.cmp(&b.provider)));
        Ok(entries)
    }

    /// Register a downloaded archive as box `name` for `provider`.
    ///
    /// The archive is moved into the catalog. On success the caller's file no
    /// longer exists.
    ///
    /// # Errors
    ///
    /// - [`BoxError::BoxAlreadyExists`] if the box is already registered, including
    ///   when another writer registered it concurrently
    /// - [`BoxError::ConfigError`] for names that cannot be stored
    /// - IO errors while moving the archive or writing metadata
    pub async fn register(
        &self,
        name: &str,
        provider: &str,
        archive: &Path,
        metadata: &BoxMetadata,
    ) -> Result<BoxEntry> {
        let directory = self.box_dir(name, provider)?;
        if let Some(name_dir) = directory.parent() {
            fs::create_dir_all(name_dir)
                .await
                .with_context(|| format!("Failed to create box directory {}", name_dir.display()))?;
        }

        match fs::create_dir(&directory).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BoxError::BoxAlreadyExists {
                    name: name.to_string(),
                    provider: provider.to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to create box directory {}", directory.display())
                });
            }
        }

        if let Err(e) = self.populate(&directory, archive, metadata).await {
            // Leave no half-registered box behind; a later attempt must be able to retry.
            fs::remove_dir_all(&directory).await.ok();
            return Err(e);
        }

        tracing::info!(
            target: "boxcache::catalog",
            "Registered box '{}' ({}) at {}",
            name,
            provider,
            directory.display()
        );

        Ok(BoxEntry {
            name: name.to_string(),
            provider: provider.to_string(),
            directory,
            metadata: metadata.clone(),
        })
    }

    async fn populate(&self, directory: &Path, archive: &Path, metadata: &BoxMetadata) -> Result<()> {
        let archive_dest = directory.join(BOX_ARCHIVE_FILE_NAME);
        if fs::rename(archive, &archive_dest).await.is_err() {
            // Different filesystem: fall back to copy + remove.
            fs::copy(archive, &archive_dest).await.with_context(|| {
                format!("Failed to move box archive into {}", directory.display())
            })?;
            fs::remove_file(archive).await.ok();
        }

        // Metadata is written last and atomically; its presence marks the box as installed.
        let json = serde_json::to_vec_pretty(metadata).context("Failed to serialize box metadata")?;
        let tmp = directory.join(format!("{BOX_METADATA_FILE_NAME}.tmp"));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, directory.join(BOX_METADATA_FILE_NAME)).await?;
        Ok(())
    }

    /// Remove box `name` for `provider`.
    ///
    /// # Errors
    ///
    /// - [`BoxError::BoxNotFound`] if the box isn't installed
    /// - [`BoxError::ConfigError`] for names that cannot be stored
    pub async fn remove(&self, name: &str, provider: &str) -> Result<()> {
        let directory = self.box_dir(name, provider)?;
        if !path_exists(&directory).await? {
            return Err(BoxError::BoxNotFound {
                name: name.to_string(),
                providers: provider.to_string(),
            }
            .into());
        }

        fs::remove_dir_all(&directory)
            .await
            .with_context(|| format!("Failed to remove {}", directory.display()))?;

        // Fails while other providers remain, which is fine.
        if let Some(name_dir) = directory.parent() {
            fs::remove_dir(name_dir).await.ok();
        }

        tracing::info!(target: "boxcache::catalog", "Removed box '{}' ({})", name, provider);
        Ok(())
    }
}

impl BoxCatalog for BoxCollection {
    async fn find(&self, name: &str, formats: &[String]) -> Result<Option<BoxEntry>> {
        BoxCollection::find(self, name, formats).await
    }
}

/// Map a box name to a single directory component.
pub fn escape_name(name: &str) -> String {
    name.replace('/', BOX_NAME_SLASH_ESCAPE)
}

fn validate_component(what: &str, value: &str) -> Result<(), BoxError> {
    if value.is_empty() || value.starts_with('.') || value.contains('\\') || value.contains('/') {
        return Err(BoxError::ConfigError {
            message: format!("invalid {what}: '{value}'"),
        });
    }
    Ok(())
}

async fn path_exists(path: &Path) -> Result<bool> {
    fs::try_exists(path)
        .await
        .with_context(|| format!("Failed to check {}", path.display()))
}

async fn read_metadata(path: &Path) -> Result<BoxMetadata> {
    let content = fs::read(path)
        .await
        .with_context(|| format!("Failed to read box metadata {}", path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("Failed to parse box metadata {}", path.display()))
}
