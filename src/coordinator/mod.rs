//! Fetch-once box provisioning.
//!
//! [`BoxCoordinator::ensure_present`] makes sure the box a machine needs is in
//! the catalog. It fetches the box at most once per process, however many
//! machines ask for it concurrently.
//!
//! # Protocol
//!
//! ```text
//! ensure_present(machine)
//!   ├─ box or box_url unset ───────────────> Ok(false)    no lock, no catalog
//!   ├─ machine already has its box ────────> Ok(false)
//!   └─ lock_for(box name).lock().await
//!        ├─ catalog.find(name, formats) hit ─> Ok(true)   another task fetched it
//!        ├─ fetcher.add(request)
//!        │    ├─ Ok ───────────────────────> Ok(true)
//!        │    ├─ Err(BoxAlreadyExists) ────> Ok(true)     lost a race, box is there
//!        │    └─ Err(other) ───────────────> Err(other)   lock still released
//!        └─ guard dropped
//! ```
//!
//! `Ok(true)` means the box underneath the machine changed (or may have). The
//! caller must reload its machine before using the box; see
//! [`crate::action::handle_box_url`].
//!
//! The first check uses the machine's cached box without locking. A stale `None`
//! only sends the caller to the locked catalog check, so the race is harmless.

pub mod registry;

pub use registry::{BoxKey, BoxLockRegistry};

use crate::catalog::BoxCatalog;
use crate::core::BoxError;
use crate::environment::Machine;
use crate::fetch::{BoxAddRequest, BoxFetcher};
use crate::ui::Ui;
use crate::utils::resolve_against;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// The box a machine asks for, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxDescriptor {
    /// Catalog name of the box.
    pub name: Option<String>,
    /// Source URL to fetch from when the box is missing.
    pub url: Option<String>,
    /// CA certificate for the download, possibly relative to the project root.
    pub download_ca_cert: Option<PathBuf>,
    /// Client certificate for the download.
    pub download_client_cert: Option<PathBuf>,
    /// Skip TLS verification for the download.
    pub download_insecure: bool,
}

impl BoxDescriptor {
    /// Name and URL, if both are set and non-blank.
    pub fn configured(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref().filter(|s| !s.trim().is_empty())?;
        let url = self.url.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((name, url))
    }

    /// Whether this descriptor can trigger a fetch at all.
    pub fn is_configured(&self) -> bool {
        self.configured().is_some()
    }
}

/// Coordinates box fetches so each box is fetched at most once.
///
/// Cheap to share behind an [`Arc`]; all state is either immutable or the
/// internally synchronized lock registry.
pub struct BoxCoordinator<C, F> {
    locks: Arc<BoxLockRegistry>,
    catalog: C,
    fetcher: F,
    ui: Arc<dyn Ui>,
}

impl<C: BoxCatalog, F: BoxFetcher> BoxCoordinator<C, F> {
    /// Create a coordinator using the process-wide lock registry.
    pub fn new(catalog: C, fetcher: F, ui: Arc<dyn Ui>) -> Self {
        Self::with_registry(BoxLockRegistry::global(), catalog, fetcher, ui)
    }

    /// Create a coordinator with its own lock registry.
    pub fn with_registry(
        locks: Arc<BoxLockRegistry>,
        catalog: C,
        fetcher: F,
        ui: Arc<dyn Ui>,
    ) -> Self {
        Self {
            locks,
            catalog,
            fetcher,
            ui,
        }
    }

    /// The lock registry in use.
    pub fn registry(&self) -> &Arc<BoxLockRegistry> {
        &self.locks
    }

    /// The catalog consulted under the per-box lock.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Make sure the box `machine` needs is in the catalog.
    ///
    /// Returns `true` when the caller must reload the machine.
    ///
    /// # Errors
    ///
    /// Catalog lookup errors and fetch errors other than
    /// [`BoxError::BoxAlreadyExists`] are returned unchanged.
    pub async fn ensure_present(&self, machine: &Machine) -> Result<bool> {
        let descriptor = machine.descriptor();
        let Some((name, url)) = descriptor.configured() else {
            tracing::debug!(
                target: "boxcache::coordinator",
                "Skipping box handling for '{}': box or box_url not set",
                machine.name()
            );
            return Ok(false);
        };

        if machine.box_entry().is_some() {
            tracing::debug!(
                target: "boxcache::coordinator",
                "Skipping box handling for '{}': box '{}' is already available",
                machine.name(),
                name
            );
            return Ok(false);
        }

        let lock = self.locks.lock_for(&BoxKey::new(name));
        let _guard = lock.lock().await;

        let formats = machine.provider().box_formats();
        if self.catalog.find(name, &formats).await?.is_some() {
            tracing::debug!(
                target: "boxcache::coordinator",
                "Box '{}' appeared while '{}' waited for its lock",
                name,
                machine.name()
            );
            return Ok(true);
        }

        let ca_cert = descriptor
            .download_ca_cert
            .as_deref()
            .map(|path| resolve_against(path, machine.root_path()));

        self.ui.info(&format!(
            "{}: Box '{}' could not be found. Attempting to find and install...",
            machine.name(),
            name
        ));
        self.ui.info(&format!("{}: Box Provider: {}", machine.name(), formats.join(", ")));

        let request = BoxAddRequest {
            name: name.to_string(),
            formats,
            url: url.to_string(),
            ca_cert,
            client_cert: descriptor.download_client_cert.clone(),
            insecure: descriptor.download_insecure,
        };

        match self.fetcher.add(&request).await {
            Ok(entry) => {
                tracing::info!(
                    target: "boxcache::coordinator",
                    "Box '{}' ({}) added for '{}'",
                    entry.name,
                    entry.provider,
                    machine.name()
                );
            }
            Err(e) if is_already_exists(&e) => {
                tracing::debug!(
                    target: "boxcache::coordinator",
                    "Box '{}' was registered concurrently; continuing",
                    name
                );
            }
            Err(e) => return Err(e),
        }

        Ok(true)
    }
}

fn is_already_exists(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<BoxError>().is_some_and(BoxError::is_already_exists))
}
