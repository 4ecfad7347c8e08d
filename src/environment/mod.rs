//! Project environment: the manifest, the catalog and the machines built from them.
//!
//! [`Environment::machine`] caches one [`Machine`] per `(name, provider)` pair.
//! A machine snapshots the catalog when it is built, so after a box is added the
//! machine must be rebuilt with `force_reload` to see it.

use crate::catalog::{BoxCollection, BoxEntry};
use crate::config::{GlobalConfig, get_boxes_dir};
use crate::coordinator::BoxDescriptor;
use crate::manifest::Manifest;
use crate::provider::{Provider, ProviderOptions};
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A configured machine as seen at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    name: String,
    provider: Provider,
    descriptor: BoxDescriptor,
    root_path: PathBuf,
    box_entry: Option<BoxEntry>,
}

impl Machine {
    /// Create a machine.
    pub fn new(
        name: impl Into<String>,
        provider: Provider,
        descriptor: BoxDescriptor,
        root_path: impl Into<PathBuf>,
        box_entry: Option<BoxEntry>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            descriptor,
            root_path: root_path.into(),
            box_entry,
        }
    }

    /// Machine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider the machine runs on.
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The box this machine asks for.
    pub fn descriptor(&self) -> &BoxDescriptor {
        &self.descriptor
    }

    /// Project root; relative certificate paths resolve against it.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// The installed box backing this machine, if it was in the catalog at load time.
    pub fn box_entry(&self) -> Option<&BoxEntry> {
        self.box_entry.as_ref()
    }
}

/// A loaded project.
#[derive(Debug)]
pub struct Environment {
    root_path: PathBuf,
    manifest: Manifest,
    global_providers: HashMap<String, ProviderOptions>,
    catalog: BoxCollection,
    machines: DashMap<(String, String), Arc<Machine>>,
}

impl Environment {
    /// Create an environment from already-loaded parts.
    pub fn new(
        root_path: impl Into<PathBuf>,
        manifest: Manifest,
        global_providers: HashMap<String, ProviderOptions>,
        catalog: BoxCollection,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            manifest,
            global_providers,
            catalog,
            machines: DashMap::new(),
        }
    }

    /// Load the project whose manifest is at `manifest_path`.
    ///
    /// The project root is the manifest's directory. Boxes live in the directory
    /// chosen by [`get_boxes_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is invalid or the boxes directory cannot
    /// be created.
    pub fn load(manifest_path: &Path, config: &GlobalConfig) -> Result<Self> {
        let manifest = Manifest::load(manifest_path)?;
        let manifest_path = std::path::absolute(manifest_path)
            .with_context(|| format!("Cannot resolve {}", manifest_path.display()))?;
        let root_path = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .context("Manifest path has no parent directory")?;
        let catalog = BoxCollection::new(get_boxes_dir(config)?);
        tracing::debug!(
            target: "boxcache::environment",
            "Loaded project at {} with {} machine(s)",
            root_path.display(),
            manifest.machines.len()
        );
        Ok(Self::new(root_path, manifest, config.providers.clone(), catalog))
    }

    /// Project root directory.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// The project manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The box catalog.
    pub fn catalog(&self) -> &BoxCollection {
        &self.catalog
    }

    /// Names of all configured machines, sorted.
    pub fn machine_names(&self) -> Vec<String> {
        self.manifest.machines.keys().cloned().collect()
    }

    /// Resolve a provider by name, project options first, then global, then built-in.
    pub fn provider(&self, name: &str) -> Provider {
        Provider::resolve(name, &[&self.manifest.providers, &self.global_providers])
    }

    /// Get machine `name` running on `provider` (or its configured provider).
    ///
    /// Machines are cached. With `force_reload` the cached machine is discarded
    /// and rebuilt from the current catalog.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::BoxError::MachineNotFound`] for unknown machines, or
    /// a catalog error while looking up the machine's box.
    pub async fn machine(
        &self,
        name: &str,
        provider: Option<&str>,
        force_reload: bool,
    ) -> Result<Arc<Machine>> {
        let config = self.manifest.machine(name)?;
        let provider_name = provider.unwrap_or_else(|| self.manifest.provider_for(config));
        let key = (name.to_string(), provider_name.to_string());

        if !force_reload {
            if let Some(cached) = self.machines.get(&key) {
                return Ok(Arc::clone(cached.value()));
            }
        }

        let provider = self.provider(provider_name);
        let descriptor = config.descriptor();
        let box_entry = match descriptor.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(box_name) => self.catalog.find(box_name, &provider.box_formats()).await?,
            None => None,
        };

        let machine = Arc::new(Machine::new(name, provider, descriptor, &self.root_path, box_entry));
        if force_reload {
            tracing::debug!(target: "boxcache::environment", "Reloaded machine '{}' ({})", name, provider_name);
        }
        self.machines.insert(key, Arc::clone(&machine));
        Ok(machine)
    }
}
