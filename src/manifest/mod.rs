//! Project manifest (`boxcache.toml`) parsing and validation.
//!
//! The manifest describes the machines of a project and the box each one is
//! built from:
//!
//! ```toml
//! [defaults]
//! provider = "virtualbox"
//!
//! [machines.web]
//! box = "base"
//! box_url = "https://boxes.example.com/base.box"
//! box_download_ca_cert = "certs/ca.pem"   # relative to the manifest directory
//!
//! [machines.db]
//! box = "base"
//! provider = "vmware_desktop"
//!
//! [providers.vmware_desktop]
//! box_format = ["vmware_desktop", "vmware_fusion"]
//! ```
//!
//! A machine without `box_url` never triggers a download: its box must already be
//! in the catalog. A machine without a provider uses `defaults.provider`, then
//! [`DEFAULT_PROVIDER`].

mod helpers;

pub use helpers::{find_manifest, find_manifest_from, find_manifest_with_optional};

use crate::coordinator::BoxDescriptor;
use crate::core::BoxError;
use crate::provider::ProviderOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Provider used when neither the machine nor `[defaults]` names one.
pub const DEFAULT_PROVIDER: &str = "virtualbox";

/// Parsed `boxcache.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Project-wide defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Machines keyed by name. Ordered so `boxcache up` processes them deterministically.
    #[serde(default)]
    pub machines: BTreeMap<String, MachineConfig>,

    /// Project-level provider options. These win over the global configuration.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub providers: HashMap<String, ProviderOptions>,
}

/// The `[defaults]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Provider for machines that don't set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Box settings for a single machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Catalog name of the box.
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub box_name: Option<String>,

    /// Where to fetch the box from when it is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_url: Option<String>,

    /// Provider for this machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// CA certificate used to verify the download server. Relative to the manifest directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_download_ca_cert: Option<PathBuf>,

    /// Client certificate (PEM with certificate and key) presented to the download server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_download_client_cert: Option<PathBuf>,

    /// Skip TLS certificate verification for the download.
    #[serde(default)]
    pub box_download_insecure: bool,
}

impl MachineConfig {
    /// The box descriptor this machine asks for.
    pub fn descriptor(&self) -> BoxDescriptor {
        BoxDescriptor {
            name: self.box_name.clone(),
            url: self.box_url.clone(),
            download_ca_cert: self.box_download_ca_cert.clone(),
            download_client_cert: self.box_download_client_cert.clone(),
            download_insecure: self.box_download_insecure,
        }
    }
}

impl Manifest {
    /// Load and validate a manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns [`BoxError::ManifestParseError`] for invalid TOML and
    /// [`BoxError::ManifestValidationError`] for an invalid configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest = Self::parse(&content).map_err(|e| {
            match e.downcast::<toml::de::Error>() {
                Ok(toml_err) => anyhow::Error::from(BoxError::ManifestParseError {
                    file: path.display().to_string(),
                    reason: toml_err.to_string(),
                }),
                Err(other) => other,
            }
        })?;
        Ok(manifest)
    }

    /// Parse and validate manifest content.
    ///
    /// # Errors
    ///
    /// Returns the TOML error or a [`BoxError::ManifestValidationError`].
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the manifest for configurations that can never work.
    ///
    /// # Errors
    ///
    /// Returns [`BoxError::ManifestValidationError`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (name, machine) in &self.machines {
            if name.trim().is_empty() {
                return Err(BoxError::ManifestValidationError {
                    reason: "machine names must not be empty".to_string(),
                }
                .into());
            }
            if machine.box_url.is_some() && machine.box_name.is_none() {
                return Err(BoxError::ManifestValidationError {
                    reason: format!("machine '{name}' sets box_url but no box"),
                }
                .into());
            }
            if machine.provider.as_deref().is_some_and(|p| p.trim().is_empty()) {
                return Err(BoxError::ManifestValidationError {
                    reason: format!("machine '{name}' has an empty provider"),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Look up a machine by name.
    ///
    /// # Errors
    ///
    /// Returns [`BoxError::MachineNotFound`] if the machine isn't defined.
    pub fn machine(&self, name: &str) -> Result<&MachineConfig, BoxError> {
        self.machines.get(name).ok_or_else(|| BoxError::MachineNotFound {
            name: name.to_string(),
        })
    }

    /// The provider a machine runs on: its own setting, then `[defaults]`, then [`DEFAULT_PROVIDER`].
    pub fn provider_for<'a>(&'a self, machine: &'a MachineConfig) -> &'a str {
        machine
            .provider
            .as_deref()
            .or(self.defaults.provider.as_deref())
            .unwrap_or(DEFAULT_PROVIDER)
    }
}
