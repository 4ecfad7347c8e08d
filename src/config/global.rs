//! Global configuration management.
//!
//! The global configuration lives at `~/.boxcache/config.toml` (overridable with
//! `BOXCACHE_CONFIG` or `--config`) and holds user-wide settings that should not be
//! committed with a project, such as the location of the box catalog.

use crate::constants::{DEFAULT_DOWNLOAD_TIMEOUT_SECS, ENV_CONFIG_PATH, GLOBAL_CONFIG_FILE_NAME};
use crate::provider::ProviderOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// User-wide boxcache settings.
///
/// ```rust,no_run
/// use boxcache_cli::config::GlobalConfig;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = GlobalConfig::load().await?;
/// println!("download timeout: {}s", config.download_timeout_secs);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Directory holding the box catalog. `~` is expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boxes_dir: Option<PathBuf>,

    /// Timeout in seconds for a single box download.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Provider options applied to every project, keyed by provider name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub providers: HashMap<String, ProviderOptions>,
}

const fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            boxes_dir: None,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            providers: HashMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Load global configuration from the default location.
    ///
    /// Returns the default configuration when the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load global configuration from an optional path, falling back to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!(
                target: "boxcache::config",
                "No global config at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Load global configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Save global configuration to a specific file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))?;

        Ok(())
    }

    /// Default path of the global configuration file.
    ///
    /// `BOXCACHE_CONFIG` takes precedence over `~/.boxcache/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            return Ok(PathBuf::from(path));
        }
        Ok(super::get_home_dir()?.join(GLOBAL_CONFIG_FILE_NAME))
    }

    /// Download timeout as a [`std::time::Duration`].
    pub const fn download_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.download_timeout_secs)
    }
}

/// Lazily loads and caches a [`GlobalConfig`].
///
/// The file is read on first access; later accesses reuse the loaded value until
/// [`reload`](Self::reload) is called.
pub struct GlobalConfigManager {
    config: Option<GlobalConfig>,
    path: PathBuf,
}

impl GlobalConfigManager {
    /// Create a manager for the default configuration path.
    ///
    /// # Errors
    ///
    /// Returns an error if the default path cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self {
            config: None,
            path: GlobalConfig::default_path()?,
        })
    }

    /// Create a manager for a custom configuration path.
    #[must_use]
    pub const fn with_path(path: PathBuf) -> Self {
        Self {
            config: None,
            path,
        }
    }

    /// Get the configuration, loading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn get(&mut self) -> Result<&GlobalConfig> {
        if self.config.is_none() {
            self.config = Some(GlobalConfig::load_with_optional(Some(self.path.clone())).await?);
        }

        self.config.as_ref().ok_or_else(|| anyhow::anyhow!("Global config failed to load"))
    }

    /// Discard the cached configuration and load it again.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn reload(&mut self) -> Result<()> {
        self.config = Some(GlobalConfig::load_with_optional(Some(self.path.clone())).await?);
        Ok(())
    }
}
