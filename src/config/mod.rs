//! Configuration management for boxcache
//!
//! boxcache reads two kinds of configuration:
//!
//! 1. **Global Configuration** (`~/.boxcache/config.toml`) - user-wide settings such as
//!    the boxes directory, the download timeout and provider options
//! 2. **Project Manifest** (`boxcache.toml`) - the machines of one project, see
//!    [`crate::manifest`]
//!
//! # Global Configuration
//!
//! ```toml
//! boxes_dir = "/data/boxes"
//! download_timeout_secs = 600
//!
//! [providers.libvirt]
//! box_format = ["libvirt", "kvm"]
//! ```
//!
//! A missing file is not an error; defaults apply.
//!
//! # Directory Resolution
//!
//! The boxes directory is taken from, in order:
//! 1. `BOXCACHE_BOXES_DIR`
//! 2. `boxes_dir` in the global configuration
//! 3. `~/.boxcache/boxes`

mod global;

pub use global::{GlobalConfig, GlobalConfigManager};

use crate::constants::{BOXES_DIR_NAME, ENV_BOXES_DIR, HOME_DIR_NAME};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the boxcache home directory (`~/.boxcache`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
    Ok(home.join(HOME_DIR_NAME))
}

/// Get the directory holding the box catalog, creating it if necessary.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined or the
/// directory cannot be created.
pub fn get_boxes_dir(config: &GlobalConfig) -> Result<PathBuf> {
    let dir = if let Ok(dir) = std::env::var(ENV_BOXES_DIR) {
        PathBuf::from(dir)
    } else if let Some(dir) = &config.boxes_dir {
        PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).as_ref())
    } else {
        get_home_dir()?.join(BOXES_DIR_NAME)
    };

    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create boxes directory: {}", dir.display()))?;
    }

    Ok(dir)
}
