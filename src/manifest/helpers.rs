//! Manifest discovery helpers.

use crate::constants::MANIFEST_FILE_NAME;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Find `boxcache.toml` by searching the current directory and its parents.
///
/// # Errors
///
/// Returns [`crate::core::BoxError::ManifestNotFound`] if no manifest exists up to
/// the filesystem root, or an error if the current directory is unavailable.
pub fn find_manifest() -> Result<PathBuf> {
    let current = std::env::current_dir().context("Cannot determine current working directory")?;
    find_manifest_from(current)
}

/// Use an explicit manifest path if given, otherwise search from the current directory.
///
/// # Errors
///
/// Returns [`crate::core::BoxError::ManifestNotFound`] if the explicit path doesn't
/// exist or the search finds nothing.
pub fn find_manifest_with_optional(explicit_path: Option<PathBuf>) -> Result<PathBuf> {
    match explicit_path {
        Some(path) => {
            if path.exists() {
                Ok(path)
            } else {
                Err(crate::core::BoxError::ManifestNotFound.into())
            }
        }
        None => find_manifest(),
    }
}

/// Find `boxcache.toml` by walking up from `current` until the filesystem root.
///
/// # Errors
///
/// Returns [`crate::core::BoxError::ManifestNotFound`] wrapped in an [`anyhow::Error`]
/// if no manifest is found.
pub fn find_manifest_from(mut current: PathBuf) -> Result<PathBuf> {
    loop {
        let manifest_path = current.join(MANIFEST_FILE_NAME);
        if manifest_path.exists() {
            return Ok(manifest_path);
        }

        if !current.pop() {
            return Err(crate::core::BoxError::ManifestNotFound.into());
        }
    }
}
