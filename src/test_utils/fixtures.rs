//! Sample `boxcache.toml` manifests.

use crate::constants::MANIFEST_FILE_NAME;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Test fixture for creating boxcache.toml files
#[derive(Clone, Debug)]
pub struct ManifestFixture {
    pub content: String,
}

impl ManifestFixture {
    /// One machine named `default` using box `box_name` from `box_url`.
    pub fn single(box_name: &str, box_url: &str) -> Self {
        Self::machines(&["default"], box_name, box_url)
    }

    /// Several machines that all use the same box.
    pub fn machines(names: &[&str], box_name: &str, box_url: &str) -> Self {
        let mut content = String::new();
        for name in names {
            let _ = writeln!(content, "[machines.{name}]");
            let _ = writeln!(content, "box = '{box_name}'");
            let _ = writeln!(content, "box_url = '{box_url}'\n");
        }
        Self {
            content,
        }
    }

    /// A machine with a box but no URL; it never triggers a download.
    pub fn without_url(box_name: &str) -> Self {
        Self {
            content: format!("[machines.default]\nbox = '{box_name}'\n"),
        }
    }

    /// Content that is not valid TOML.
    pub fn invalid_syntax() -> Self {
        Self {
            content: "[machines.default\nbox = ".to_string(),
        }
    }

    /// Append raw TOML.
    #[must_use]
    pub fn with(mut self, extra: &str) -> Self {
        self.content.push('\n');
        self.content.push_str(extra);
        self
    }

    /// Write the manifest as `boxcache.toml` in `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE_NAME);
        std::fs::write(&path, &self.content)
            .with_context(|| format!("Failed to write manifest fixture {}", path.display()))?;
        Ok(path)
    }
}
