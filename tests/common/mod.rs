//! Common test utilities for boxcache integration tests

// Not every test file uses every helper.
#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use boxcache_cli::constants::{ENV_BOXES_DIR, ENV_CONFIG_PATH, ENV_NO_PROGRESS};
use boxcache_cli::coordinator::BoxDescriptor;
use boxcache_cli::environment::Machine;
use boxcache_cli::provider::Provider;
use boxcache_cli::test_utils::ManifestFixture;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A project directory with its own box catalog and global config.
///
/// Commands run through [`TestProject::boxcache`] see only this project's
/// directories; nothing is read from or written to the user's home.
pub struct TestProject {
    _temp: TempDir,
    project: PathBuf,
    boxes: PathBuf,
    config: PathBuf,
    sources: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let project = temp.path().join("project");
        let boxes = temp.path().join("boxes");
        let sources = temp.path().join("sources");
        std::fs::create_dir_all(&project)?;
        std::fs::create_dir_all(&sources)?;
        Ok(Self {
            config: temp.path().join("config.toml"),
            _temp: temp,
            project,
            boxes,
            sources,
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project
    }

    pub fn boxes_path(&self) -> &Path {
        &self.boxes
    }

    pub fn config_path(&self) -> &Path {
        &self.config
    }

    pub fn write_manifest(&self, manifest: &ManifestFixture) -> Result<PathBuf> {
        manifest.write_to(&self.project)
    }

    pub fn write_config(&self, content: &str) -> Result<()> {
        std::fs::write(&self.config, content)?;
        Ok(())
    }

    /// Create a box archive to add from, returning its absolute path.
    pub fn create_box_file(&self, file_name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.sources.join(file_name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// The `boxcache` binary, run inside the project directory.
    pub fn boxcache(&self) -> Command {
        let mut cmd = Command::cargo_bin("boxcache").unwrap();
        cmd.current_dir(&self.project)
            .env(ENV_BOXES_DIR, &self.boxes)
            .env(ENV_CONFIG_PATH, &self.config)
            .env(ENV_NO_PROGRESS, "1")
            .env_remove("RUST_LOG");
        cmd
    }
}

/// A machine on `provider` asking for box `name` from `url`.
pub fn machine(machine_name: &str, name: &str, url: &str, provider: &str) -> Machine {
    Machine::new(
        machine_name,
        Provider::with_builtin_options(provider),
        BoxDescriptor {
            name: Some(name.to_string()),
            url: Some(url.to_string()),
            ..BoxDescriptor::default()
        },
        "/project",
        None,
    )
}
