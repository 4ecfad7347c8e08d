//! Command-line interface for boxcache.
//!
//! # Available Commands
//!
//! - `up` - Make sure every machine's box is installed, downloading missing ones
//! - `box list` - List installed boxes
//! - `box add` - Add a box from a URL or local file
//! - `box remove` - Remove an installed box
//!
//! # Command Usage Patterns
//!
//! ```bash
//! # Fetch the boxes for all machines in ./boxcache.toml
//! boxcache up
//!
//! # Only some machines, forcing a provider
//! boxcache up web db --provider libvirt
//!
//! # Manage the catalog directly
//! boxcache box add base https://boxes.example.com/base.box
//! boxcache box list
//! boxcache box remove base --provider virtualbox
//! ```
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - debug logging
//! - `--quiet` / `-q` - only errors
//! - `--config` / `-c` - alternate global config file
//! - `--manifest-path` - project manifest instead of searching upwards
//! - `--no-progress` - disable download progress bars
//!
//! `RUST_LOG` overrides the log level chosen by `--verbose` and `--quiet`.

mod boxes;
mod up;


use crate::config::{GlobalConfig, GlobalConfigManager};
use crate::ui::{ConsoleUi, Ui};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Suppress informational output.
    pub quiet: bool,

    /// Disable progress bars.
    pub no_progress: bool,

    /// Alternate global config file.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the tracing subscriber. Later calls are no-ops.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Load the global configuration this invocation uses.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but is invalid.
    pub async fn load_global(&self) -> Result<GlobalConfig> {
        let mut manager = match &self.config_path {
            Some(path) => GlobalConfigManager::with_path(path.clone()),
            None => GlobalConfigManager::new()?,
        };
        Ok(manager.get().await?.clone())
    }
}

/// Main CLI structure for boxcache.
#[derive(Parser)]
#[command(
    name = "boxcache",
    about = "Fetch-once box provisioning for development machines",
    version,
    long_about = "boxcache makes sure the base box every machine in a project needs is installed, \
                  downloading each missing box exactly once even when many machines ask for it at the same time."
)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to boxcache.toml (default: search upwards from the current directory)
    #[arg(long, global = true)]
    manifest_path: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Make sure each machine's box is installed
    Up(up::UpCommand),

    /// Manage installed boxes
    Box(boxes::BoxCommand),
}

impl Cli {
    /// Run the parsed command.
    ///
    /// # Errors
    ///
    /// Returns the command's error; `main` renders it with
    /// [`user_friendly_error`](crate::core::user_friendly_error).
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Derive [`CliConfig`] from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: log_level.to_string(),
            quiet: self.quiet,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Run the parsed command with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let global = config.load_global().await?;
        let ui: Arc<dyn Ui> = Arc::new(ConsoleUi::new(config.quiet, !config.no_progress));

        match self.command {
            Commands::Up(cmd) => cmd.execute(self.manifest_path, &global, ui).await,
            Commands::Box(cmd) => cmd.execute(&global, ui).await,
        }
    }
}
