//! `boxcache up`: make sure every selected machine has its box.
//!
//! Each machine runs on its own tokio task. Machines that share a box wait on
//! the same per-box lock, so the box is downloaded once and the others pick it
//! up from the catalog.

use crate::action::handle_box_url;
use crate::config::GlobalConfig;
use crate::coordinator::BoxCoordinator;
use crate::environment::{Environment, Machine};
use crate::fetch::BoxAdder;
use crate::manifest::find_manifest_with_optional;
use crate::ui::Ui;
use anyhow::{Context, Result};
use clap::Args;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinError;

/// Bring up machines by making sure their boxes are installed.
#[derive(Args)]
pub struct UpCommand {
    /// Machines to bring up (default: all machines in the manifest)
    machines: Vec<String>,

    /// Provider to use instead of each machine's configured provider
    #[arg(long)]
    provider: Option<String>,
}

impl UpCommand {
    /// Run the command.
    ///
    /// # Errors
    ///
    /// Fails on an unknown machine name before any download starts. Otherwise
    /// all machines are processed and the first failure is returned.
    pub async fn execute(
        self,
        manifest_path: Option<PathBuf>,
        config: &GlobalConfig,
        ui: Arc<dyn Ui>,
    ) -> Result<()> {
        let manifest_path = find_manifest_with_optional(manifest_path)?;
        let env = Arc::new(Environment::load(&manifest_path, config)?);

        let names = if self.machines.is_empty() {
            env.machine_names()
        } else {
            for name in &self.machines {
                env.manifest().machine(name)?;
            }
            self.machines
        };
        if names.is_empty() {
            ui.warn(&format!("No machines defined in {}", manifest_path.display()));
            return Ok(());
        }

        let catalog = env.catalog().clone();
        let fetcher = BoxAdder::new(catalog.clone(), Arc::clone(&ui))
            .with_timeout(Some(config.download_timeout()));
        let coordinator = Arc::new(BoxCoordinator::new(catalog, fetcher, Arc::clone(&ui)));

        let handles: Vec<_> = names
            .into_iter()
            .map(|name| {
                let env = Arc::clone(&env);
                let coordinator = Arc::clone(&coordinator);
                let provider = self.provider.clone();
                tokio::spawn(async move {
                    let machine = env.machine(&name, provider.as_deref(), false).await?;
                    handle_box_url(&env, &coordinator, machine).await
                })
            })
            .collect();

        collect_results(join_all(handles).await, ui.as_ref())
    }
}

/// Report every machine's outcome, then return the first failure.
///
/// A panicked task counts as a failure of its machine; the others are still reported.
fn collect_results(
    results: Vec<Result<Result<Arc<Machine>>, JoinError>>,
    ui: &dyn Ui,
) -> Result<()> {
    let mut first_error = None;
    for joined in results {
        match joined.context("Machine task panicked").and_then(|result| result) {
            Ok(machine) => report(&machine, ui),
            Err(e) => {
                if first_error.is_some() {
                    ui.warn(&format!("{e:#}"));
                } else {
                    first_error = Some(e);
                }
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

fn report(machine: &Machine, ui: &dyn Ui) {
    match (machine.box_entry(), machine.descriptor().name.as_deref()) {
        (Some(entry), _) => {
            println!("{}: {} ({})", machine.name(), entry.name, entry.provider);
        }
        (None, Some(name)) if !name.trim().is_empty() => {
            ui.warn(&format!(
                "{}: box '{}' is not installed for {} and no box_url is set",
                machine.name(),
                name,
                machine.provider().name()
            ));
        }
        (None, _) => {
            ui.warn(&format!("{}: no box configured", machine.name()));
        }
    }
}
