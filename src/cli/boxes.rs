//! `boxcache box`: inspect and edit the box catalog directly.

use crate::catalog::BoxCollection;
use crate::config::{GlobalConfig, get_boxes_dir};
use crate::core::BoxError;
use crate::fetch::{BoxAddRequest, BoxAdder, BoxFetcher};
use crate::manifest::DEFAULT_PROVIDER;
use crate::provider::Provider;
use crate::ui::Ui;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Manage installed boxes.
#[derive(Args)]
pub struct BoxCommand {
    #[command(subcommand)]
    command: BoxSubcommand,
}

#[derive(Subcommand)]
enum BoxSubcommand {
    /// List installed boxes
    List,

    /// Download a box and add it to the catalog
    Add {
        /// Name to register the box under
        name: String,

        /// URL or local path of the box archive
        url: String,

        /// Provider the box is for
        #[arg(long, default_value = DEFAULT_PROVIDER)]
        provider: String,

        /// CA certificate used to verify the download server
        #[arg(long)]
        ca_cert: Option<PathBuf>,

        /// Client certificate (PEM with key) presented to the download server
        #[arg(long)]
        client_cert: Option<PathBuf>,

        /// Do not verify the server's TLS certificate
        #[arg(long)]
        insecure: bool,
    },

    /// Remove a box from the catalog
    Remove {
        /// Box name
        name: String,

        /// Only remove the box for this provider
        #[arg(long)]
        provider: Option<String>,
    },
}

impl BoxCommand {
    /// Run the subcommand.
    ///
    /// # Errors
    ///
    /// Returns catalog and download errors, including
    /// [`BoxError::BoxAlreadyExists`] when adding a box that is installed.
    pub async fn execute(self, config: &GlobalConfig, ui: Arc<dyn Ui>) -> Result<()> {
        let collection = BoxCollection::new(get_boxes_dir(config)?);

        match self.command {
            BoxSubcommand::List => list(&collection).await,
            BoxSubcommand::Add {
                name,
                url,
                provider,
                ca_cert,
                client_cert,
                insecure,
            } => {
                let formats = Provider::resolve(&provider, &[&config.providers]).box_formats();
                let request = BoxAddRequest {
                    name,
                    formats,
                    url,
                    ca_cert,
                    client_cert,
                    insecure,
                };
                BoxAdder::new(collection, ui)
                    .with_timeout(Some(config.download_timeout()))
                    .add(&request)
                    .await?;
                Ok(())
            }
            BoxSubcommand::Remove {
                name,
                provider,
            } => remove(&collection, &name, provider.as_deref(), ui.as_ref()).await,
        }
    }
}

async fn list(collection: &BoxCollection) -> Result<()> {
    let entries = collection.all().await?;
    if entries.is_empty() {
        println!("No boxes installed");
        return Ok(());
    }

    for entry in entries {
        println!("{} ({})", entry.name, entry.provider);
    }
    Ok(())
}

async fn remove(
    collection: &BoxCollection,
    name: &str,
    provider: Option<&str>,
    ui: &dyn Ui,
) -> Result<()> {
    let providers: Vec<String> = match provider {
        Some(provider) => vec![provider.to_string()],
        None => collection
            .all()
            .await?
            .into_iter()
            .filter(|entry| entry.name == name)
            .map(|entry| entry.provider)
            .collect(),
    };
    if providers.is_empty() {
        return Err(BoxError::BoxNotFound {
            name: name.to_string(),
            providers: "any provider".to_string(),
        }
        .into());
    }

    for provider in providers {
        collection.remove(name, &provider).await?;
        ui.success(&format!("Removed box '{name}' ({provider})"));
    }
    Ok(())
}
