//! Providers and the box formats they accept.
//!
//! A provider (virtualbox, libvirt, vmware_desktop, ...) normally consumes boxes
//! published under its own name. Some providers accept several formats, which is
//! expressed through [`ProviderOptions::box_format`]. The first format in that list
//! is the one new boxes are registered under.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Options a provider exposes to box handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// Box formats this provider can use, in order of preference.
    ///
    /// When absent, the provider accepts only boxes registered under its own name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_format: Option<Vec<String>>,
}

/// A provider together with its resolved options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    name: String,
    options: ProviderOptions,
}

impl Provider {
    /// Create a provider with explicit options.
    pub fn new(name: impl Into<String>, options: ProviderOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    /// Create a provider using the built-in options for `name`, if any.
    pub fn with_builtin_options(name: impl Into<String>) -> Self {
        let name = name.into();
        let options = builtin_options(&name).unwrap_or_default();
        Self {
            name,
            options,
        }
    }

    /// Resolve a provider by name from layered option tables.
    ///
    /// Tables are consulted in order and the first one that has an entry for
    /// `name` wins. Built-in options apply when no table mentions the provider.
    pub fn resolve(name: &str, layers: &[&HashMap<String, ProviderOptions>]) -> Self {
        let options = layers
            .iter()
            .find_map(|layer| layer.get(name).cloned())
            .or_else(|| builtin_options(name))
            .unwrap_or_default();
        Self::new(name, options)
    }

    /// Provider name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider options.
    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// The box formats to search for and register under.
    ///
    /// Returns the `box_format` override when set and non-empty, otherwise the
    /// provider name alone.
    pub fn box_formats(&self) -> Vec<String> {
        match &self.options.box_format {
            Some(formats) if !formats.is_empty() => formats.clone(),
            _ => vec![self.name.clone()],
        }
    }
}

fn builtin_options(name: &str) -> Option<ProviderOptions> {
    match name {
        "vmware_desktop" => Some(ProviderOptions {
            box_format: Some(vec![
                "vmware_desktop".to_string(),
                "vmware_fusion".to_string(),
                "vmware_workstation".to_string(),
            ]),
        }),
        _ => None,
    }
}
