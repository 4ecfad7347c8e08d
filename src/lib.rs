//! boxcache - fetch-once box provisioning.
//!
//! Development environments describe each machine by the base box it is built
//! from, plus a URL to fetch that box when it isn't installed. When many machines
//! come up at once and share a box, the box must be downloaded exactly once: the
//! first machine fetches it, the others wait and then pick it up from the local
//! catalog.
//!
//! # Architecture Overview
//!
//! ```text
//! cli::up ──> action::handle_box_url ──> coordinator::BoxCoordinator
//!                    │                        │  per-box lock (BoxLockRegistry)
//!                    │                        ├─> catalog::BoxCatalog   find
//!                    │                        └─> fetch::BoxFetcher     add
//!                    └─ reload machine <─ environment::Environment
//! ```
//!
//! ## Core Modules
//!
//! - [`coordinator`] - The fetch-once protocol and the per-box lock registry
//! - [`catalog`] - Directory-backed store of installed boxes
//! - [`fetch`] - Downloading box archives and registering them
//! - [`environment`] - Projects, machines and their cached box lookups
//! - [`action`] - The `handle_box_url` bring-up step
//!
//! ## Supporting Modules
//!
//! - [`cli`] - Command-line interface
//! - [`config`] - Global configuration (`~/.boxcache/config.toml`)
//! - [`manifest`] - Project manifest (`boxcache.toml`)
//! - [`provider`] - Providers and the box formats they accept
//! - [`ui`] - User-facing messages and progress bars
//! - [`core`] - Error types and user-friendly error rendering
//! - [`utils`] - Path and progress helpers
//!
//! # Quick Start
//!
//! ```toml
//! # boxcache.toml
//! [machines.web]
//! box = "base"
//! box_url = "https://boxes.example.com/base.box"
//!
//! [machines.db]
//! box = "base"
//! box_url = "https://boxes.example.com/base.box"
//! ```
//!
//! ```bash
//! # Downloads base.box once, then both machines use it
//! boxcache up
//! ```

pub mod action;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod core;
pub mod environment;
pub mod fetch;
pub mod manifest;
pub mod provider;
pub mod ui;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
