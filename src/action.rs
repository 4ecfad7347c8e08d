//! Machine bring-up steps.

use crate::catalog::BoxCatalog;
use crate::coordinator::BoxCoordinator;
use crate::environment::{Environment, Machine};
use crate::fetch::BoxFetcher;
use anyhow::Result;
use std::sync::Arc;

/// Make sure `machine`'s box is installed, downloading it from `box_url` if needed.
///
/// Run this before anything uses the machine's box. Returns the machine to
/// continue with: the same one when nothing changed, otherwise a fresh machine
/// reloaded from the environment so it sees the newly added box.
///
/// # Errors
///
/// Returns any error from the coordinator or from reloading the machine.
pub async fn handle_box_url<C: BoxCatalog, F: BoxFetcher>(
    env: &Environment,
    coordinator: &BoxCoordinator<C, F>,
    machine: Arc<Machine>,
) -> Result<Arc<Machine>> {
    if !coordinator.ensure_present(&machine).await? {
        return Ok(machine);
    }
    env.machine(machine.name(), Some(machine.provider().name()), true).await
}
