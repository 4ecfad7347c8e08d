//! Path helpers.

use std::path::{Path, PathBuf};

/// Resolve `path` against `root`, expanding a leading `~` first.
///
/// Absolute paths are returned unchanged (after tilde expansion).
pub fn resolve_against(path: &Path, root: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}
