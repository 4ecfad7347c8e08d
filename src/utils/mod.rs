//! Cross-cutting utilities: path resolution and progress reporting.

pub mod path;
pub mod progress;

pub use path::resolve_against;
