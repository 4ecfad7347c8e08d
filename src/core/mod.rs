//! Core types for boxcache
//!
//! This module holds the error types shared by every other module:
//! - [`BoxError`] - Enumerated error types covering boxcache failure modes
//! - [`ErrorContext`] - User-friendly error wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to user-friendly format
//!
//! Every operation that can fail returns a `Result`. Errors that callers need
//! to tell apart are [`BoxError`] variants wrapped in [`anyhow::Error`].

pub mod error;

pub use error::{BoxError, ErrorContext, user_friendly_error};
