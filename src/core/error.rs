//! Error handling for boxcache
//!
//! This module provides the error types and user-facing error reporting for
//! boxcache. The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can match on specific failures
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`BoxError`] - Enumerated error types for the failure cases boxcache knows about
//! - [`ErrorContext`] - Wrapper that adds details and suggestions for display
//!
//! Application code returns [`anyhow::Result`] and wraps a [`BoxError`] where a
//! caller may need to recognize the failure. The box coordinator, for example,
//! downcasts fetch errors to find [`BoxError::BoxAlreadyExists`] and treats it
//! as a lost race rather than a failure.
//!
//! # Examples
//!
//! ```rust,no_run
//! use boxcache_cli::core::{BoxError, user_friendly_error};
//!
//! let error = anyhow::Error::from(BoxError::ManifestNotFound);
//! let ctx = user_friendly_error(error);
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for boxcache operations.
///
/// Variants carry the values needed to render a useful message. `IoError` and
/// `TomlError` are converted automatically from their source errors.
#[derive(Error, Debug)]
pub enum BoxError {
    /// A box with this name and provider is already registered in the catalog.
    ///
    /// Raised by the catalog when registration races with another writer. The
    /// box coordinator absorbs this variant because the desired end state, box
    /// present, has been reached.
    #[error("Box '{name}' with provider '{provider}' already exists")]
    BoxAlreadyExists {
        /// Box name
        name: String,
        /// Provider format the box is registered under
        provider: String,
    },

    /// No box with this name matches any of the requested provider formats.
    #[error("Box '{name}' not found for provider(s): {providers}")]
    BoxNotFound {
        /// Box name
        name: String,
        /// Comma-separated provider formats that were searched
        providers: String,
    },

    /// Downloading the box archive failed.
    #[error("Failed to download box from {url}")]
    DownloadFailed {
        /// Source URL of the box
        url: String,
        /// Reason reported by the transport
        reason: String,
    },

    /// The box URL uses a scheme boxcache cannot fetch from.
    #[error("Unsupported box URL: {url}")]
    UnsupportedUrl {
        /// The offending URL
        url: String,
    },

    /// Configuration is present but invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// No `boxcache.toml` was found in the current directory or its parents.
    #[error("Manifest file boxcache.toml not found in current directory or any parent directory")]
    ManifestNotFound,

    /// The manifest could not be parsed.
    #[error("Invalid manifest file syntax in {file}")]
    ManifestParseError {
        /// Path of the manifest
        file: String,
        /// Parser message
        reason: String,
    },

    /// The manifest parsed but describes an invalid configuration.
    #[error("Manifest validation failed: {reason}")]
    ManifestValidationError {
        /// Description of the problem
        reason: String,
    },

    /// A machine was requested that the manifest does not define.
    #[error("Machine '{name}' is not defined in the manifest")]
    MachineNotFound {
        /// Requested machine name
        name: String,
    },

    /// IO error from the standard library.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl BoxError {
    /// Returns true for the benign "someone else already registered it" race.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::BoxAlreadyExists { .. })
    }
}

impl Clone for BoxError {
    fn clone(&self) -> Self {
        match self {
            Self::BoxAlreadyExists {
                name,
                provider,
            } => Self::BoxAlreadyExists {
                name: name.clone(),
                provider: provider.clone(),
            },
            Self::BoxNotFound {
                name,
                providers,
            } => Self::BoxNotFound {
                name: name.clone(),
                providers: providers.clone(),
            },
            Self::DownloadFailed {
                url,
                reason,
            } => Self::DownloadFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::UnsupportedUrl {
                url,
            } => Self::UnsupportedUrl {
                url: url.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::ManifestNotFound => Self::ManifestNotFound,
            Self::ManifestParseError {
                file,
                reason,
            } => Self::ManifestParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ManifestValidationError {
                reason,
            } => Self::ManifestValidationError {
                reason: reason.clone(),
            },
            Self::MachineNotFound {
                name,
            } => Self::MachineNotFound {
                name: name.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// When displayed, errors show the main message in red, optional details in
/// yellow, and an optional suggestion in green.
///
/// ```rust,no_run
/// use boxcache_cli::core::{BoxError, ErrorContext};
///
/// let context = ErrorContext::new(BoxError::ManifestNotFound)
///     .with_suggestion("Create a boxcache.toml file in your project directory");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: BoxError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: BoxError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with suggestions.
///
/// Recognizes [`BoxError`] anywhere in the error chain, common
/// [`std::io::Error`] kinds and [`toml::de::Error`]. Anything else is rendered
/// with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(box_error) = error.chain().find_map(|e| e.downcast_ref::<BoxError>()) {
        let mut ctx = create_error_context(box_error.clone());
        if ctx.details.is_none() && error.chain().count() > 1 {
            ctx.details = Some(error.to_string());
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(BoxError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check ownership and permissions of the boxes directory");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(BoxError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(BoxError::ManifestParseError {
            file: "boxcache.toml".to_string(),
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax. Verify quotes, brackets, and table headers");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(BoxError::Other {
        message,
    })
}

fn create_error_context(error: BoxError) -> ErrorContext {
    let (suggestion, details) = match &error {
        BoxError::ManifestNotFound => (
            Some("Create a boxcache.toml file in your project directory, or pass --manifest-path".to_string()),
            Some("boxcache looks for boxcache.toml in the current directory and parent directories".to_string()),
        ),
        BoxError::ManifestParseError { file, .. } => (
            Some(format!(
                "Check the TOML syntax in {file}. Common issues: missing quotes, unmatched brackets"
            )),
            None,
        ),
        BoxError::MachineNotFound { .. } => (
            Some("Define the machine under [machines.<name>] in boxcache.toml".to_string()),
            None,
        ),
        BoxError::BoxNotFound { name, .. } => (
            Some(format!(
                "Run 'boxcache box list' to see installed boxes, or add '{name}' with 'boxcache box add'"
            )),
            None,
        ),
        BoxError::BoxAlreadyExists { name, provider } => (
            Some(format!("Remove it first with 'boxcache box remove {name} --provider {provider}'")),
            None,
        ),
        BoxError::DownloadFailed { reason, .. } => (
            Some("Check the box URL, your network connection, and any CA or client certificate settings".to_string()),
            Some(reason.clone()),
        ),
        BoxError::UnsupportedUrl { .. } => (
            Some("Use an http://, https://, or file:// URL, or a path to a local .box file".to_string()),
            None,
        ),
        _ => (None, None),
    };

    ErrorContext {
        error,
        suggestion,
        details,
    }
}
