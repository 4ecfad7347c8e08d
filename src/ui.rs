//! User notification sink.
//!
//! Box handling reports what it is doing through the [`Ui`] trait. Messages are
//! fire-and-forget: nothing is returned and a failing terminal never fails an
//! operation. [`ConsoleUi`] is the terminal implementation used by the CLI;
//! [`SilentUi`] discards everything.

use crate::utils::progress::{download_bar, is_progress_disabled};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar};

/// Destination for user-facing messages.
pub trait Ui: Send + Sync {
    /// Informational message.
    fn info(&self, message: &str);

    /// Warning.
    fn warn(&self, message: &str);

    /// Completion of a user-visible step.
    fn success(&self, message: &str);

    /// Progress bar for a download. Hidden unless the implementation renders bars.
    fn download_progress(&self, _label: &str, _total: Option<u64>) -> ProgressBar {
        ProgressBar::hidden()
    }
}

/// Terminal output with colored prefixes and multi-line progress bars.
///
/// Messages go to stderr with the shared [`MultiProgress`] suspended, so they
/// don't tear bars that concurrent downloads are drawing.
#[derive(Debug, Clone)]
pub struct ConsoleUi {
    multi: MultiProgress,
    quiet: bool,
    progress: bool,
}

impl ConsoleUi {
    /// Create a console UI.
    ///
    /// `quiet` suppresses informational messages (warnings still print).
    /// Progress bars are shown only when `progress` is set, the output is not
    /// quiet, and `BOXCACHE_NO_PROGRESS` is unset.
    pub fn new(quiet: bool, progress: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            quiet,
            progress: progress && !quiet && !is_progress_disabled(),
        }
    }

    fn emit(&self, line: String) {
        self.multi.suspend(|| eprintln!("{line}"));
    }
}

impl Ui for ConsoleUi {
    fn info(&self, message: &str) {
        if !self.quiet {
            self.emit(format!("{} {}", "==>".bold(), message));
        }
    }

    fn warn(&self, message: &str) {
        self.emit(format!("{} {}", "warning:".yellow().bold(), message));
    }

    fn success(&self, message: &str) {
        if !self.quiet {
            self.emit(format!("{} {}", "✓".green(), message));
        }
    }

    fn download_progress(&self, label: &str, total: Option<u64>) -> ProgressBar {
        if self.progress {
            self.multi.add(download_bar(label, total))
        } else {
            ProgressBar::hidden()
        }
    }
}

/// Discards all output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentUi;

impl Ui for SilentUi {
    fn info(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}

    fn success(&self, _message: &str) {}
}
