//! Progress indicators for box downloads.
//!
//! Downloads report byte progress through `indicatif` bars. Bars are hidden when
//! `BOXCACHE_NO_PROGRESS` is set, so scripts and CI get clean output.

use crate::constants::ENV_NO_PROGRESS;
use indicatif::{ProgressBar, ProgressStyle};

/// Checks if progress bars should be disabled.
pub fn is_progress_disabled() -> bool {
    std::env::var(ENV_NO_PROGRESS).is_ok()
}

/// Create a download bar for `label`.
///
/// With a known `total` the bar shows bytes and ETA; otherwise a spinner with the
/// byte count is shown.
pub fn download_bar(label: &str, total: Option<u64>) -> ProgressBar {
    let bar = match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(bytes_style());
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar
        }
    };
    bar.set_prefix(label.to_string());
    bar
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
