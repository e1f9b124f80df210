//! Terminal spinners for long-running CLI operations.
//!
//! Spinners are hidden when `GHPUSH_NO_PROGRESS` is set, when `--quiet` was
//! given, or when stderr is not a terminal, so scripted output stays clean.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Environment variable that disables spinners.
pub const NO_PROGRESS_ENV: &str = "GHPUSH_NO_PROGRESS";

fn progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some() || !std::io::stderr().is_terminal()
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
}

/// An indeterminate spinner with a message.
pub struct Spinner {
    inner: ProgressBar,
}

impl Spinner {
    /// Start a spinner, or a hidden one when `quiet` or progress is disabled.
    #[must_use]
    pub fn start(message: impl Into<String>, quiet: bool) -> Self {
        let inner = if quiet || progress_disabled() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        inner.set_message(message.into());
        Self {
            inner,
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.inner.set_message(message.into());
    }

    /// Remove the spinner line.
    pub fn finish(&self) {
        self.inner.finish_and_clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.inner.is_finished() {
            self.inner.finish_and_clear();
        }
    }
}
