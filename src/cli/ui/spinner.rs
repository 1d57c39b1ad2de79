use std::future::Future;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Async progress spinner for long-running operations.
#[derive(Debug)]
pub(crate) struct Spinner {
    enabled: bool,
}

impl Spinner {
    /// Creates a spinner with explicit enable/disable control.
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Executes an operation while rendering an indefinite spinner when enabled.
    pub(crate) async fn with_spinner<F, Fut, T>(&self, message: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.enabled {
            return operation().await;
        }

        let spinner = new_spinner(message);
        let result = operation().await;
        spinner.finish_and_clear();
        result
    }

    /// Starts a spinner the caller updates and finishes manually.
    pub(crate) fn start(&self, message: &str) -> SpinnerHandle {
        if !self.enabled {
            return SpinnerHandle(None);
        }
        SpinnerHandle(Some(new_spinner(message)))
    }
}

/// A live spinner; dropped or finished, it clears itself from the terminal.
#[derive(Debug)]
pub(crate) struct SpinnerHandle(Option<ProgressBar>);

impl SpinnerHandle {
    pub(crate) fn update(&self, message: String) {
        if let Some(spinner) = &self.0 {
            spinner.set_message(message);
        }
    }

    pub(crate) fn finish(self) {
        if let Some(spinner) = self.0 {
            spinner.finish_and_clear();
        }
    }
}

fn new_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(90));
    spinner
}

fn spinner_style() -> ProgressStyle {
    let base_style = ProgressStyle::default_spinner();
    let templated =
        ProgressStyle::with_template("{spinner:.cyan.bold} {msg}").unwrap_or(base_style);
    templated.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
}
