//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Longest build-output line shown next to the spinner
const MAX_DETAIL_WIDTH: usize = 72;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    bar: Option<ProgressBar>,
    message: String,
}

impl TaskSpinner {
    /// Create a new spinner (nothing is shown until `start`)
    pub fn new(ctx: &UiContext) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                bar.set_style(spinner_style);
            }
            bar
        });

        Self {
            bar,
            message: String::new(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        self.message = message.to_string();

        match self.bar {
            Some(ref bar) => {
                bar.set_message(message.to_string());
                bar.enable_steady_tick(Duration::from_millis(100));
            }
            None => eprintln!("{} {}", style("...").dim(), message),
        }
    }

    /// Show a line of tool output under the current message
    pub fn detail(&self, line: &str) {
        if let Some(ref bar) = self.bar {
            let line = truncate(line.trim(), MAX_DETAIL_WIDTH);
            bar.set_message(format!("{} {}", self.message, style(line).dim()));
        }
        // Plain mode leaves tool output to the debug log
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        self.finish();
        if self.bar.is_some() {
            eprintln!("{} {}", style("✓").green(), message);
        } else {
            eprintln!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        self.finish();
        if self.bar.is_some() {
            eprintln!("{} {}", style("✗").red(), message);
        } else {
            eprintln!("{} {}", style("[FAIL]").red(), message);
        }
    }

    /// Stop without printing anything
    pub fn clear(&mut self) {
        self.finish();
    }

    fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Cut `line` to at most `max` characters, marking the cut
fn truncate(line: &str, max: usize) -> String {
    if line.chars().count() <= max {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}
