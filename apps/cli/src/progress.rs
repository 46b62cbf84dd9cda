//! Progress bar for a single transfer

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use resumer_types::TransferEvent;

/// Renders `TransferEvent`s as a percent progress bar
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        Self { bar }
    }

    /// Update the bar from an event
    pub fn handle_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::Started { destination, .. } => {
                let name = destination
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.bar.set_message(name);
            }

            TransferEvent::Progress { percent } => {
                self.bar.set_position(u64::from(*percent));
            }

            TransferEvent::Succeeded => {
                self.bar.set_position(100);
                self.bar.finish_with_message(format!(
                    "{} Download complete",
                    style("✓").green().bold()
                ));
            }

            TransferEvent::Failed { kind } => {
                self.bar.abandon_with_message(format!(
                    "{} Failed: {}",
                    style("✗").red().bold(),
                    kind
                ));
            }

            TransferEvent::Paused => {
                self.bar.abandon_with_message(format!(
                    "{} Paused, run again to resume",
                    style("⏸").yellow()
                ));
            }

            TransferEvent::Canceled => {
                self.bar
                    .abandon_with_message(format!("{} Cancelled", style("○").dim()));
            }
        }
    }

    /// Print a line above the bar
    pub fn println(&self, message: impl AsRef<str>) {
        self.bar.println(message);
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}
