//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche dei batch.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking statistiche del job (target riusciti, falliti, byte archiviati)
//! - Report finali con statistiche aggregate
//! - Spinner per operazioni indeterminate (es. probe delle dimensioni)
//!
//! ## Componenti principali:
//! - `ProgressManager`: Gestisce la progress bar principale (nascosta in modalità JSON)
//! - `BatchStats`: Traccia statistiche cumulative
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================>---------------] 12/20 (60%) [OK] image_12.png
//! ```

use crate::utils::format_size;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages progress reporting for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager; `hidden` suppresses all drawing
    pub fn new(total_targets: u64, hidden: bool) -> Self {
        if hidden {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_targets);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Stop the bar where it is, leaving the failure message visible
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str, hidden: bool) -> ProgressBar {
        if hidden {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

/// Statistics for one batch job
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_bytes: u64,
}

impl BatchStats {
    pub fn new(targets: usize) -> Self {
        Self {
            targets,
            ..Default::default()
        }
    }

    pub fn add_success(&mut self, bytes: u64) {
        self.succeeded += 1;
        self.total_bytes += bytes;
    }

    pub fn add_failure(&mut self) {
        self.failed += 1;
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn success_percent(&self) -> f64 {
        if self.targets > 0 {
            (self.succeeded as f64 / self.targets as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Targets: {} | Archived: {} | Failed: {} | Payload: {} ({:.0}% succeeded)",
            self.targets,
            self.succeeded,
            self.failed,
            format_size(self.total_bytes),
            self.success_percent()
        )
    }
}
