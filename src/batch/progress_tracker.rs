//! # Progress Tracking Module
//!
//! Tracker thread-safe condiviso dai task di un batch.
//! Gestisce sia output JSON che progress bar tradizionale.

use crate::archive::ArchiveEntry;
use crate::error::AssetError;
use crate::fetch::abbreviate;
use crate::json_output::JsonMessage;
use crate::progress::{BatchStats, ProgressManager};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct ProgressTracker {
    pub total_targets: usize,
    json_output: bool,
    stats: Arc<Mutex<BatchStats>>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    pub fn new(total_targets: usize, json_output: bool) -> Self {
        Self {
            total_targets,
            json_output,
            stats: Arc::new(Mutex::new(BatchStats::new(total_targets))),
            progress_manager: ProgressManager::new(total_targets as u64, json_output),
        }
    }

    pub fn handle_target_start(&self, index: usize, identity: &str) {
        if self.json_output {
            JsonMessage::target_start(identity, index, self.total_targets).emit();
        }
    }

    /// Records one finished target and emits the matching events
    pub async fn handle_target_completion(
        &self,
        index: usize,
        identity: &str,
        result: &Result<ArchiveEntry, AssetError>,
    ) {
        match result {
            Ok(entry) => {
                let bytes = entry.bytes.len() as u64;
                self.stats.lock().await.add_success(bytes);

                if self.json_output {
                    JsonMessage::target_complete(identity, index, Some(entry.name.clone()), bytes, None)
                        .emit();
                }
                self.progress_manager.update(&format!("[OK] {}", entry.name));
            }
            Err(e) => {
                self.stats.lock().await.add_failure();

                if self.json_output {
                    JsonMessage::target_complete(identity, index, None, 0, Some(e.to_string())).emit();
                }
                self.progress_manager
                    .update(&format!("[ERROR] {}", abbreviate(identity)));
            }
        }
    }

    /// Finalizza progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    /// Interrompe la progress bar dopo un errore fatale del job
    pub fn abandon(&self, reason: &str) {
        self.progress_manager.abandon(reason);
    }

    pub fn is_finished(&self) -> bool {
        self.progress_manager.is_finished()
    }

    /// Ottieni statistiche per report finale
    pub async fn get_stats(&self) -> BatchStats {
        self.stats.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completions_are_counted() {
        let tracker = ProgressTracker::new(3, false);
        let ok: Result<ArchiveEntry, AssetError> = Ok(ArchiveEntry {
            name: "image_1.png".to_string(),
            bytes: vec![0; 10],
        });
        let failed: Result<ArchiveEntry, AssetError> = Err(AssetError::Decode {
            identity: "x".to_string(),
            reason: "bad".to_string(),
        });

        tracker.handle_target_completion(0, "a", &ok).await;
        tracker.clone().handle_target_completion(1, "x", &failed).await;
        tracker.handle_target_completion(2, "c", &ok).await;

        let stats = tracker.get_stats().await;
        assert_eq!(stats.targets, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_bytes, 20);
    }
}
