//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout per ogni evento del batch
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio di un job batch
//! - `target_start`: Inizio elaborazione di un target
//! - `target_complete`: Fine elaborazione di un target (entry o errore)
//! - `complete`: Fine del job con archivio e statistiche finali
//! - `error`: Errore fatale

use crate::batch::{BatchOperation, JobState};
use crate::config::Config;
use crate::progress::BatchStats;
use serde::{Deserialize, Serialize};

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del job
    #[serde(rename = "start")]
    Start {
        operation: String,
        total_targets: usize,
        config: JsonConfig,
    },

    /// Inizio elaborazione di un target
    #[serde(rename = "target_start")]
    TargetStart {
        identity: String,
        index: usize,
        total: usize,
    },

    /// Fine elaborazione di un target
    #[serde(rename = "target_complete")]
    TargetComplete {
        identity: String,
        index: usize,
        entry: Option<String>,
        bytes: u64,
        error: Option<String>,
    },

    /// Job completato
    #[serde(rename = "complete")]
    Complete {
        operation: String,
        state: String,
        archive: Option<String>,
        targets: usize,
        succeeded: usize,
        failed: usize,
        total_bytes: u64,
        duration_seconds: f64,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonConfig {
    pub workers: usize,
    pub probe_workers: usize,
    pub archive_folder: Option<String>,
    pub enforce_cross_origin: bool,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(operation: BatchOperation, total_targets: usize, config: JsonConfig) -> Self {
        Self::Start {
            operation: operation.to_string(),
            total_targets,
            config,
        }
    }

    pub fn target_start(identity: &str, index: usize, total: usize) -> Self {
        Self::TargetStart {
            identity: identity.to_string(),
            index,
            total,
        }
    }

    pub fn target_complete(
        identity: &str,
        index: usize,
        entry: Option<String>,
        bytes: u64,
        error: Option<String>,
    ) -> Self {
        Self::TargetComplete {
            identity: identity.to_string(),
            index,
            entry,
            bytes,
            error,
        }
    }

    pub fn complete(
        operation: BatchOperation,
        state: JobState,
        archive: Option<String>,
        stats: &BatchStats,
        duration_seconds: f64,
    ) -> Self {
        Self::Complete {
            operation: operation.to_string(),
            state: state.to_string(),
            archive,
            targets: stats.targets,
            succeeded: stats.succeeded,
            failed: stats.failed,
            total_bytes: stats.total_bytes,
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.workers,
            probe_workers: config.probe_workers,
            archive_folder: config.archive_folder.clone(),
            enforce_cross_origin: config.enforce_cross_origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages_are_tagged() {
        let message = JsonMessage::target_complete(
            "https://a.test/a.png",
            2,
            Some("image_3.png".to_string()),
            42,
            None,
        );
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "target_complete",
                "identity": "https://a.test/a.png",
                "index": 2,
                "entry": "image_3.png",
                "bytes": 42,
                "error": null
            })
        );
    }

    #[test]
    fn test_complete_reports_state() {
        let mut stats = BatchStats::new(3);
        stats.add_success(10);
        stats.add_success(5);
        stats.add_failure();

        let message = JsonMessage::complete(
            BatchOperation::Convert,
            JobState::PartiallyFailed,
            Some("converted_webp.zip".to_string()),
            &stats,
            1.5,
        );
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["operation"], "convert");
        assert_eq!(value["state"], "partially-failed");
        assert_eq!(value["succeeded"], 2);
        assert_eq!(value["total_bytes"], 15);
    }

    #[test]
    fn test_start_round_trips_config() {
        let config = Config::default();
        let message = JsonMessage::start(BatchOperation::Download, 5, JsonConfig::from(&config));
        let text = serde_json::to_string(&message).unwrap();
        let parsed: JsonMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, message);
    }
}
