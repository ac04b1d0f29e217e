//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione della pipeline.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri runtime
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `workers`: Limite di concorrenza del batch (default: 8)
//! - `probe_workers`: Limite di concorrenza dei probe di dimensione (default: 16)
//! - `request_timeout_secs`: Timeout per richiesta HTTP (default: 30)
//! - `connect_timeout_secs`: Timeout di connessione (default: 10)
//! - `user_agent`: User agent inviato al server
//! - `default_prefix`: Prefisso dei file nell'archivio (default: "image")
//! - `archive_folder`: Cartella interna dell'archivio (default: "images")
//! - `enforce_cross_origin`: Rifiuta la conversione senza header CORS (default: false)
//! - `json_output`: Eventi JSON su stdout (default: false)
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     workers: 4,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Fixed quality factor used by lossy raster encoders
pub const ENCODE_QUALITY: f32 = 0.9;

/// Largest raster, in pixels, the conversion pipeline will allocate
pub const MAX_OUTPUT_PIXELS: u64 = 16_384 * 16_384;

/// Configuration for asset harvesting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of batch targets processed at once
    pub workers: usize,
    /// Maximum number of concurrent size probes during a size sort
    pub probe_workers: usize,
    /// Per request timeout
    pub request_timeout_secs: u64,
    /// Connection timeout
    pub connect_timeout_secs: u64,
    /// User agent for outgoing requests
    pub user_agent: String,
    /// Filename prefix used when the job does not provide one
    pub default_prefix: String,
    /// Folder inside the archive holding every entry (None = archive root)
    pub archive_folder: Option<String>,
    /// Fail conversions of responses without a cross-origin sharing header
    pub enforce_cross_origin: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 8,
            probe_workers: 16,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("asset-harvester/", env!("CARGO_PKG_VERSION")).to_string(),
            default_prefix: "image".to_string(),
            archive_folder: Some("images".to_string()),
            enforce_cross_origin: false,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.probe_workers == 0 {
            return Err(anyhow::anyhow!("Number of probe workers must be greater than 0"));
        }

        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Timeouts must be greater than 0 seconds"));
        }

        if self.default_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("Default filename prefix cannot be empty"));
        }

        if let Some(ref folder) = self.archive_folder {
            if folder.is_empty() || folder.contains("..") || folder.starts_with('/') {
                return Err(anyhow::anyhow!("Invalid archive folder: {:?}", folder));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
