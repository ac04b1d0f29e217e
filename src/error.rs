//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della pipeline degli asset.
//!
//! ## Responsabilità:
//! - Definisce `AssetError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori per-asset (isolati nel batch) da errori fatali per il job
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `CollectionEmpty`: Nessun asset trovato nel documento (stato vuoto, non un crash)
//! - `Decode`: Raster non caricabile (rete, content type, cross-origin)
//! - `Conversion`: L'encoder non ha prodotto alcun payload
//! - `SizeProbe`: Probe della dimensione fallito (degrada a zero)
//! - `EmptyBatch`: Batch senza target risolvibili (no-op)
//! - `ArchiveGeneration`: Il sink non ha prodotto l'archivio (fatale per il job)
//! - `Fetch`: Download dei byte grezzi fallito
//!
//! ## Esempio:
//! ```ignore
//! if targets.is_empty() {
//!     return Err(AssetError::EmptyBatch);
//! }
//! ```

/// Custom error types for the asset pipeline
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("No assets discovered in document")]
    CollectionEmpty,

    #[error("Failed to decode image {identity}: {reason}")]
    Decode { identity: String, reason: String },

    #[error("Encoding {identity} to {format} produced no payload")]
    Conversion { identity: String, format: String },

    #[error("Size probe failed for {identity}: {reason}")]
    SizeProbe { identity: String, reason: String },

    #[error("Batch has no resolvable targets")]
    EmptyBatch,

    #[error("Archive generation error: {0}")]
    ArchiveGeneration(String),

    #[error("Fetch failed for {identity}: {reason}")]
    Fetch { identity: String, reason: String },

    #[error("Batch scheduling error: {0}")]
    Scheduling(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AssetError {
    /// Errors that end a whole batch job rather than a single target
    pub fn is_fatal_to_job(&self) -> bool {
        matches!(self, AssetError::EmptyBatch | AssetError::ArchiveGeneration(_))
    }
}

impl From<zip::result::ZipError> for AssetError {
    fn from(err: zip::result::ZipError) -> Self {
        AssetError::ArchiveGeneration(err.to_string())
    }
}
