//! # Batch Job Module
//!
//! Snapshot immutabile di un job: operazione, target ordinati e opzioni.

use crate::asset::AssetRecord;
use crate::batch::naming::effective_prefix;
use crate::convert::{ConversionRequest, TargetFormat};
use crate::error::AssetError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOperation {
    Download,
    Convert,
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOperation::Download => write!(f, "download"),
            BatchOperation::Convert => write!(f, "convert"),
        }
    }
}

/// User options captured when the job starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub format: TargetFormat,
    pub extension: String,
    pub prefix: String,
    /// `Some` when resizing was requested; a width of 0 keeps natural size
    pub resize_width: Option<u32>,
}

impl BatchOptions {
    /// Download options: resized downloads go through the raster path as PNG
    pub fn for_download(prefix: impl Into<String>, resize_width: Option<u32>) -> Self {
        Self {
            format: TargetFormat::Png,
            extension: TargetFormat::Png.extension().to_string(),
            prefix: prefix.into(),
            resize_width,
        }
    }

    pub fn for_convert(
        format: TargetFormat,
        prefix: impl Into<String>,
        resize_width: Option<u32>,
    ) -> Self {
        Self {
            format,
            extension: format.extension().to_string(),
            prefix: prefix.into(),
            resize_width,
        }
    }

    /// Overrides the extension written into entry names
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let extension = extension.trim().trim_start_matches('.');
        if !extension.is_empty() {
            self.extension = extension.to_ascii_lowercase();
        }
        self
    }

    pub fn prefix(&self) -> &str {
        effective_prefix(&self.prefix)
    }

    pub fn resize_requested(&self) -> bool {
        self.resize_width.is_some()
    }

    pub fn conversion_request(&self) -> ConversionRequest {
        ConversionRequest::new(self.format).with_resize(self.resize_width)
    }
}

/// Ephemeral unit of work: a non-empty, ordered target snapshot
#[derive(Debug, Clone)]
pub struct BatchJob {
    operation: BatchOperation,
    targets: Vec<AssetRecord>,
    options: BatchOptions,
}

impl BatchJob {
    /// # Errors
    /// `AssetError::EmptyBatch` when there are no targets
    pub fn new(
        operation: BatchOperation,
        targets: Vec<AssetRecord>,
        options: BatchOptions,
    ) -> Result<Self, AssetError> {
        if targets.is_empty() {
            return Err(AssetError::EmptyBatch);
        }
        Ok(Self {
            operation,
            targets,
            options,
        })
    }

    pub fn operation(&self) -> BatchOperation {
        self.operation
    }

    pub fn targets(&self) -> &[AssetRecord] {
        &self.targets
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
