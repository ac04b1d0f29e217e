//! # Download Trigger Module
//!
//! Consegna all'host un archivio completato o una singola risorsa.
//!
//! ## Richieste supportate:
//! - `Resource`: download diretto di un'identità con nome suggerito opzionale
//! - `Archive`: byte di un archivio finalizzato con il suo nome file
//! - `Payload`: payload già convertito (conversione singola)
//!
//! `DiskDownloadTrigger` salva tutto in una directory di output, senza mai
//! sovrascrivere file esistenti (`name (1).ext`, `name (2).ext`, ...).

use crate::archive::Archive;
use crate::batch::naming::derive_extension;
use crate::error::AssetError;
use crate::fetch::{fetch_resource, Fetcher};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadRequest {
    Resource {
        identity: String,
        suggested_name: Option<String>,
    },
    Archive(Archive),
    Payload { file_name: String, bytes: Vec<u8> },
}

#[async_trait]
pub trait DownloadTrigger: Send + Sync {
    /// Hands the request to the host and returns where it was saved
    async fn deliver(&self, request: DownloadRequest) -> Result<PathBuf, AssetError>;
}

pub struct DiskDownloadTrigger {
    output_dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
}

impl DiskDownloadTrigger {
    pub fn new(output_dir: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            output_dir: output_dir.into(),
            fetcher,
        }
    }

    async fn write_unique(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, AssetError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = unique_path(&self.output_dir, &sanitize_file_name(file_name)).await;
        tokio::fs::write(&path, bytes).await?;
        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

#[async_trait]
impl DownloadTrigger for DiskDownloadTrigger {
    async fn deliver(&self, request: DownloadRequest) -> Result<PathBuf, AssetError> {
        match request {
            DownloadRequest::Archive(archive) => {
                self.write_unique(&archive.file_name, &archive.bytes).await
            }
            DownloadRequest::Payload { file_name, bytes } => {
                self.write_unique(&file_name, &bytes).await
            }
            DownloadRequest::Resource {
                identity,
                suggested_name,
            } => {
                let resource = fetch_resource(self.fetcher.as_ref(), &identity).await?;
                let file_name = suggested_name.unwrap_or_else(|| {
                    let extension = derive_extension(resource.content_type.as_deref(), &identity);
                    default_file_name(&identity, &extension)
                });
                self.write_unique(&file_name, &resource.bytes).await
            }
        }
    }
}

/// Last path segment of a network identity, or `download.{ext}`
fn default_file_name(identity: &str, extension: &str) -> String {
    url::Url::parse(identity)
        .ok()
        .filter(|url| url.scheme() != "data")
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if segment.contains('.') {
                segment
            } else {
                format!("{}.{}", segment, extension)
            }
        })
        .unwrap_or_else(|| format!("download.{}", extension))
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ').to_string();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

async fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    let mut n = 1;
    loop {
        let name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(name);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}
