//! # Asset Model Module
//!
//! Entità canonica della pipeline: un `AssetRecord` per ogni risorsa scoperta.
//!
//! ## Regola di identità:
//! - L'identità è la stringa del locator (URL assoluto o payload `data:`)
//! - Due scoperte con la stessa identità sono lo stesso asset, qualunque sia la sorgente
//! - Il set contiene al massimo un record per identità
//!
//! ## Mutabilità:
//! - I record sono immutabili, tranne `byte_size`
//! - `byte_size` viene popolato una sola volta e mai più ri-calcolato

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Media category of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Image => write!(f, "image"),
            AssetKind::Video => write!(f, "video"),
        }
    }
}

/// Where in the document an asset was found. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    #[serde(alias = "img")]
    DocumentEmbeddedElement,
    #[serde(alias = "css")]
    ComputedStyleBackground,
    #[serde(alias = "meta")]
    MetadataTag,
    #[serde(alias = "icon")]
    LinkIcon,
    #[serde(alias = "video")]
    VideoTrack,
}

impl DiscoverySource {
    /// Short badge label, as shown next to a preview
    pub fn label(&self) -> &'static str {
        match self {
            DiscoverySource::DocumentEmbeddedElement => "img",
            DiscoverySource::ComputedStyleBackground => "css",
            DiscoverySource::MetadataTag => "meta",
            DiscoverySource::LinkIcon => "icon",
            DiscoverySource::VideoTrack => "video",
        }
    }
}

impl FromStr for DiscoverySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "img" | "document-embedded-element" => Ok(Self::DocumentEmbeddedElement),
            "css" | "computed-style-background" => Ok(Self::ComputedStyleBackground),
            "meta" | "metadata-tag" => Ok(Self::MetadataTag),
            "icon" | "link-icon" => Ok(Self::LinkIcon),
            "video" | "video-track" => Ok(Self::VideoTrack),
            other => Err(format!("unknown discovery source: {}", other)),
        }
    }
}

/// A single discovered asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub identity: String,
    pub kind: AssetKind,
    pub source: DiscoverySource,
    /// Lazily probed size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
}

impl AssetRecord {
    pub fn new(identity: impl Into<String>, kind: AssetKind, source: DiscoverySource) -> Self {
        Self {
            identity: identity.into(),
            kind,
            source,
            byte_size: None,
        }
    }

    pub fn is_data_uri(&self) -> bool {
        is_data_uri(&self.identity)
    }

    /// Lower-cased comparison token derived from the identity's tail
    pub fn extension_token(&self) -> String {
        extension_token(&self.identity)
    }
}

pub fn is_data_uri(identity: &str) -> bool {
    identity
        .get(..5)
        .map(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .unwrap_or(false)
}

/// Text after the last `.`, cut at the first `?` or `#`, lower-cased.
///
/// An identity without any `.` yields the whole identity.
pub fn extension_token(identity: &str) -> String {
    let tail = identity.rsplit('.').next().unwrap_or(identity);
    let end = tail.find(['?', '#']).unwrap_or(tail.len());
    tail[..end].to_lowercase()
}

/// Ordered, identity-unique collection of discovered assets
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    records: Vec<AssetRecord>,
    index: HashMap<String, usize>,
}

impl AssetSet {
    /// Builds the working set from collector output, in discovery order.
    pub fn new(records: Vec<AssetRecord>) -> Self {
        let mut set = Self::default();
        for record in records {
            if set.index.contains_key(&record.identity) {
                continue;
            }
            set.index.insert(record.identity.clone(), set.records.len());
            set.records.push(record);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records.iter()
    }

    pub fn get(&self, identity: &str) -> Option<&AssetRecord> {
        self.index.get(identity).map(|&i| &self.records[i])
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    /// Discovery position of an identity
    pub fn position(&self, identity: &str) -> Option<usize> {
        self.index.get(identity).copied()
    }

    /// Caches a probed size. Returns false if the record already had one.
    pub fn record_size(&mut self, identity: &str, size: u64) -> bool {
        match self.index.get(identity) {
            Some(&i) if self.records[i].byte_size.is_none() => {
                self.records[i].byte_size = Some(size);
                true
            }
            _ => false,
        }
    }
}
