//! # Filter & Sort Engine Module
//!
//! Deriva il set "visualizzato" a partire dal set di asset, dal criterio di
//! filtro e dal criterio di ordinamento.
//!
//! ## Filtro:
//! - Token di confronto = testo dopo l'ultimo `.`, senza query/fragment, lowercase
//! - `jpg` corrisponde anche a `jpeg`
//! - I filtri immagine non restituiscono mai video, e viceversa
//!
//! ## Ordinamento per dimensione:
//! - Tutti i candidati senza `byte_size` vengono sondati prima di ordinare
//! - I probe girano in parallelo con un limite (`Config::probe_workers`)
//! - Le dimensioni vengono salvate nel set e non vengono più ri-sondate
//! - Ordinamento stabile: a parità di dimensione vince l'ordine di scoperta

use crate::asset::{AssetKind, AssetRecord, AssetSet};
use crate::probe::SizeProber;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Raster subtypes offered by the type filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSubtype {
    Jpg,
    Png,
    Gif,
    Webp,
    Avif,
    Ico,
    Bmp,
}

impl ImageSubtype {
    fn matches_token(&self, token: &str) -> bool {
        match self {
            ImageSubtype::Jpg => token == "jpg" || token == "jpeg",
            other => token == other.token(),
        }
    }

    fn token(&self) -> &'static str {
        match self {
            ImageSubtype::Jpg => "jpg",
            ImageSubtype::Png => "png",
            ImageSubtype::Gif => "gif",
            ImageSubtype::Webp => "webp",
            ImageSubtype::Avif => "avif",
            ImageSubtype::Ico => "ico",
            ImageSubtype::Bmp => "bmp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterCriterion {
    #[default]
    All,
    Image(ImageSubtype),
    Svg,
    Video,
}

impl FilterCriterion {
    pub fn matches(&self, record: &AssetRecord) -> bool {
        match self {
            FilterCriterion::All => true,
            FilterCriterion::Video => record.kind == AssetKind::Video,
            FilterCriterion::Svg => {
                record.kind == AssetKind::Image && record.extension_token() == "svg"
            }
            FilterCriterion::Image(subtype) => {
                record.kind == AssetKind::Image && subtype.matches_token(&record.extension_token())
            }
        }
    }
}

impl FromStr for FilterCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let criterion = match s.to_ascii_lowercase().as_str() {
            "all" => FilterCriterion::All,
            "svg" => FilterCriterion::Svg,
            "video" => FilterCriterion::Video,
            "jpg" | "jpeg" => FilterCriterion::Image(ImageSubtype::Jpg),
            "png" => FilterCriterion::Image(ImageSubtype::Png),
            "gif" => FilterCriterion::Image(ImageSubtype::Gif),
            "webp" => FilterCriterion::Image(ImageSubtype::Webp),
            "avif" => FilterCriterion::Image(ImageSubtype::Avif),
            "ico" => FilterCriterion::Image(ImageSubtype::Ico),
            "bmp" => FilterCriterion::Image(ImageSubtype::Bmp),
            other => return Err(format!("unknown filter: {}", other)),
        };
        Ok(criterion)
    }
}

impl fmt::Display for FilterCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterCriterion::All => write!(f, "all"),
            FilterCriterion::Svg => write!(f, "svg"),
            FilterCriterion::Video => write!(f, "video"),
            FilterCriterion::Image(subtype) => write!(f, "{}", subtype.token()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortCriterion {
    #[default]
    None,
    SizeAscending,
    SizeDescending,
}

impl SortCriterion {
    pub fn needs_sizes(&self) -> bool {
        !matches!(self, SortCriterion::None)
    }
}

impl FromStr for SortCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(SortCriterion::None),
            "size-asc" | "size-ascending" => Ok(SortCriterion::SizeAscending),
            "size-desc" | "size-descending" => Ok(SortCriterion::SizeDescending),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// Derives the displayed sequence, probing sizes when the order needs them
#[derive(Clone)]
pub struct FilterSortEngine {
    prober: SizeProber,
    probe_workers: usize,
}

impl FilterSortEngine {
    pub fn new(prober: SizeProber, probe_workers: usize) -> Self {
        Self {
            prober,
            probe_workers: probe_workers.max(1),
        }
    }

    /// Filters in discovery order, then orders by the sort criterion.
    ///
    /// With a size sort the returned sequence is only produced once every
    /// candidate has a known size.
    pub async fn apply(
        &self,
        assets: &mut AssetSet,
        filter: FilterCriterion,
        sort: SortCriterion,
    ) -> Vec<AssetRecord> {
        let candidates: Vec<String> = assets
            .iter()
            .filter(|record| filter.matches(record))
            .map(|record| record.identity.clone())
            .collect();

        debug!("Filter {} kept {}/{} assets", filter, candidates.len(), assets.len());

        if sort.needs_sizes() {
            self.probe_missing(assets, &candidates).await;
        }

        let mut displayed: Vec<AssetRecord> = candidates
            .iter()
            .filter_map(|identity| assets.get(identity).cloned())
            .collect();

        // sort_by is stable, so equal sizes keep discovery order
        match sort {
            SortCriterion::None => {}
            SortCriterion::SizeAscending => {
                displayed.sort_by(|a, b| a.byte_size.unwrap_or(0).cmp(&b.byte_size.unwrap_or(0)))
            }
            SortCriterion::SizeDescending => {
                displayed.sort_by(|a, b| b.byte_size.unwrap_or(0).cmp(&a.byte_size.unwrap_or(0)))
            }
        }

        displayed
    }

    async fn probe_missing(&self, assets: &mut AssetSet, candidates: &[String]) {
        let missing: Vec<String> = candidates
            .iter()
            .filter(|identity| {
                assets
                    .get(identity)
                    .map(|record| record.byte_size.is_none())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        if missing.is_empty() {
            return;
        }

        info!("Calculating file sizes for {} assets...", missing.len());

        let prober = &self.prober;
        let sizes: Vec<(String, u64)> = stream::iter(missing)
            .map(|identity| async move {
                let size = prober.probe(&identity).await;
                (identity, size)
            })
            .buffer_unordered(self.probe_workers)
            .collect()
            .await;

        for (identity, size) in sizes {
            assets.record_size(&identity, size);
        }
    }
}
