//! # Asset Harvester Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare della pipeline degli asset
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `asset`: Modello `AssetRecord`, identità e token di estensione
//! - `collector`: Scoperta e deduplicazione (manifest JSON o HTML statico)
//! - `fetch`: Accesso alle risorse (rete o data URI)
//! - `probe`: Stima delle dimensioni in byte
//! - `selection`, `filter`, `session`: Stato di lavoro, filtri e ordinamenti
//! - `convert`: Pipeline raster decode → resize → encode
//! - `batch`: Orchestratore del batch con concorrenza limitata
//! - `archive`, `download`: Archivio zip e consegna all'host
//! - `config`, `error`, `progress`, `json_output`: Stack di supporto
//!
//! ## Utilizzo:
//! ```ignore
//! use asset_harvester::*;
//!
//! let config = Config::default();
//! let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config)?);
//! let engine = FilterSortEngine::new(SizeProber::new(fetcher.clone()), config.probe_workers);
//! let session = Session::new(HtmlCollector::new(html, None).collect()?, &engine).await;
//!
//! let mut orchestrator = BatchOrchestrator::new(config, fetcher, Arc::new(ZipArchiveSink::default()));
//! let report = orchestrator
//!     .run(BatchOperation::Download, session.resolve_targets(), BatchOptions::for_download("", None))
//!     .await?;
//! ```

pub mod archive;
pub mod asset;
pub mod batch;
pub mod collector;
pub mod config;
pub mod convert;
pub mod download;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod json_output;
pub mod probe;
pub mod progress;
pub mod selection;
pub mod session;
pub mod utils;

pub use archive::{Archive, ArchiveEntry, ArchiveRequest, ArchiveSink, ZipArchiveSink};
pub use asset::{AssetKind, AssetRecord, AssetSet, DiscoverySource};
pub use batch::{BatchOperation, BatchOptions, BatchOrchestrator, BatchReport, JobState};
pub use collector::{AssetCollector, HtmlCollector, ManifestCollector};
pub use config::Config;
pub use convert::{ConversionEngine, ConversionRequest, TargetFormat};
pub use download::{DiskDownloadTrigger, DownloadRequest, DownloadTrigger};
pub use error::AssetError;
pub use fetch::{Fetcher, HttpFetcher};
pub use filter::{FilterCriterion, FilterSortEngine, ImageSubtype, SortCriterion};
pub use probe::SizeProber;
pub use selection::SelectionStore;
pub use session::{Session, SessionEvent, ViewState};
