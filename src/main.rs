//! # Asset Harvester - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e applicazione degli override CLI
//! - Costruzione della sessione e invio degli eventi utente (filtro, ordinamento, selezione)
//! - Avvio del batch o delle azioni su singolo asset
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (sorgente, vista, comando)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` se presente)
//! 3. Raccoglie gli asset dal manifest o dal documento HTML
//! 4. Applica filtro, ordinamento e selezione alla sessione
//! 5. Esegue il comando e consegna il risultato nella directory di output
//!
//! ## Esempio di utilizzo:
//! ```bash
//! asset-harvester --html page.html --base-url https://example.com --filter png convert --format webp
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use asset_harvester::{
    progress::ProgressManager, utils::format_size, AssetCollector, AssetError, BatchOperation,
    BatchOptions, BatchOrchestrator, Config, DiskDownloadTrigger, DownloadRequest, DownloadTrigger,
    Fetcher, FilterCriterion, FilterSortEngine, HtmlCollector, HttpFetcher, ManifestCollector,
    Session, SessionEvent, SizeProber, SortCriterion, TargetFormat, ViewState, ZipArchiveSink,
};

#[derive(Parser)]
#[command(name = "asset-harvester")]
#[command(about = "Discover, filter and batch-convert media assets embedded in web documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file (missing file = defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this file
    #[arg(long, global = true)]
    write_config: Option<PathBuf>,

    /// Number of targets processed at once
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Number of concurrent size probes
    #[arg(long, global = true)]
    probe_workers: Option<usize>,

    /// Refuse to re-encode responses without a cross-origin sharing header
    #[arg(long, global = true)]
    enforce_cross_origin: bool,

    /// Output directory for archives and single downloads
    #[arg(short, long, global = true, default_value = ".")]
    output: PathBuf,

    /// Output progress as JSON lines for programmatic use
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct SourceArgs {
    /// Scanner output: JSON array of discoveries
    #[arg(long, conflicts_with = "html")]
    manifest: Option<PathBuf>,

    /// HTML document to scan
    #[arg(long)]
    html: Option<PathBuf>,

    /// Base URL for relative locators in the HTML document
    #[arg(long, requires = "html")]
    base_url: Option<Url>,
}

#[derive(Args)]
struct ViewArgs {
    /// Filter: all, jpg, png, gif, webp, avif, ico, bmp, svg, video
    #[arg(long, default_value = "all")]
    filter: FilterCriterion,

    /// Sort: none, size-asc, size-desc
    #[arg(long, default_value = "none")]
    sort: SortCriterion,

    /// Select an identity (repeatable); toggled in the given order
    #[arg(long = "select")]
    select: Vec<String>,

    /// Select every displayed asset
    #[arg(long)]
    select_all: bool,
}

#[derive(Args)]
struct BatchArgs {
    /// Filename prefix for archive entries (empty = "image")
    #[arg(long)]
    prefix: Option<String>,

    /// Resize to this width, keeping the aspect ratio
    #[arg(long)]
    resize: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// List the displayed assets
    List {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Download the targets into images.zip
    Download {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Convert the targets into converted_{ext}.zip
    Convert {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        batch: BatchArgs,
        /// Target format: png, jpeg, webp, bmp
        #[arg(short, long)]
        format: TargetFormat,
        /// Extension written into entry names (defaults to the format's)
        #[arg(long)]
        ext: Option<String>,
    },
    /// Convert a single asset into converted_image.{ext}
    ConvertOne {
        identity: String,
        #[arg(short, long)]
        format: TargetFormat,
    },
    /// Save a single asset as-is
    Save {
        identity: String,
        /// File name to save under
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for JSON events
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli).await?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config)?);
    let trigger = DiskDownloadTrigger::new(cli.output.clone(), fetcher.clone());

    match cli.command {
        Command::List { source, view } => {
            let Some(session) = build_session(&source, &view, &config, fetcher).await? else {
                return Ok(());
            };
            print_listing(&session, config.json_output)?;
        }
        Command::Download {
            source,
            view,
            batch,
        } => {
            let options = BatchOptions::for_download(prefix_or_default(&batch, &config), batch.resize);
            run_batch(BatchOperation::Download, options, &source, &view, &config, fetcher, &trigger).await?;
        }
        Command::Convert {
            source,
            view,
            batch,
            format,
            ext,
        } => {
            let mut options =
                BatchOptions::for_convert(format, prefix_or_default(&batch, &config), batch.resize);
            if let Some(ext) = ext {
                options = options.with_extension(ext);
            }
            run_batch(BatchOperation::Convert, options, &source, &view, &config, fetcher, &trigger).await?;
        }
        Command::ConvertOne { identity, format } => {
            let orchestrator =
                BatchOrchestrator::new(config.clone(), fetcher, Arc::new(ZipArchiveSink::default()));
            let payload = orchestrator.convert_single(&identity, format).await?;
            let path = trigger.deliver(payload).await?;
            info!("Converted image saved to {}", path.display());
        }
        Command::Save { identity, name } => {
            let path = trigger
                .deliver(DownloadRequest::Resource {
                    identity,
                    suggested_name: name,
                })
                .await?;
            info!("Asset saved to {}", path.display());
        }
    }

    Ok(())
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(probe_workers) = cli.probe_workers {
        config.probe_workers = probe_workers;
    }
    config.enforce_cross_origin |= cli.enforce_cross_origin;
    config.json_output |= cli.json;
    config.validate()?;

    if let Some(ref path) = cli.write_config {
        config.save_to_file(path).await?;
        info!("Configuration written to {}", path.display());
    }

    Ok(config)
}

fn prefix_or_default(batch: &BatchArgs, config: &Config) -> String {
    batch
        .prefix
        .clone()
        .unwrap_or_else(|| config.default_prefix.clone())
}

fn collector_for(source: &SourceArgs) -> Result<Box<dyn AssetCollector>> {
    match (&source.manifest, &source.html) {
        (Some(path), _) => Ok(Box::new(ManifestCollector::new(path))),
        (None, Some(path)) => Ok(Box::new(HtmlCollector::from_file(path, source.base_url.clone())?)),
        (None, None) => Err(anyhow::anyhow!("Either --manifest or --html is required")),
    }
}

/// Collects, then replays the view and selection flags as session events.
/// Returns `None` when the document has no assets.
async fn build_session(
    source: &SourceArgs,
    view: &ViewArgs,
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
) -> Result<Option<Session>> {
    let records = collector_for(source)?.collect()?;
    if records.is_empty() {
        info!("{}", AssetError::CollectionEmpty);
        return Ok(None);
    }
    info!("Discovered {} assets", records.len());

    let engine = FilterSortEngine::new(SizeProber::new(fetcher), config.probe_workers);
    let spinner = view
        .sort
        .needs_sizes()
        .then(|| ProgressManager::spinner("Calculating file sizes...", config.json_output));

    let view_state = ViewState {
        filter: view.filter,
        sort: view.sort,
    };
    let mut session = Session::with_view(records, view_state, &engine).await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if view.select_all {
        session = session.handle(SessionEvent::SelectAll, &engine).await;
    }
    for identity in &view.select {
        session = session
            .handle(SessionEvent::Toggle(identity.clone()), &engine)
            .await;
    }

    Ok(Some(session))
}

async fn run_batch(
    operation: BatchOperation,
    options: BatchOptions,
    source: &SourceArgs,
    view: &ViewArgs,
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    trigger: &DiskDownloadTrigger,
) -> Result<()> {
    let Some(session) = build_session(source, view, config, fetcher.clone()).await? else {
        return Ok(());
    };

    let availability = session.batch_availability();
    if !availability.enabled {
        info!("Nothing to {}: no assets match the current filter", operation);
        return Ok(());
    }
    info!("{} {:?} ({})", operation, availability.scope, availability.count);

    let sink = Arc::new(ZipArchiveSink::new(config.archive_folder.clone()));
    let mut orchestrator = BatchOrchestrator::new(config.clone(), fetcher, sink);

    let report = match orchestrator.run(operation, session.resolve_targets(), options).await {
        Ok(report) => report,
        Err(AssetError::EmptyBatch) => {
            info!("{}: nothing to do", AssetError::EmptyBatch);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let path = trigger.deliver(DownloadRequest::Archive(report.archive)).await?;
    info!("Archive saved to {} ({})", path.display(), report.state);
    Ok(())
}

fn print_listing(session: &Session, json_output: bool) -> Result<()> {
    let displayed = session.displayed();

    if json_output {
        println!("{}", serde_json::to_string(&displayed)?);
        return Ok(());
    }

    for (index, record) in displayed.iter().enumerate() {
        let marker = if session.selection().contains(&record.identity) {
            "*"
        } else {
            " "
        };
        let size = record
            .byte_size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}{:>4}  {:<5} {:<6} {:>10}  {}",
            marker,
            index + 1,
            record.kind,
            record.source.label(),
            size,
            asset_harvester::fetch::abbreviate(&record.identity)
        );
    }

    let availability = session.batch_availability();
    println!(
        "{} displayed, {} selected, batch targets {:?} ({})",
        displayed.len(),
        session.selection().len(),
        availability.scope,
        availability.count
    );
    Ok(())
}
