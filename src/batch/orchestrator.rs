//! # Batch Orchestrator
//!
//! Orchestratore principale: fan-out limitato dei target, isolamento dei
//! fallimenti, join completo e finalizzazione dell'archivio.
//!
//! ## Stati del job:
//! `Idle → Running → (Completed | PartiallyFailed)`, `Fatal` solo per job
//! senza target o errore del sink.

use crate::{
    archive::{ArchiveEntry, ArchiveRequest, ArchiveSink, Archive},
    asset::AssetRecord,
    batch::{
        job::{BatchJob, BatchOperation, BatchOptions},
        naming::{archive_file_name, single_conversion_name},
        progress_tracker::ProgressTracker,
        task::TargetWorker,
    },
    config::Config,
    convert::{ConversionEngine, ConversionRequest, TargetFormat},
    download::DownloadRequest,
    error::AssetError,
    fetch::{abbreviate, Fetcher},
    json_output::{JsonConfig, JsonMessage},
    progress::BatchStats,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Idle,
    Running,
    Completed,
    PartiallyFailed,
    Fatal,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::PartiallyFailed => "partially-failed",
            JobState::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// A target that was left out of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub index: usize,
    pub identity: String,
    pub reason: String,
}

/// Outcome of a finished job
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub state: JobState,
    pub archive: Archive,
    pub stats: BatchStats,
    pub failures: Vec<TargetFailure>,
}

pub struct BatchOrchestrator {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    engine: Arc<ConversionEngine>,
    sink: Arc<dyn ArchiveSink>,
    state: JobState,
}

impl BatchOrchestrator {
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn ArchiveSink>) -> Self {
        let engine = Arc::new(ConversionEngine::new(fetcher.clone(), &config));
        Self {
            config,
            fetcher,
            engine,
            sink,
            state: JobState::Idle,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Runs one job over a snapshot of `targets`.
    ///
    /// Per-target failures are logged and their entries omitted; only an empty
    /// target set or a sink failure fails the job.
    pub async fn run(
        &mut self,
        operation: BatchOperation,
        targets: Vec<AssetRecord>,
        options: BatchOptions,
    ) -> Result<BatchReport, AssetError> {
        let job = match BatchJob::new(operation, targets, options) {
            Ok(job) => job,
            Err(e) => {
                self.state = JobState::Fatal;
                return Err(e);
            }
        };

        self.state = JobState::Running;
        match self.execute(job).await {
            Ok(report) => {
                self.state = report.state;
                Ok(report)
            }
            Err(e) => {
                self.state = JobState::Fatal;
                error!("Batch failed: {}", e);
                if self.config.json_output {
                    JsonMessage::error("Batch failed".to_string(), Some(e.to_string())).emit();
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, job: BatchJob) -> Result<BatchReport, AssetError> {
        let start_time = Instant::now();
        let total = job.len();
        let extension = job.options().extension.clone();

        if self.config.json_output {
            JsonMessage::start(job.operation(), total, JsonConfig::from(&self.config)).emit();
        } else {
            info!(
                "Starting {} of {} targets ({} workers)",
                job.operation(),
                total,
                self.config.workers
            );
        }

        let progress_tracker = ProgressTracker::new(total, self.config.json_output);
        let (entries, failures) = self.process_targets_concurrently(&job, progress_tracker.clone()).await?;

        let request = ArchiveRequest {
            file_name: archive_file_name(job.operation(), &extension),
            entries,
        };
        let archive = self.finalize_archive(request, &progress_tracker).await?;

        let stats = progress_tracker.get_stats().await;
        progress_tracker.finish(&stats.format_summary());

        let state = if failures.is_empty() {
            JobState::Completed
        } else {
            JobState::PartiallyFailed
        };

        if self.config.json_output {
            JsonMessage::complete(
                job.operation(),
                state,
                Some(archive.file_name.clone()),
                &stats,
                start_time.elapsed().as_secs_f64(),
            )
            .emit();
        } else {
            info!("=== Batch Complete ===");
            info!("{}", stats.format_summary());
            info!("Archive: {} ({} bytes)", archive.file_name, archive.bytes.len());
        }

        Ok(BatchReport {
            state,
            archive,
            stats,
            failures,
        })
    }

    /// Runs the sink on the blocking pool. On failure the progress bar is
    /// abandoned before the error is returned.
    async fn finalize_archive(
        &self,
        request: ArchiveRequest,
        progress_tracker: &ProgressTracker,
    ) -> Result<Archive, AssetError> {
        let sink = self.sink.clone();
        let result = match tokio::task::spawn_blocking(move || sink.finalize(request)).await {
            Ok(result) => result,
            Err(e) => Err(AssetError::ArchiveGeneration(format!("archive task failed: {}", e))),
        };

        if let Err(ref e) = result {
            progress_tracker.abandon(&format!("Archive failed: {}", e));
        }
        result
    }

    /// Spawns one task per target in target order, bounded by `workers` permits.
    /// Joins every task in the same order, so entries come back index-sorted.
    async fn process_targets_concurrently(
        &self,
        job: &BatchJob,
        progress_tracker: ProgressTracker,
    ) -> Result<(Vec<ArchiveEntry>, Vec<TargetFailure>), AssetError> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let worker = TargetWorker::new(
            self.fetcher.clone(),
            self.engine.clone(),
            job.operation(),
            job.options().clone(),
        );

        let mut tasks: Vec<(usize, String, tokio::task::JoinHandle<Result<ArchiveEntry, AssetError>>)> =
            Vec::with_capacity(job.len());

        for (index, record) in job.targets().iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AssetError::Scheduling(e.to_string()))?;

            let worker = worker.clone();
            let progress = progress_tracker.clone();
            let identity = record.identity.clone();

            let task = tokio::spawn(async move {
                let _permit = permit;

                progress.handle_target_start(index, &identity);
                let result = worker.process(index, &identity).await;
                progress.handle_target_completion(index, &identity, &result).await;
                result
            });

            tasks.push((index, record.identity.clone(), task));
        }

        let mut entries = Vec::with_capacity(tasks.len());
        let mut failures = Vec::new();
        for (index, identity, task) in tasks {
            let reason = match task.await {
                Ok(Ok(entry)) => {
                    entries.push(entry);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("task aborted: {}", e),
            };
            warn!("Skipping target {} ({}): {}", index + 1, abbreviate(&identity), reason);
            failures.push(TargetFailure {
                index,
                identity,
                reason,
            });
        }

        Ok((entries, failures))
    }

    /// Converts one asset outside any batch. Failures are returned to the caller.
    pub async fn convert_single(
        &self,
        identity: &str,
        format: TargetFormat,
    ) -> Result<DownloadRequest, AssetError> {
        let bytes = self
            .engine
            .convert(identity, &ConversionRequest::new(format))
            .await?;
        info!("Converted {} to {}", abbreviate(identity), format);
        Ok(DownloadRequest::Payload {
            file_name: single_conversion_name(format.extension()),
            bytes,
        })
    }
}
