//! # Batch Module
//!
//! Modulo batch refactorizzato in componenti specializzati.

pub mod job;
pub mod naming;
pub mod orchestrator;
pub mod progress_tracker;
pub mod task;

pub use job::{BatchJob, BatchOperation, BatchOptions};
pub use orchestrator::{BatchOrchestrator, BatchReport, JobState, TargetFailure};
pub use progress_tracker::ProgressTracker;
pub use task::TargetWorker;
