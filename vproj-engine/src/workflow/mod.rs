//! Enrichment workflow
//!
//! Streams domain members, rates them against a global schema, projects the
//! ratings into 3D, fetches images, and reconciles everything into one
//! [`WorkflowResult`](crate::models::WorkflowResult).
//!
//! # Components
//! - [`token_parser`] - chunk text → member tokens
//! - [`registry`] - at-most-once admission per member
//! - [`schema_gate`] - one-shot global schema fetch
//! - [`rater`] - concurrent per-member ratings
//! - [`projection`] / [`pca`] - threshold-driven PCA passes
//! - [`image_batches`] - fixed-size concurrent image batches
//! - [`reconcile`] - image URLs into records
//! - [`orchestrator`] - sequencing and the run state machine

pub mod image_batches;
pub mod orchestrator;
pub mod pca;
pub mod projection;
pub mod rater;
pub mod reconcile;
pub mod registry;
pub mod schema_gate;
pub mod token_parser;

pub use image_batches::ImageBatchProcessor;
pub use orchestrator::{WorkflowOrchestrator, WorkflowRequest};
pub use projection::{ProjectionEngine, ProjectionOutcome, ProjectionPolicy};
pub use registry::MemberRegistry;
pub use schema_gate::SchemaGate;
pub use token_parser::TokenParser;

use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;
use vproj_common::{LogBroadcaster, LogEntry, LogLevel};

/// Tunable thresholds and sizes for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineParams {
    /// Pending members needed before the schema is fetched
    pub schema_sample_threshold: usize,
    /// Successful records needed for the first projection
    pub projection_initial_threshold: usize,
    /// Added to the projection threshold after each successful pass
    pub projection_step: usize,
    /// Rows a projection pass needs to run at all
    pub projection_min_rows: usize,
    /// Tokens per image batch
    pub image_batch_size: usize,
    /// Concurrent rating calls per arrival batch; `None` = all at once
    pub max_concurrent_ratings: Option<usize>,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            schema_sample_threshold: 2,
            projection_initial_threshold: 5,
            projection_step: 5,
            projection_min_rows: 3,
            image_batch_size: 10,
            max_concurrent_ratings: None,
        }
    }
}

/// Per-run log: keeps every entry for the result and forwards it to the
/// caller's broadcaster and to tracing
#[derive(Clone)]
pub struct WorkflowLogger {
    run_id: Uuid,
    entries: Arc<Mutex<Vec<LogEntry>>>,
    observer: Arc<LogBroadcaster>,
}

impl WorkflowLogger {
    pub fn new(run_id: Uuid, observer: Arc<LogBroadcaster>) -> Self {
        Self {
            run_id,
            entries: Arc::new(Mutex::new(Vec::new())),
            observer,
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(message, level);

        match level {
            LogLevel::Debug => tracing::debug!(run_id = %self.run_id, "{}", entry.message),
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(run_id = %self.run_id, "{}", entry.message)
            }
            LogLevel::Warning => tracing::warn!(run_id = %self.run_id, "{}", entry.message),
            LogLevel::Error => tracing::error!(run_id = %self.run_id, "{}", entry.message),
        }

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        self.observer.publish(entry);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Snapshot of everything logged so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
