//! Workflow output and image batch results

use super::point::VisualizationPoint;
use super::record::{GlobalAttributeSchema, RatedAttributeRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;
use vproj_common::LogEntry;

/// Member text → resolved image URL
pub type ImageMap = HashMap<String, String>;

/// Workflow state machine
///
/// `Idle → Streaming → (SchemaPending | SchemaReady) → Finalizing → Completed | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowState {
    Idle,
    Streaming,
    SchemaPending,
    SchemaReady,
    Finalizing,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Streaming => "streaming",
            WorkflowState::SchemaPending => "schema-pending",
            WorkflowState::SchemaReady => "schema-ready",
            WorkflowState::Finalizing => "finalizing",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One image lookup inside a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBatchItem {
    pub text: String,
    pub image_url: Option<String>,
    pub fetch_time_ms: f64,
}

/// Outcome of one image batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBatchResult {
    pub batch_number: u64,
    pub items: Vec<ImageBatchItem>,
    pub processing_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl ImageBatchResult {
    /// Add this batch's resolved URLs to `images`
    ///
    /// Items without an image are skipped. A member already present keeps the
    /// URL it was first resolved with.
    pub fn merge_into(&self, images: &mut ImageMap) {
        for item in &self.items {
            if let Some(url) = &item.image_url {
                images
                    .entry(item.text.clone())
                    .or_insert_with(|| url.clone());
            }
        }
    }
}

/// The single output of a workflow run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub domain: String,
    pub model: String,
    pub state: WorkflowState,
    /// Unique members in arrival order
    pub domain_members: Vec<String>,
    pub global_attributes: Option<GlobalAttributeSchema>,
    /// One record per member that entered rating, in completion order
    pub rated_attributes: Vec<RatedAttributeRecord>,
    /// Registered members that never entered rating
    pub pending_members: Vec<String>,
    pub logs: Vec<LogEntry>,
    /// Image batches in completion order
    pub batches: Vec<ImageBatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowResult {
    /// Record for `member`, if it entered rating
    pub fn record(&self, member: &str) -> Option<&RatedAttributeRecord> {
        self.rated_attributes.iter().find(|r| r.member == member)
    }

    pub fn successful_count(&self) -> usize {
        self.rated_attributes.iter().filter(|r| r.success).count()
    }

    /// Projection iterations present on any record, ascending
    pub fn projection_iterations(&self) -> Vec<u32> {
        self.rated_attributes
            .iter()
            .flat_map(|r| r.projections().map(|(n, _)| n))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Visualization points from each record's latest projection
    pub fn points(&self) -> Vec<VisualizationPoint> {
        self.rated_attributes
            .iter()
            .map(VisualizationPoint::from_record)
            .collect()
    }
}
