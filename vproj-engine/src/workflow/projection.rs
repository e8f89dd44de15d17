//! Incremental projection engine
//!
//! [`ProjectionPolicy`] decides when a pass is due: the first pass needs 5
//! successful records, each later pass 5 more. Only a completed pass advances
//! the policy; a skipped or failed pass leaves it in place so the same
//! threshold is tried again on the next trigger.
//!
//! Each pass writes `batch{iteration}_pca` onto every record it projected.

use super::pca::{project_3d, ProjectionError};
use super::{PipelineParams, WorkflowLogger};
use crate::models::{projection_field_name, Coordinates, RatedAttributeRecord, Ratings};
use serde_json::Value;
use std::collections::HashMap;

/// Threshold bookkeeping for projection passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionPolicy {
    iteration: u32,
    next_threshold: usize,
    step: usize,
}

impl ProjectionPolicy {
    pub fn new(initial_threshold: usize, step: usize) -> Self {
        Self {
            iteration: 0,
            next_threshold: initial_threshold,
            step,
        }
    }

    /// Whether `successful` records meet the current threshold
    pub fn is_due(&self, successful: usize) -> bool {
        successful >= self.next_threshold
    }

    /// Iteration number the next pass will write
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn next_threshold(&self) -> usize {
        self.next_threshold
    }

    pub fn has_run(&self) -> bool {
        self.iteration > 0
    }

    /// Record a completed pass
    pub fn advance(&mut self) {
        self.iteration += 1;
        self.next_threshold += self.step;
    }
}

/// Result of one trigger
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionOutcome {
    /// Threshold not reached
    NotDue,
    /// A pass ran and wrote `iteration` onto `rows` records
    Projected { iteration: u32, rows: usize },
    /// The pass was attempted but did not run; state unchanged
    Skipped(String),
}

/// Runs projection passes over the record list
#[derive(Debug)]
pub struct ProjectionEngine {
    policy: ProjectionPolicy,
    min_rows: usize,
}

impl ProjectionEngine {
    pub fn new(params: &PipelineParams) -> Self {
        Self {
            policy: ProjectionPolicy::new(
                params.projection_initial_threshold,
                params.projection_step,
            ),
            min_rows: params.projection_min_rows,
        }
    }

    pub fn policy(&self) -> &ProjectionPolicy {
        &self.policy
    }

    /// Run a pass if the policy says one is due
    pub fn maybe_run(
        &mut self,
        records: &mut [RatedAttributeRecord],
        log: &WorkflowLogger,
    ) -> ProjectionOutcome {
        let successful = successful_count(records);
        if !self.policy.is_due(successful) {
            return ProjectionOutcome::NotDue;
        }
        self.run(records, log)
    }

    /// End-of-stream trigger
    ///
    /// Same as [`maybe_run`](Self::maybe_run), except that a run which never
    /// projected anything gets one pass regardless of the threshold as long
    /// as there is at least one successful record.
    pub fn finalize(
        &mut self,
        records: &mut [RatedAttributeRecord],
        log: &WorkflowLogger,
    ) -> ProjectionOutcome {
        let successful = successful_count(records);
        if self.policy.is_due(successful) {
            return self.run(records, log);
        }
        if !self.policy.has_run() && successful > 0 {
            log.info(format!(
                "Forcing final projection over {} rated members",
                successful
            ));
            return self.run(records, log);
        }
        ProjectionOutcome::NotDue
    }

    fn run(&mut self, records: &mut [RatedAttributeRecord], log: &WorkflowLogger) -> ProjectionOutcome {
        let iteration = self.policy.iteration();

        match self.project(records, log) {
            Ok(coordinates) => {
                let mut written = 0;
                for record in records.iter_mut() {
                    if let Some(c) = coordinates.get(record.member.as_str()) {
                        if record.set_projection(iteration, *c) {
                            written += 1;
                        }
                    }
                }
                log.success(format!(
                    "Performed projection {} on {} members",
                    projection_field_name(iteration),
                    written
                ));
                self.policy.advance();
                ProjectionOutcome::Projected {
                    iteration,
                    rows: written,
                }
            }
            Err(ProjectionError::InsufficientRows { rows, required }) => {
                let reason = format!(
                    "Skipping projection: {} valid rows, need {}",
                    rows, required
                );
                log.info(reason.clone());
                ProjectionOutcome::Skipped(reason)
            }
            Err(e) => {
                let reason = format!("Projection failed: {}", e);
                log.error(reason.clone());
                ProjectionOutcome::Skipped(reason)
            }
        }
    }

    /// Coordinates keyed by member for every valid successful record
    fn project(
        &self,
        records: &[RatedAttributeRecord],
        log: &WorkflowLogger,
    ) -> Result<HashMap<String, Coordinates>, ProjectionError> {
        let mut valid: Vec<(&str, &Ratings)> = Vec::new();
        for record in records.iter().filter(|r| r.success) {
            match record.ratings() {
                Some(ratings) if !ratings.is_empty() => valid.push((record.member.as_str(), ratings)),
                _ => log.warn(format!(
                    "Skipping {} in projection: missing rating object",
                    record.member
                )),
            }
        }

        let Some((_, first)) = valid.first() else {
            return Err(ProjectionError::InsufficientRows {
                rows: 0,
                required: self.min_rows,
            });
        };

        let keys: Vec<&str> = first
            .iter()
            .filter(|(_, value)| value.is_number())
            .map(|(key, _)| key.as_str())
            .collect();
        if keys.is_empty() {
            return Err(ProjectionError::NoNumericDimensions);
        }

        if valid.len() < self.min_rows {
            return Err(ProjectionError::InsufficientRows {
                rows: valid.len(),
                required: self.min_rows,
            });
        }

        let rows: Vec<Vec<f64>> = valid
            .iter()
            .map(|(_, ratings)| {
                keys.iter()
                    .map(|key| ratings.get(*key).map(numeric_or_zero).unwrap_or(0.0))
                    .collect()
            })
            .collect();

        let projected = project_3d(&rows)?;

        Ok(valid
            .iter()
            .map(|(member, _)| member.to_string())
            .zip(projected)
            .collect())
    }
}

fn successful_count(records: &[RatedAttributeRecord]) -> usize {
    records.iter().filter(|r| r.success).count()
}

/// Numbers as-is, numeric strings parsed, anything else 0
fn numeric_or_zero(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}
