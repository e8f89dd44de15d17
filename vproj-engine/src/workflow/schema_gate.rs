//! One-shot global schema resolution
//!
//! The schema is requested once, when enough members are waiting for it. A
//! failed request is final for the run: the gate never asks again and the
//! waiting members stay pending.

use super::WorkflowLogger;
use crate::models::GlobalAttributeSchema;
use crate::services::AttributeService;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaStatus {
    Unrequested,
    Ready(GlobalAttributeSchema),
    Failed(String),
}

#[derive(Debug)]
pub struct SchemaGate {
    threshold: usize,
    status: SchemaStatus,
}

impl SchemaGate {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            status: SchemaStatus::Unrequested,
        }
    }

    /// True while the schema is unrequested and `pending` has reached the threshold
    pub fn should_fetch(&self, pending: usize) -> bool {
        self.status == SchemaStatus::Unrequested && pending >= self.threshold
    }

    pub fn status(&self) -> &SchemaStatus {
        &self.status
    }

    pub fn schema(&self) -> Option<&GlobalAttributeSchema> {
        match &self.status {
            SchemaStatus::Ready(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.status != SchemaStatus::Unrequested
    }

    /// Fetch the schema from `sample_members`
    ///
    /// Only the first call reaches the service; later calls return whatever
    /// the first one produced.
    pub async fn resolve(
        &mut self,
        service: &dyn AttributeService,
        domain: &str,
        sample_members: &[String],
        log: &WorkflowLogger,
    ) -> Option<GlobalAttributeSchema> {
        if self.is_requested() {
            return self.schema().cloned();
        }

        log.info(format!("First batch reached: {}", sample_members.join(", ")));

        match service.fetch_global_schema(domain, sample_members).await {
            Ok(schema) => {
                log.success("Global attributes fetched successfully");
                self.status = SchemaStatus::Ready(schema.clone());
                Some(schema)
            }
            Err(e) => {
                log.error(format!("Error fetching global attributes: {}", e));
                self.status = SchemaStatus::Failed(e.to_string());
                None
            }
        }
    }
}
