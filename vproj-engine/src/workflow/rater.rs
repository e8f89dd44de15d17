//! Concurrent per-member rating
//!
//! Every member of an arrival batch is rated in parallel. Each call settles
//! into exactly one record, success or failure; one failure never affects its
//! siblings. Records come back in completion order.

use super::WorkflowLogger;
use crate::models::{GlobalAttributeSchema, RatedAttributeRecord};
use crate::services::AttributeService;
use futures::stream::{self, StreamExt};

/// Rate `members`, at most `cap` calls in flight (`None` = all at once)
pub async fn rate_members(
    service: &dyn AttributeService,
    members: Vec<String>,
    schema: &GlobalAttributeSchema,
    cap: Option<usize>,
    log: &WorkflowLogger,
) -> Vec<RatedAttributeRecord> {
    if members.is_empty() {
        return Vec::new();
    }

    let width = cap.unwrap_or(members.len()).clamp(1, members.len());
    tracing::debug!(members = members.len(), width, "Rating arrival batch");

    stream::iter(members)
        .map(|member| async move {
            match service.rate_member(&member, schema).await {
                Ok(ratings) => {
                    log.debug(format!("Rated {} ({} attributes)", member, ratings.len()));
                    RatedAttributeRecord::succeeded(member, ratings)
                }
                Err(e) => {
                    log.error(format!("Failed to rate {}: {}", member, e));
                    RatedAttributeRecord::failed(member, e.to_string())
                }
            }
        })
        .buffer_unordered(width)
        .collect()
        .await
}
