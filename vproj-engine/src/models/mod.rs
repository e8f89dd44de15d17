//! Data models for the enrichment workflow

pub mod point;
pub mod record;
pub mod workflow_result;

pub use point::VisualizationPoint;
pub use record::{
    projection_field_name, Coordinates, GlobalAttributeSchema, MemberAttributes,
    RatedAttributeRecord, Ratings,
};
pub use workflow_result::{
    ImageBatchItem, ImageBatchResult, ImageMap, WorkflowResult, WorkflowState,
};
