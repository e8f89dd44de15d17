//! Visualization points derived from rated records

use super::record::RatedAttributeRecord;
use serde::Serialize;

/// A member positioned by its most recent projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationPoint {
    pub member: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub image_url: Option<String>,
}

impl VisualizationPoint {
    /// Point at the record's highest-numbered projection, or the origin
    pub fn from_record(record: &RatedAttributeRecord) -> Self {
        let [x, y, z] = record
            .latest_projection()
            .map(|(_, c)| *c)
            .unwrap_or([0.0, 0.0, 0.0]);

        Self {
            member: record.member.clone(),
            x,
            y,
            z,
            image_url: record.image_url().map(str::to_string),
        }
    }
}
