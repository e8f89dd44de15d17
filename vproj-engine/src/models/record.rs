//! Rated attribute records
//!
//! One [`RatedAttributeRecord`] exists per member that entered rating. It is
//! created when the rating call settles and later gains an image URL and zero
//! or more projection fields (`batch0_pca`, `batch1_pca`, ...).
//!
//! Serialized shape:
//! ```json
//! {
//!   "member": "red",
//!   "attributes": { "red": { "warmth": 9 }, "imageUrl": null },
//!   "success": true,
//!   "batch0_pca": [0.1, -2.0, 0.3]
//! }
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Rating key → value for one member, as returned by the rating service
pub type Ratings = serde_json::Map<String, Value>;

/// 3D projection coordinates
pub type Coordinates = [f64; 3];

/// Rating-dimension definition for a domain
///
/// Opaque to the pipeline: it is fetched once and passed back verbatim with
/// every rating request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalAttributeSchema(pub Value);

/// Successful rating payload plus the image resolved for the member
#[derive(Debug, Clone, PartialEq)]
pub struct MemberAttributes {
    pub ratings: Ratings,
    pub image_url: Option<String>,
}

/// Field name for projection iteration `n`
pub fn projection_field_name(iteration: u32) -> String {
    format!("batch{}_pca", iteration)
}

/// Enrichment result for one member
#[derive(Debug, Clone, PartialEq)]
pub struct RatedAttributeRecord {
    pub member: String,
    pub attributes: Option<MemberAttributes>,
    pub success: bool,
    pub error: Option<String>,
    projections: BTreeMap<u32, Coordinates>,
}

impl RatedAttributeRecord {
    /// Record for a member whose rating call succeeded
    pub fn succeeded(member: impl Into<String>, ratings: Ratings) -> Self {
        Self {
            member: member.into(),
            attributes: Some(MemberAttributes {
                ratings,
                image_url: None,
            }),
            success: true,
            error: None,
            projections: BTreeMap::new(),
        }
    }

    /// Record for a member whose rating call failed
    pub fn failed(member: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            attributes: None,
            success: false,
            error: Some(error.into()),
            projections: BTreeMap::new(),
        }
    }

    pub fn ratings(&self) -> Option<&Ratings> {
        self.attributes.as_ref().map(|a| &a.ratings)
    }

    pub fn image_url(&self) -> Option<&str> {
        self.attributes.as_ref().and_then(|a| a.image_url.as_deref())
    }

    /// Set the image URL; no-op on failed records
    pub fn set_image_url(&mut self, url: impl Into<String>) -> bool {
        match self.attributes.as_mut() {
            Some(attributes) => {
                attributes.image_url = Some(url.into());
                true
            }
            None => false,
        }
    }

    /// Coordinates written by projection iteration `n`
    pub fn projection(&self, iteration: u32) -> Option<&Coordinates> {
        self.projections.get(&iteration)
    }

    /// All projections, ascending by iteration
    pub fn projections(&self) -> impl Iterator<Item = (u32, &Coordinates)> {
        self.projections.iter().map(|(n, c)| (*n, c))
    }

    /// Highest-numbered projection
    pub fn latest_projection(&self) -> Option<(u32, &Coordinates)> {
        self.projections.iter().next_back().map(|(n, c)| (*n, c))
    }

    /// Write projection `n` once
    ///
    /// Returns `false` and leaves the existing value if `n` was already written.
    pub fn set_projection(&mut self, iteration: u32, coordinates: Coordinates) -> bool {
        if self.projections.contains_key(&iteration) {
            return false;
        }
        self.projections.insert(iteration, coordinates);
        true
    }
}

const IMAGE_URL_KEY: &str = "imageUrl";
const RATINGS_FALLBACK_KEY: &str = "ratings";

/// `{"<member>": ratings, "imageUrl": url}`
///
/// A member literally named `imageUrl` has its ratings written under
/// `ratings` so the object never carries the same key twice.
struct AttributesView<'a> {
    member: &'a str,
    attributes: &'a MemberAttributes,
}

impl Serialize for AttributesView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        let ratings_key = if self.member == IMAGE_URL_KEY {
            RATINGS_FALLBACK_KEY
        } else {
            self.member
        };
        map.serialize_entry(ratings_key, &self.attributes.ratings)?;
        map.serialize_entry(IMAGE_URL_KEY, &self.attributes.image_url)?;
        map.end()
    }
}

impl Serialize for RatedAttributeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("member", &self.member)?;
        if let Some(attributes) = &self.attributes {
            map.serialize_entry(
                "attributes",
                &AttributesView {
                    member: &self.member,
                    attributes,
                },
            )?;
        }
        map.serialize_entry("success", &self.success)?;
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
        }
        for (iteration, coordinates) in &self.projections {
            map.serialize_entry(&projection_field_name(*iteration), coordinates)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ratings(value: Value) -> Ratings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_projection_never_overwritten() {
        let mut record = RatedAttributeRecord::succeeded("red", ratings(json!({"warmth": 9})));

        assert!(record.set_projection(0, [1.0, 2.0, 3.0]));
        assert!(!record.set_projection(0, [9.0, 9.0, 9.0]));
        assert!(record.set_projection(1, [4.0, 5.0, 6.0]));

        assert_eq!(record.projection(0), Some(&[1.0, 2.0, 3.0]));
        assert_eq!(record.latest_projection(), Some((1, &[4.0, 5.0, 6.0])));
    }

    #[test]
    fn test_success_record_serialized_shape() {
        let mut record = RatedAttributeRecord::succeeded("red", ratings(json!({"warmth": 9})));
        record.set_image_url("https://img/red.png");
        record.set_projection(0, [0.5, 0.0, -0.5]);

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            json!({
                "member": "red",
                "attributes": {"red": {"warmth": 9}, "imageUrl": "https://img/red.png"},
                "success": true,
                "batch0_pca": [0.5, 0.0, -0.5]
            })
        );
    }

    #[test]
    fn test_member_named_image_url_keeps_keys_distinct() {
        let mut record =
            RatedAttributeRecord::succeeded("imageUrl", ratings(json!({"warmth": 2})));
        record.set_image_url("https://img/imageUrl.png");

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value["attributes"],
            json!({"ratings": {"warmth": 2}, "imageUrl": "https://img/imageUrl.png"})
        );
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json.matches("\"imageUrl\":").count(), 1);
    }

    #[test]
    fn test_failed_record_has_no_attributes() {
        let mut record = RatedAttributeRecord::failed("X", "boom");

        assert!(!record.set_image_url("https://img/x.png"));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"member": "X", "success": false, "error": "boom"}));
    }

    #[test]
    fn test_projection_field_names_are_numeric_order() {
        let mut record = RatedAttributeRecord::succeeded("a", ratings(json!({"k": 1})));
        for n in [10, 2, 0] {
            record.set_projection(n, [n as f64, 0.0, 0.0]);
        }

        let order: Vec<u32> = record.projections().map(|(n, _)| n).collect();
        assert_eq!(order, vec![0, 2, 10]);
        assert_eq!(projection_field_name(10), "batch10_pca");
    }
}
