//! Image reconciliation

use crate::models::{ImageMap, RatedAttributeRecord};

/// Copy resolved image URLs onto successful records
///
/// Records without a map entry keep a null image. Returns how many records
/// received a URL.
pub fn reconcile_images(records: &mut [RatedAttributeRecord], images: &ImageMap) -> usize {
    let mut updated = 0;
    for record in records.iter_mut().filter(|r| r.success) {
        if let Some(url) = images.get(&record.member) {
            if record.set_image_url(url.clone()) {
                updated += 1;
            }
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reconcile_only_touches_matching_successes() {
        let ratings = json!({"k": 1}).as_object().cloned().unwrap();
        let mut records = vec![
            RatedAttributeRecord::succeeded("red", ratings.clone()),
            RatedAttributeRecord::succeeded("blue", ratings),
            RatedAttributeRecord::failed("X", "down"),
        ];
        let images: ImageMap = [
            ("red".to_string(), "https://img/red".to_string()),
            ("X".to_string(), "https://img/x".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(reconcile_images(&mut records, &images), 1);

        assert_eq!(records[0].image_url(), Some("https://img/red"));
        assert_eq!(records[1].image_url(), None);
        assert!(records[2].attributes.is_none());
    }
}
