//! Global schema and per-member rating client
//!
//! Both calls POST JSON to the attributes endpoint and receive a line-oriented
//! event response whose last data line is the result object.

use super::event_lines::parse_last_data_json;
use super::{check_status, AttributeService, ServiceError};
use crate::models::{GlobalAttributeSchema, Ratings};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

const GLOBAL_ATTRIBUTE_INSTRUCTION: &str = "globalAttribute";
const RATE_ATTRIBUTES_INSTRUCTION: &str = "rateAttributes";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SchemaRequest<'a> {
    domain: &'a str,
    sample_members: &'a [String],
    instruction_key: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RatingRequest<'a> {
    member: &'a str,
    global_attributes: &'a GlobalAttributeSchema,
    instruction_key: &'static str,
}

/// HTTP client for the attributes endpoint
pub struct HttpAttributeService {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpAttributeService {
    pub fn new(http_client: reqwest::Client, endpoint: String) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }

    async fn post_for_json<T: Serialize + ?Sized>(&self, body: &T) -> Result<Value, ServiceError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let text = check_status(response)
            .await?
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        parse_last_data_json(&text)
    }
}

#[async_trait]
impl AttributeService for HttpAttributeService {
    async fn fetch_global_schema(
        &self,
        domain: &str,
        sample_members: &[String],
    ) -> Result<GlobalAttributeSchema, ServiceError> {
        tracing::debug!(domain, samples = sample_members.len(), "Requesting global schema");

        let value = self
            .post_for_json(&SchemaRequest {
                domain,
                sample_members,
                instruction_key: GLOBAL_ATTRIBUTE_INSTRUCTION,
            })
            .await?;

        if !value.is_object() {
            return Err(ServiceError::MalformedResponse(format!(
                "schema must be a JSON object, got {}",
                json_kind(&value)
            )));
        }

        Ok(GlobalAttributeSchema(value))
    }

    async fn rate_member(
        &self,
        member: &str,
        schema: &GlobalAttributeSchema,
    ) -> Result<Ratings, ServiceError> {
        tracing::debug!(member, "Requesting member ratings");

        let value = self
            .post_for_json(&RatingRequest {
                member,
                global_attributes: schema,
                instruction_key: RATE_ATTRIBUTES_INSTRUCTION,
            })
            .await?;

        normalize_ratings(member, value)
    }
}

/// Reduce a rating response to the bare ratings object
///
/// Accepts `{ "<member>": { ...ratings } }` and `{ ...ratings }`.
pub fn normalize_ratings(member: &str, value: Value) -> Result<Ratings, ServiceError> {
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(ServiceError::MalformedResponse(format!(
                "ratings for '{}' must be a JSON object, got {}",
                member,
                json_kind(&other)
            )))
        }
    };

    match map.remove(member) {
        Some(Value::Object(inner)) => Ok(inner),
        Some(other) => {
            // A rating key that happens to equal the member name
            map.insert(member.to_string(), other);
            Ok(map)
        }
        None => Ok(map),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_keyed_and_bare_normalize_identically() {
        let keyed = normalize_ratings("red", json!({"red": {"warmth": 9, "depth": 2}})).unwrap();
        let bare = normalize_ratings("red", json!({"warmth": 9, "depth": 2})).unwrap();

        assert_eq!(keyed, bare);
        assert_eq!(keyed.get("warmth"), Some(&json!(9)));
    }

    #[test]
    fn test_scalar_under_member_key_is_a_rating() {
        let ratings = normalize_ratings("size", json!({"size": 4, "weight": 1})).unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings.get("size"), Some(&json!(4)));
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = normalize_ratings("red", json!([1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("got array"));
    }

    #[test]
    fn test_request_bodies_use_camel_case() {
        let samples = vec!["red".to_string(), "green".to_string()];
        let body = serde_json::to_value(SchemaRequest {
            domain: "colors",
            sample_members: &samples,
            instruction_key: GLOBAL_ATTRIBUTE_INSTRUCTION,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"domain": "colors", "sampleMembers": ["red", "green"], "instructionKey": "globalAttribute"})
        );

        let schema = GlobalAttributeSchema(json!({"warmth": "0-10"}));
        let body = serde_json::to_value(RatingRequest {
            member: "red",
            global_attributes: &schema,
            instruction_key: RATE_ATTRIBUTES_INSTRUCTION,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"member": "red", "globalAttributes": {"warmth": "0-10"}, "instructionKey": "rateAttributes"})
        );
    }
}
