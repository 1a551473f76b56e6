// Structured analysis result with a fixed, guaranteed key space
//
// Downstream consumers rely on key presence, so every produced result passes
// through `normalized()`: known keys the service omitted are filled with an
// explicit null, unknown keys are dropped. Extraction from the service reply
// is deliberately lenient — generative services wrap JSON in prose more often
// than not.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fixed key space for physical measurements
pub const MEASUREMENT_KEYS: [&str; 4] = ["weight", "temperature", "height", "other_measurements"];

/// Fixed key space for feeding details
pub const FEEDING_KEYS: [&str; 4] = ["food_type", "quantity", "feeding_time", "appetite"];

/// Fixed key space for relationships with other animals
pub const RELATIONSHIP_KEYS: [&str; 4] =
    ["interactions", "social_behavior", "dominance", "conflicts"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Description of the animal's behavior and condition
    #[serde(default)]
    pub behavior_state: Option<String>,
    #[serde(default)]
    pub measurements: BTreeMap<String, Value>,
    #[serde(default)]
    pub feeding_details: BTreeMap<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Value>,
}

impl AnalysisResult {
    /// Canonical default returned when the service reply is unusable:
    /// every field present, every value an explicit null.
    pub fn not_determined() -> Self {
        Self {
            behavior_state: None,
            measurements: BTreeMap::new(),
            feeding_details: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
        .normalized()
    }

    /// Enforce the fixed key space: fill missing known keys with null, drop
    /// anything outside the defined sets.
    pub fn normalized(self) -> Self {
        Self {
            behavior_state: self.behavior_state,
            measurements: fixed_key_space(self.measurements, &MEASUREMENT_KEYS),
            feeding_details: fixed_key_space(self.feeding_details, &FEEDING_KEYS),
            relationships: fixed_key_space(self.relationships, &RELATIONSHIP_KEYS),
        }
    }

    /// True when nothing was extracted — behavior unknown and every mapping
    /// value null.
    pub fn is_empty(&self) -> bool {
        self.behavior_state.is_none()
            && self
                .measurements
                .values()
                .chain(self.feeding_details.values())
                .chain(self.relationships.values())
                .all(Value::is_null)
    }
}

fn fixed_key_space(mut map: BTreeMap<String, Value>, keys: &[&str]) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for &key in keys {
        out.insert(key.to_string(), map.remove(key).unwrap_or(Value::Null));
    }
    out
}

/// Locate the outermost brace span in a service reply and parse it.
///
/// Returns None when the reply has no `{`/`}` pair or the span is not valid
/// JSON for an analysis result; callers fall back to the canonical default.
pub fn extract_analysis(reply: &str) -> Option<AnalysisResult> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }

    serde_json::from_str::<AnalysisResult>(&reply[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_from_prose_wrapped_reply() {
        let reply = r#"Here is the structured data you asked for:
            {"behavior_state": "calm, grazing", "measurements": {"weight": "450kg"}}
            Let me know if you need anything else."#;

        let result = extract_analysis(reply).unwrap().normalized();
        assert_eq!(result.behavior_state.as_deref(), Some("calm, grazing"));
        assert_eq!(result.measurements["weight"], json!("450kg"));
        assert_eq!(result.measurements["temperature"], Value::Null);
    }

    #[test]
    fn test_extract_without_braces_returns_none() {
        assert!(extract_analysis("no structured content here").is_none());
        assert!(extract_analysis("").is_none());
    }

    #[test]
    fn test_extract_mismatched_braces_returns_none() {
        assert!(extract_analysis("} backwards {").is_none());
    }

    #[test]
    fn test_extract_invalid_json_returns_none() {
        assert!(extract_analysis("{not valid json}").is_none());
    }

    #[test]
    fn test_normalized_fills_and_drops_keys() {
        let result = AnalysisResult {
            behavior_state: Some("restless".to_string()),
            measurements: BTreeMap::from([("weight".to_string(), json!(42))]),
            feeding_details: BTreeMap::from([("invented_key".to_string(), json!("x"))]),
            relationships: BTreeMap::new(),
        }
        .normalized();

        for key in MEASUREMENT_KEYS {
            assert!(result.measurements.contains_key(key));
        }
        for key in FEEDING_KEYS {
            assert!(result.feeding_details.contains_key(key));
        }
        for key in RELATIONSHIP_KEYS {
            assert!(result.relationships.contains_key(key));
        }
        assert!(!result.feeding_details.contains_key("invented_key"));
        assert_eq!(result.measurements["weight"], json!(42));
    }

    #[test]
    fn test_not_determined_is_empty() {
        let result = AnalysisResult::not_determined();
        assert!(result.is_empty());
        assert_eq!(result.measurements.len(), MEASUREMENT_KEYS.len());
        assert!(result.measurements.values().all(Value::is_null));
    }

    #[test]
    fn test_partial_result_is_not_empty() {
        let result = AnalysisResult {
            behavior_state: None,
            measurements: BTreeMap::from([("weight".to_string(), json!("90kg"))]),
            feeding_details: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
        .normalized();
        assert!(!result.is_empty());
    }
}
