//! # Schema validator (C3)
//!
//! Validates a JSON-schema value against a document value, both modeled as
//! `serde_json::Value` key-value trees. Pure and side-effect free: an empty
//! schema validates any document successfully.

use jsonschema::Validator;
use serde_json::Value;

/// Validate `document` against `schema`. Returns the list of violation
/// messages (empty on success).
///
/// An empty schema object (`{}`) — or a schema that is JSON `null` — is
/// treated as "anything goes" and always succeeds, per §4.3.
pub fn validate(schema: &Value, document: &Value) -> Result<(), Vec<String>> {
    if is_empty_schema(schema) {
        return Ok(());
    }

    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => return Err(vec![format!("invalid schema: {e}")]),
    };

    let violations = collect_violations(&validator, document);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn collect_violations(validator: &Validator, document: &Value) -> Vec<String> {
    validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect()
}

fn is_empty_schema(schema: &Value) -> bool {
    matches!(schema, Value::Null) || matches!(schema, Value::Object(map) if map.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_schema_validates_anything() {
        assert!(validate(&json!({}), &json!({"anything": "goes"})).is_ok());
        assert!(validate(&Value::Null, &json!(42)).is_ok());
    }

    #[test]
    fn required_field_violation_is_reported() {
        let schema = json!({
            "type": "object",
            "required": ["franchiseId"],
            "properties": { "franchiseId": { "type": "string" } }
        });
        let result = validate(&schema, &json!({}));
        assert!(result.is_err());
        let violations = result.unwrap_err();
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn matching_document_validates() {
        let schema = json!({
            "type": "object",
            "required": ["franchiseId"],
            "properties": { "franchiseId": { "type": "string" } }
        });
        let result = validate(&schema, &json!({"franchiseId": "F1"}));
        assert!(result.is_ok());
    }

    #[test]
    fn type_mismatch_is_reported() {
        let schema = json!({ "type": "object", "properties": { "count": { "type": "integer" } } });
        let result = validate(&schema, &json!({"count": "not a number"}));
        assert!(result.is_err());
    }

    #[test]
    fn multiple_violations_are_all_reported() {
        let schema = json!({
            "type": "object",
            "required": ["a", "b"],
            "properties": { "a": { "type": "string" }, "b": { "type": "number" } }
        });
        let result = validate(&schema, &json!({}));
        assert_eq!(result.unwrap_err().len(), 2);
    }
}
