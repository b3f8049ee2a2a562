//! Tool input schemas in the shape the model API accepts.
//!
//! Tool servers publish JSON schemas of varying quality. The model API only
//! accepts `{type: "object", properties, required}`, so every schema is
//! funnelled through [`normalize`] before it reaches the tool catalog.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaType {
    #[default]
    #[serde(rename = "object")]
    Object,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl NormalizedSchema {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The `{ "json": … }` envelope the tool catalog wraps schemas in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    pub json: NormalizedSchema,
}

impl From<NormalizedSchema> for ToolInputSchema {
    fn from(json: NormalizedSchema) -> Self {
        Self { json }
    }
}

/// One entry of the tool catalog handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// Converts whatever the tool server sent into a [`NormalizedSchema`].
///
/// Never fails: absent or non-object input, a non-object `properties` and a
/// `required` that is not a list of strings all degrade to empty values.
/// Fields other than `properties` and `required` are dropped.
pub fn normalize(raw: Option<&Value>) -> NormalizedSchema {
    let Some(Value::Object(schema)) = raw else {
        return NormalizedSchema::empty();
    };

    let properties = match schema.get("properties") {
        Some(Value::Object(properties)) => properties.clone(),
        _ => Map::new(),
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .unwrap_or_default();

    NormalizedSchema {
        schema_type: SchemaType::Object,
        properties,
        required,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_json() -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    #[test]
    fn degrades_missing_and_malformed_input_to_empty_schema() {
        let inputs = [
            None,
            Some(json!(null)),
            Some(json!(42)),
            Some(json!("object")),
            Some(json!(["properties"])),
            Some(json!({})),
            Some(json!({"properties": "not a map", "required": "id"})),
            Some(json!({"properties": [1, 2], "required": [1, "id"]})),
        ];

        for input in inputs {
            let schema = normalize(input.as_ref());
            assert_eq!(
                serde_json::to_value(&schema).expect("serialize"),
                empty_json(),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn passes_properties_and_required_through_and_drops_the_rest() {
        let raw = json!({
            "type": "object",
            "$schema": "http://json-schema.org/draft-07/schema#",
            "additionalProperties": false,
            "properties": {
                "query": {"type": "string", "description": "SQL to run"},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["query"]
        });

        let schema = normalize(Some(&raw));
        let encoded = serde_json::to_value(&schema).expect("serialize");

        assert_eq!(encoded["type"], "object");
        assert_eq!(encoded["properties"], raw["properties"]);
        assert_eq!(encoded["required"], json!(["query"]));
        let keys: Vec<_> = encoded
            .as_object()
            .expect("object")
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys.len(), 3);
        assert!(encoded.get("additionalProperties").is_none());
        assert!(encoded.get("$schema").is_none());
    }

    #[test]
    fn envelope_wraps_schema_under_json_key() {
        let envelope = ToolInputSchema::from(NormalizedSchema::empty());
        assert_eq!(
            serde_json::to_value(&envelope).expect("serialize"),
            json!({"json": empty_json()})
        );
    }
}
