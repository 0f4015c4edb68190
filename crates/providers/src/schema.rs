//! Schema post-processing for native schema-constrained decoding.
//!
//! Strict structured-output endpoints accept only a subset of JSON Schema:
//! every object closed, every property required, no `oneOf`, and no
//! validation keywords such as `format` or `minItems`. [`strictify`] rewrites
//! a generated schema into that subset. Constraints removed here are still
//! enforced when the decoded value is validated.

use serde_json::{Map, Value};

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "$schema",
    "definitions",
    "format",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "default",
];

/// Rewrite `schema` into the strict subset.
pub fn strictify(schema: &Value) -> Value {
    let mut out = schema.clone();
    rewrite(&mut out);
    out
}

fn rewrite(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in UNSUPPORTED_KEYWORDS {
                map.remove(*key);
            }

            if let Some(one_of) = map.remove("oneOf") {
                map.insert("anyOf".into(), one_of);
            }

            merge_all_of(map);

            for (key, child) in map.iter_mut() {
                match (key.as_str(), child) {
                    // Keys of `properties` are field names, not keywords.
                    ("properties", Value::Object(props)) => props.values_mut().for_each(rewrite),
                    (_, child) => rewrite(child),
                }
            }

            close_object(map);
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite),
        _ => {}
    }
}

/// Fold an `allOf` of object schemas into the parent object.
fn merge_all_of(map: &mut Map<String, Value>) {
    let Some(Value::Array(parts)) = map.remove("allOf") else {
        return;
    };

    for part in parts {
        let Value::Object(part) = part else { continue };
        for (key, value) in part {
            match (key.as_str(), map.get_mut(&key)) {
                ("properties", Some(Value::Object(existing))) => {
                    if let Value::Object(props) = value {
                        existing.extend(props);
                    }
                }
                ("required", Some(Value::Array(existing))) => {
                    if let Value::Array(req) = value {
                        existing.extend(req);
                    }
                }
                (_, Some(_)) => {}
                (_, None) => {
                    map.insert(key, value);
                }
            }
        }
    }
}

fn close_object(map: &mut Map<String, Value>) {
    let Some(Value::Object(props)) = map.get("properties") else {
        return;
    };
    let required: Vec<Value> = props.keys().cloned().map(Value::String).collect();
    map.insert("required".into(), Value::Array(required));
    map.insert("additionalProperties".into(), Value::Bool(false));
    map.entry("type").or_insert_with(|| Value::String("object".into()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepwise_core::Decision;

    fn walk<'a>(value: &'a Value, found: &mut Vec<&'a Map<String, Value>>) {
        match value {
            Value::Object(map) => {
                found.push(map);
                map.values().for_each(|v| walk(v, found));
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, found)),
            _ => {}
        }
    }

    #[test]
    fn every_object_is_closed_and_fully_required() {
        let strict = strictify(&Decision::json_schema());
        let mut maps = Vec::new();
        walk(&strict, &mut maps);

        for map in maps {
            if let Some(Value::Object(props)) = map.get("properties") {
                assert_eq!(map["additionalProperties"], false);
                let required = map["required"].as_array().unwrap();
                assert_eq!(required.len(), props.len());
            }
            assert!(!map.contains_key("oneOf"));
            assert!(!map.contains_key("allOf"));
            assert!(!map.contains_key("format"));
            assert!(!map.contains_key("maxItems"));
            assert!(!map.contains_key("$schema"));
        }
    }

    #[test]
    fn one_of_becomes_any_of() {
        let strict = strictify(&json!({"oneOf": [{"type": "string"}, {"type": "null"}]}));
        assert_eq!(strict["anyOf"].as_array().unwrap().len(), 2);
        assert!(strict.get("oneOf").is_none());
    }

    #[test]
    fn all_of_is_merged() {
        let strict = strictify(&json!({
            "allOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}},
                {"properties": {"b": {"type": "integer", "minimum": 0}}}
            ]
        }));
        assert_eq!(strict["type"], "object");
        assert_eq!(strict["required"], json!(["a", "b"]));
        assert!(strict["properties"]["b"].get("minimum").is_none());
    }

    #[test]
    fn property_named_like_keyword_survives() {
        // "format" is stripped as a keyword, not as a property name.
        let strict = strictify(&json!({
            "type": "object",
            "properties": {"format": {"type": "string", "format": "date"}}
        }));
        assert!(strict["properties"].get("format").is_some());
        assert!(strict["properties"]["format"].get("format").is_none());
    }
}
