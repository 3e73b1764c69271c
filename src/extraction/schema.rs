//! Response schemas for structured extraction.
//!
//! Every type an agent can answer with implements [`ResponseSchema`]: a JSON
//! schema sent to the model, plus semantic validation applied after the
//! answer has been decoded.

use serde_json::{json, Map, Value};

/// A type a model can be asked to produce.
pub trait ResponseSchema {
    /// Name used for the JSON schema response format.
    fn schema_name() -> &'static str;

    /// JSON schema describing the expected answer.
    fn json_schema() -> Value;

    /// Semantic checks serde cannot express (ranges, cross-field rules).
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Whether a decoded answer should be treated as "no result".
    fn is_empty_answer(&self) -> bool {
        false
    }
}

/// Schema fragment for a closed set of string values.
pub fn enum_schema(values: &[&str], description: &str) -> Value {
    json!({
        "type": "string",
        "enum": values,
        "description": description,
    })
}

/// Render a schema as a compact field listing for prompts.
///
/// Produces one line per property, `name (type): description`, nested
/// objects indented. Models follow this more reliably than raw JSON schema
/// when the provider has no native structured output.
pub fn describe_schema(schema: &Value) -> String {
    let mut out = String::new();
    describe_into(schema, 0, &mut out);
    out
}

fn describe_into(schema: &Value, depth: usize, out: &mut String) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for (name, prop) in properties {
        let indent = "  ".repeat(depth);
        let ty = type_label(prop);
        let marker = if required.contains(&name.as_str()) { ", required" } else { "" };
        let desc = prop.get("description").and_then(Value::as_str).unwrap_or("");
        out.push_str(&format!("{}- {} ({}{}): {}\n", indent, name, ty, marker, desc));

        if prop.get("properties").is_some() {
            describe_into(prop, depth + 1, out);
        } else if let Some(items) = prop.get("items") {
            describe_into(items, depth + 1, out);
        }
    }
}

fn type_label(prop: &Value) -> String {
    if let Some(values) = prop.get("enum").and_then(Value::as_array) {
        let options: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
        return format!("one of {}", options.join(" | "));
    }
    match prop.get("type") {
        Some(Value::String(t)) if t == "array" => {
            let inner = prop.get("items").map(type_label).unwrap_or_else(|| "any".into());
            format!("array of {}", inner)
        }
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        _ => "any".to_string(),
    }
}

/// Wrap a schema in the `response_format` object understood by
/// OpenAI-compatible chat completion APIs.
pub fn response_format(name: &str, schema: &Value) -> Value {
    let mut format = Map::new();
    format.insert("type".into(), json!("json_schema"));
    format.insert(
        "json_schema".into(),
        json!({
            "name": name,
            "schema": schema,
        }),
    );
    Value::Object(format)
}
