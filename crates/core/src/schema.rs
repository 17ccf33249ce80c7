//! Typed argument schemas for tools.
//!
//! Tools declare their arguments as a list of [`FieldSpec`]s instead of a
//! free-form JSON Schema. The dispatcher validates and canonicalizes raw
//! arguments against it before anything else happens, and the same schema is
//! rendered to JSON Schema for the reasoning provider.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ToolFailure;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The type of a single argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    /// Calendar date in `YYYY-MM-DD` form
    Date,
    /// One of a fixed set of strings
    Enum(Vec<String>),
}

/// Normalization applied to string values before caching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalize {
    #[default]
    Trim,
    Uppercase,
    Lowercase,
}

/// One named argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub normalize: Normalize,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            default: None,
            normalize: Normalize::Trim,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer, description)
    }

    pub fn date(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn uppercase(mut self) -> Self {
        self.normalize = Normalize::Uppercase;
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.normalize = Normalize::Lowercase;
        self
    }

    fn check(&self, value: &serde_json::Value) -> Result<serde_json::Value, String> {
        use serde_json::Value;

        match (&self.kind, value) {
            (FieldKind::String, Value::String(s)) => {
                let s = self.normalize_str(s);
                if s.is_empty() {
                    return Err(format!("field `{}` must not be empty", self.name));
                }
                Ok(Value::String(s))
            }
            (FieldKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Ok(value.clone())
            }
            (FieldKind::Number, Value::Number(_)) => Ok(value.clone()),
            (FieldKind::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (FieldKind::Date, Value::String(s)) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .map_err(|_| format!("field `{}` must be a date in YYYY-MM-DD form", self.name)),
            (FieldKind::Enum(allowed), Value::String(s)) => {
                let s = self.normalize_str(s);
                if allowed.iter().any(|a| a == &s) {
                    Ok(Value::String(s))
                } else {
                    Err(format!(
                        "field `{}` must be one of [{}]",
                        self.name,
                        allowed.join(", ")
                    ))
                }
            }
            (kind, _) => Err(format!(
                "field `{}` must be of type {}",
                self.name,
                kind_label(kind)
            )),
        }
    }

    fn normalize_str(&self, s: &str) -> String {
        let trimmed = s.trim();
        match self.normalize {
            Normalize::Trim => trimmed.to_string(),
            Normalize::Uppercase => trimmed.to_uppercase(),
            Normalize::Lowercase => trimmed.to_lowercase(),
        }
    }

    fn json_schema(&self) -> serde_json::Value {
        let mut schema = match &self.kind {
            FieldKind::String => serde_json::json!({ "type": "string" }),
            FieldKind::Integer => serde_json::json!({ "type": "integer" }),
            FieldKind::Number => serde_json::json!({ "type": "number" }),
            FieldKind::Boolean => serde_json::json!({ "type": "boolean" }),
            FieldKind::Date => serde_json::json!({ "type": "string", "format": "date" }),
            FieldKind::Enum(values) => serde_json::json!({ "type": "string", "enum": values }),
        };
        schema["description"] = serde_json::Value::String(self.description.clone());
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

fn kind_label(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::String => "string",
        FieldKind::Integer => "integer",
        FieldKind::Number => "number",
        FieldKind::Boolean => "boolean",
        FieldKind::Date => "date",
        FieldKind::Enum(_) => "enum",
    }
}

/// The full argument list of a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSchema {
    fields: Vec<FieldSpec>,
}

impl ArgumentSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate raw arguments and produce their canonical form.
    ///
    /// `null` is accepted as "no arguments". Unknown fields are rejected so a
    /// misspelled argument never silently turns into a cache miss.
    pub fn validate(&self, raw: &serde_json::Value) -> Result<CanonicalArgs, ToolFailure> {
        let empty = serde_json::Map::new();
        let object = match raw {
            serde_json::Value::Null => &empty,
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(ToolFailure::Argument(
                    "arguments must be a JSON object".into(),
                ));
            }
        };

        if let Some(unknown) = object
            .keys()
            .find(|k| !self.fields.iter().any(|f| &f.name == *k))
        {
            return Err(ToolFailure::Argument(format!("unknown field `{unknown}`")));
        }

        let mut canonical = BTreeMap::new();
        for spec in &self.fields {
            match object.get(&spec.name) {
                Some(value) if !value.is_null() => {
                    let normalized = spec.check(value).map_err(ToolFailure::Argument)?;
                    canonical.insert(spec.name.clone(), normalized);
                }
                _ => {
                    if let Some(default) = &spec.default {
                        canonical.insert(spec.name.clone(), default.clone());
                    } else if spec.required {
                        return Err(ToolFailure::Argument(format!(
                            "missing required field `{}`",
                            spec.name
                        )));
                    }
                }
            }
        }

        Ok(CanonicalArgs(canonical))
    }

    /// Render as a JSON Schema object for the provider.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

/// Validated arguments with a stable key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalArgs(BTreeMap<String, serde_json::Value>);

impl CanonicalArgs {
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(|v| v.as_i64())
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone().into_iter().collect())
    }

    /// Deterministic text form; identical for semantically equal arguments.
    pub fn canonical_string(&self) -> String {
        // BTreeMap iteration is sorted, and nested values are produced by
        // `check`, so serialization is stable.
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_schema() -> ArgumentSchema {
        ArgumentSchema::new()
            .field(FieldSpec::string("ticker", "Ticker symbol, e.g. NVDA").required().uppercase())
            .field(FieldSpec::integer("limit", "Max items").with_default(serde_json::json!(5)))
    }

    #[test]
    fn validates_and_normalizes() {
        let args = price_schema()
            .validate(&serde_json::json!({"ticker": "  nvda "}))
            .unwrap();
        assert_eq!(args.get_str("ticker"), Some("NVDA"));
        assert_eq!(args.get_i64("limit"), Some(5));
    }

    #[test]
    fn canonical_form_ignores_key_order_and_case() {
        let schema = price_schema();
        let a = schema
            .validate(&serde_json::json!({"ticker": "nvda", "limit": 3}))
            .unwrap();
        let b = schema
            .validate(&serde_json::json!({"limit": 3, "ticker": "NVDA"}))
            .unwrap();
        assert_eq!(a.canonical_string(), b.canonical_string());
    }

    #[test]
    fn missing_required_field() {
        let err = price_schema().validate(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ToolFailure::Argument(ref m) if m.contains("ticker")));
    }

    #[test]
    fn wrong_type_rejected() {
        let err = price_schema()
            .validate(&serde_json::json!({"ticker": 42}))
            .unwrap_err();
        assert!(matches!(err, ToolFailure::Argument(ref m) if m.contains("string")));
    }

    #[test]
    fn unknown_field_rejected() {
        let err = price_schema()
            .validate(&serde_json::json!({"ticker": "X", "tickr": "Y"}))
            .unwrap_err();
        assert!(matches!(err, ToolFailure::Argument(ref m) if m.contains("tickr")));
    }

    #[test]
    fn non_object_rejected() {
        let err = price_schema()
            .validate(&serde_json::json!(["X"]))
            .unwrap_err();
        assert!(matches!(err, ToolFailure::Argument(_)));
    }

    #[test]
    fn empty_string_rejected() {
        let err = price_schema()
            .validate(&serde_json::json!({"ticker": "   "}))
            .unwrap_err();
        assert!(matches!(err, ToolFailure::Argument(ref m) if m.contains("empty")));
    }

    #[test]
    fn dates_are_checked() {
        let schema = ArgumentSchema::new().field(FieldSpec::date("start_date", "Start").required());
        assert!(schema
            .validate(&serde_json::json!({"start_date": "2024-01-31"}))
            .is_ok());
        assert!(schema
            .validate(&serde_json::json!({"start_date": "31/01/2024"}))
            .is_err());
    }

    #[test]
    fn enum_values_are_checked() {
        let schema = ArgumentSchema::new().field(
            FieldSpec::new(
                "interval",
                FieldKind::Enum(vec!["daily".into(), "monthly".into()]),
                "Sampling interval",
            )
            .lowercase(),
        );
        let args = schema
            .validate(&serde_json::json!({"interval": "Monthly"}))
            .unwrap();
        assert_eq!(args.get_str("interval"), Some("monthly"));
        assert!(schema
            .validate(&serde_json::json!({"interval": "hourly"}))
            .is_err());
    }

    #[test]
    fn null_means_no_arguments() {
        let schema = ArgumentSchema::new().field(FieldSpec::string("query", "Query"));
        let args = schema.validate(&serde_json::Value::Null).unwrap();
        assert_eq!(args.canonical_string(), "{}");
    }

    #[test]
    fn json_schema_rendering() {
        let schema = price_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["ticker"]["type"], "string");
        assert_eq!(schema["required"], serde_json::json!(["ticker"]));
        assert_eq!(schema["properties"]["limit"]["default"], 5);
    }
}
