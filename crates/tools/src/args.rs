//! Lenient argument parsing and typed access.

use forgeloop_core::error::ToolError;
use serde_json::{Map, Value};

/// Parsed tool arguments: always a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Map<String, Value>);

impl Args {
    /// Parse the raw argument text a model produced.
    ///
    /// Accepts an empty string (no arguments), a markdown-fenced object, or
    /// a JSON string whose content is itself an object. Anything else that
    /// is not an object is malformed.
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        let trimmed = strip_fence(raw.trim());
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let value: Value =
            serde_json::from_str(trimmed).map_err(|_| ToolError::MalformedArguments)?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            Value::String(inner) => match serde_json::from_str::<Value>(inner.trim()) {
                Ok(Value::Object(map)) => Ok(Self(map)),
                _ => Err(ToolError::MalformedArguments),
            },
            _ => Err(ToolError::MalformedArguments),
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// The raw value, treating JSON `null` as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn str(&self, key: &str) -> Result<&str, ToolError> {
        self.opt_str(key)
            .ok_or_else(|| ToolError::Validation(vec![format!("missing required argument '{key}'")]))
    }

    pub fn opt_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(as_u64)
    }

    pub fn usize_or(&self, key: &str, default: usize) -> usize {
        self.opt_u64(key)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(default)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(as_bool).unwrap_or(default)
    }

    pub fn str_list(&self, key: &str) -> Vec<String> {
        self.get(key).and_then(as_str_list).unwrap_or_default()
    }
}

/// Integers, or strings holding one.
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Booleans, or the strings `"true"` / `"false"`.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// An array of strings, or a single string as a one-element list.
pub fn as_str_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_object() {
        let args = Args::parse(r#"{"path":"a.txt","limit":3}"#).unwrap();
        assert_eq!(args.opt_str("path"), Some("a.txt"));
        assert_eq!(args.usize_or("limit", 10), 3);
    }

    #[test]
    fn empty_and_null_mean_no_arguments() {
        assert_eq!(Args::parse("").unwrap(), Args::default());
        assert_eq!(Args::parse("  null ").unwrap(), Args::default());
    }

    #[test]
    fn fenced_and_double_encoded_objects() {
        let fenced = Args::parse("```json\n{\"path\": \"x\"}\n```").unwrap();
        assert_eq!(fenced.opt_str("path"), Some("x"));

        let nested = Args::parse(r#""{\"path\": \"y\"}""#).unwrap();
        assert_eq!(nested.opt_str("path"), Some("y"));
    }

    #[test]
    fn malformed_inputs() {
        for raw in ["{\"path\": ", "[1,2]", "42", r#""just text""#, "not json"] {
            assert!(
                matches!(Args::parse(raw), Err(ToolError::MalformedArguments)),
                "{raw}"
            );
        }
    }

    #[test]
    fn lenient_scalars() {
        let args = Args::from_value(json!({
            "n": "12",
            "flag": "TRUE",
            "paths": "src",
            "nothing": null
        }));
        assert_eq!(args.usize_or("n", 0), 12);
        assert!(args.bool_or("flag", false));
        assert_eq!(args.str_list("paths"), vec!["src".to_string()]);
        assert!(args.get("nothing").is_none());
        assert!(args.str("nothing").is_err());
    }
}
