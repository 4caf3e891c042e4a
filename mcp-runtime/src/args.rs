//! Typed accessors over a tool's argument map.

use serde_json::{Map, Value};

use crate::error::ToolError;

pub type Args = Map<String, Value>;

pub fn required_string(args: &Args, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(ToolError::missing(key)),
        Some(Value::String(v)) if v.trim().is_empty() => Err(ToolError::missing(key)),
        Some(Value::String(v)) => Ok(v.clone()),
        Some(_) => Err(ToolError::invalid(key, format!("{key} must be a string"))),
    }
}

pub fn optional_string(args: &Args, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(ToolError::invalid(key, format!("{key} must be a string"))),
    }
}

pub fn optional_bool(args: &Args, key: &str) -> Result<Option<bool>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(v)) => Ok(Some(*v)),
        Some(_) => Err(ToolError::invalid(key, format!("{key} must be a boolean"))),
    }
}

pub fn arg_bool(args: &Args, key: &str, default: bool) -> Result<bool, ToolError> {
    Ok(optional_bool(args, key)?.unwrap_or(default))
}

/// Integers arrive as JSON numbers, possibly fractional. They are truncated and
/// passed on without range checks.
pub fn optional_integer(args: &Args, key: &str) -> Result<Option<i64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| ToolError::invalid(key, format!("{key} must be a number"))),
        Some(_) => Err(ToolError::invalid(key, format!("{key} must be a number"))),
    }
}

pub fn required_integer(args: &Args, key: &str) -> Result<i64, ToolError> {
    optional_integer(args, key)?.ok_or_else(|| ToolError::missing(key))
}

pub fn optional_string_array(args: &Args, key: &str) -> Result<Option<Vec<String>>, ToolError> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let items = value
        .as_array()
        .ok_or_else(|| ToolError::invalid(key, format!("{key} must be an array of strings")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ToolError::invalid(key, format!("{key} items must be strings")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Copies the listed keys, when present, into a request body unchanged.
pub fn pick(args: &Args, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| args.get(*key).map(|value| (key.to_string(), value.clone())))
        .filter(|(_, value)| !value.is_null())
        .collect()
}

pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(v) => Some(v.clone()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_f64().map(|f| (f as i64).to_string()))
                .unwrap_or_else(|| n.to_string()),
        ),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Query string for a paginated list endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pairs: Vec<(String, String)>,
}

impl ListQuery {
    /// Reads `limit`, `offset`, `sort_asc`, `sort_by` and the given string
    /// filters. `default_sort` applies when the caller names no sort key.
    pub fn from_args(
        args: &Args,
        filters: &[&str],
        default_sort: Option<&str>,
    ) -> Result<Self, ToolError> {
        let mut query = Self::default();
        if let Some(limit) = optional_integer(args, "limit")? {
            query.push("limit", limit.to_string());
        }
        if let Some(offset) = optional_integer(args, "offset")? {
            query.push("offset", offset.to_string());
        }
        for &filter in filters {
            if let Some(value) = args.get(filter).and_then(scalar_to_string) {
                if !value.is_empty() {
                    query.push(filter, value);
                }
            }
        }
        if let Some(sort_asc) = optional_bool(args, "sort_asc")? {
            query.push("sort_asc", sort_asc.to_string());
        }
        match optional_string(args, "sort_by")? {
            Some(sort_by) => query.push("sort_by", sort_by),
            None => {
                if let Some(default) = default_sort {
                    query.push("sort_by", default);
                }
            }
        }
        Ok(query)
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Args {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn required_string_rejects_missing_blank_and_non_string() {
        let a = args(json!({"agent_id": "a_1", "blank": " ", "num": 3}));
        assert_eq!(required_string(&a, "agent_id").expect("present"), "a_1");
        assert_eq!(
            required_string(&a, "device_id").expect_err("missing").message,
            "device_id is required"
        );
        assert_eq!(
            required_string(&a, "blank").expect_err("blank").message,
            "blank is required"
        );
        assert_eq!(
            required_string(&a, "num").expect_err("wrong type").message,
            "num must be a string"
        );
    }

    #[test]
    fn list_query_passes_limit_and_offset_through_unchanged() {
        let a = args(json!({"limit": 500, "offset": -5, "sort_asc": true}));
        let query = ListQuery::from_args(&a, &[], Some("hostname")).expect("query");
        assert_eq!(query.get("limit"), Some("500"));
        assert_eq!(query.get("offset"), Some("-5"));
        assert_eq!(query.get("sort_asc"), Some("true"));
        assert_eq!(query.get("sort_by"), Some("hostname"));
    }

    #[test]
    fn list_query_prefers_caller_sort_and_reads_filters() {
        let a = args(json!({"sort_by": "created", "device_id": "d_1", "resolved": false, "limit": 10.0}));
        let query =
            ListQuery::from_args(&a, &["device_id", "resolved", "agent_id"], Some("id")).expect("query");
        assert_eq!(query.get("sort_by"), Some("created"));
        assert_eq!(query.get("device_id"), Some("d_1"));
        assert_eq!(query.get("resolved"), Some("false"));
        assert_eq!(query.get("limit"), Some("10"));
        assert_eq!(query.get("agent_id"), None);
    }

    #[test]
    fn pick_copies_present_non_null_keys() {
        let a = args(json!({"display_name": "x", "hostname": null, "other": 1}));
        let body = pick(&a, &["display_name", "hostname", "missing"]);
        assert_eq!(Value::Object(body), json!({"display_name": "x"}));
    }

    #[test]
    fn string_arrays_must_hold_strings() {
        let a = args(json!({"ok": ["a", "b"], "bad": ["a", 1]}));
        assert_eq!(
            optional_string_array(&a, "ok").expect("ok"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(optional_string_array(&a, "bad").is_err());
        assert_eq!(optional_string_array(&a, "none").expect("absent"), None);
    }
}
