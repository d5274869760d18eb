//! Data types shared by the gateway, paginator and node loop.
//!
//! Based on:
//! - the Gigstack v2 list envelope (`{data, has_more, next}`)
//! - the webhook subscription resource
//! - n8n's item shape (`{json, pairedItem}`)

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object (equivalent to IDataObject in n8n).
pub type DataObject = Map<String, Value>;

// ═══════════════════════════════════════════════════════════════════════════
// Request Types
// ═══════════════════════════════════════════════════════════════════════════

/// HTTP methods used by the Gigstack API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single REST call, built fresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Relative path starting with `/`, appended to the API base URL.
    pub path: String,
    #[serde(default)]
    pub body: DataObject,
    #[serde(default)]
    pub query: DataObject,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: DataObject::new(),
            query: DataObject::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_body(mut self, body: DataObject) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, query: DataObject) -> Self {
        self.query = query;
        self
    }

    /// Set a single query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

/// Encode a query mapping as wire pairs.
///
/// Strings go out verbatim, everything else as its JSON text
/// (`100`, `true`, `["a","b"]`).
pub fn query_pairs(query: &DataObject) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(key, value)| {
            let encoded = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), encoded)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Response Types
// ═══════════════════════════════════════════════════════════════════════════

/// One page of a list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl PageEnvelope {
    /// Read an envelope out of a raw response without failing.
    ///
    /// A missing or non-array `data` becomes an empty page, `has_more` counts
    /// only when it is literally `true`, and an empty `next` is no cursor.
    pub fn from_response(response: &Value) -> Self {
        let data = match response.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let has_more = matches!(response.get("has_more"), Some(Value::Bool(true)));
        let next = response
            .get("next")
            .and_then(Value::as_str)
            .filter(|cursor| !cursor.is_empty())
            .map(str::to_string);

        Self {
            data,
            has_more,
            next,
        }
    }

    /// The next cursor, only when the page says there is more and names it.
    pub fn continuation(&self) -> Option<&str> {
        if self.has_more {
            self.next.as_deref()
        } else {
            None
        }
    }
}

/// A push subscription registered with Gigstack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Execution Records
// ═══════════════════════════════════════════════════════════════════════════

/// Lineage from an output record back to the input item that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedItemData {
    pub item: usize,
}

/// One workflow item flowing into or out of a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionData {
    pub json: DataObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<PairedItemData>,
}

impl NodeExecutionData {
    pub fn new(json: DataObject) -> Self {
        Self {
            json,
            paired_item: None,
        }
    }

    /// Wrap an arbitrary payload as an item.
    ///
    /// Objects are used as-is, `null` becomes an empty object and any other
    /// value is stored under `value`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(json) => Self::new(json),
            Value::Null => Self::default(),
            other => {
                let mut json = DataObject::new();
                json.insert("value".to_string(), other);
                Self::new(json)
            }
        }
    }

    /// The `{error: message}` marker emitted for a failed item.
    pub fn error_marker(message: impl Into<String>) -> Self {
        let mut json = DataObject::new();
        json.insert("error".to_string(), Value::String(message.into()));
        Self::new(json)
    }

    pub fn with_paired_item(mut self, item: usize) -> Self {
        self.paired_item = Some(PairedItemData { item });
        self
    }

    pub fn is_error_marker(&self) -> bool {
        self.json.len() == 1 && self.json.contains_key("error")
    }
}

/// Turn a payload into items: arrays fan out, anything else is one item.
pub fn items_from_payload(payload: Value) -> Vec<NodeExecutionData> {
    match payload {
        Value::Array(elements) => elements
            .into_iter()
            .map(NodeExecutionData::from_value)
            .collect(),
        other => vec![NodeExecutionData::from_value(other)],
    }
}

/// JavaScript-style truthiness, used wherever a falsy parameter means
/// "not provided".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness_matches_parameter_semantics() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(25)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_query_pairs_encoding() {
        let mut query = DataObject::new();
        query.insert("limit".into(), json!(100));
        query.insert("status".into(), json!("succeeded"));
        query.insert("livemode".into(), json!(true));

        let pairs = query_pairs(&query);
        assert!(pairs.contains(&("limit".to_string(), "100".to_string())));
        assert!(pairs.contains(&("status".to_string(), "succeeded".to_string())));
        assert!(pairs.contains(&("livemode".to_string(), "true".to_string())));
    }

    #[test]
    fn test_page_envelope_permissive_parsing() {
        let page = PageEnvelope::from_response(&json!({
            "data": [{"id": "a"}],
            "has_more": true,
            "next": "cur_1"
        }));
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.continuation(), Some("cur_1"));

        let no_cursor = PageEnvelope::from_response(&json!({"data": [], "has_more": true}));
        assert_eq!(no_cursor.continuation(), None);

        let stringly = PageEnvelope::from_response(&json!({"has_more": "true", "next": "c"}));
        assert!(stringly.data.is_empty());
        assert_eq!(stringly.continuation(), None);
    }

    #[test]
    fn test_items_from_payload() {
        let fanned = items_from_payload(json!([{"id": 1}, {"id": 2}]));
        assert_eq!(fanned.len(), 2);

        let single = items_from_payload(json!({}));
        assert_eq!(single.len(), 1);
        assert!(single[0].json.is_empty());

        let empty_list = items_from_payload(json!([]));
        assert!(empty_list.is_empty());

        let scalar = items_from_payload(json!("ok"));
        assert_eq!(scalar[0].json["value"], json!("ok"));
    }

    #[test]
    fn test_error_marker_shape() {
        let marker = NodeExecutionData::error_marker("boom").with_paired_item(1);
        assert!(marker.is_error_marker());
        let wire = serde_json::to_value(&marker).unwrap();
        assert_eq!(wire, json!({"json": {"error": "boom"}, "pairedItem": {"item": 1}}));
    }
}
