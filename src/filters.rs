//! Filter/query compiler for list operations.
//!
//! Maps the `filters` collection of a getAll operation onto Gigstack query
//! parameters. Every recognized key maps to exactly one query key, and a
//! falsy value (empty string, `0`, `false`, `null`) is treated as absent so
//! placeholder defaults never reach the API.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{GigstackError, Result};
use crate::types::{DataObject, is_truthy};

/// User-supplied filter collection of a getAll operation.
pub type FilterSpec = DataObject;

/// Filter keys copied to the query unchanged: (filter key, query key).
const IDENTITY_FILTERS: &[(&str, &str)] = &[
    ("limit", "limit"),
    ("orderBy", "order_by"),
    ("sort", "sort"),
    ("team", "team"),
    ("status", "status"),
    ("client_id", "client_id"),
    ("email", "email"),
    ("currency", "currency"),
];

/// Date filters converted to Unix seconds: (filter key, query key).
const DATE_FILTERS: &[(&str, &str)] = &[
    ("createdAfter", "created[gte]"),
    ("createdBefore", "created[lte]"),
];

/// Compile a filter collection into query parameters.
pub fn compile_filters(filters: &FilterSpec) -> Result<DataObject> {
    let mut query = DataObject::new();

    for (filter_key, query_key) in IDENTITY_FILTERS {
        if let Some(value) = present(filters, filter_key) {
            query.insert(query_key.to_string(), value.clone());
        }
    }

    for (filter_key, query_key) in DATE_FILTERS {
        if let Some(value) = present(filters, filter_key) {
            let seconds = unix_seconds(filter_key, value)?;
            query.insert(query_key.to_string(), Value::from(seconds));
        }
    }

    if let Some(metadata) = present(filters, "metadataFilters") {
        for (key, value) in metadata_pairs(metadata) {
            query.insert(format!("metadata.{}", key), value);
        }
    }

    Ok(query)
}

fn present<'a>(filters: &'a DataObject, key: &str) -> Option<&'a Value> {
    filters.get(key).filter(|v| is_truthy(v))
}

/// `{key, value}` entries with both parts non-empty.
///
/// Accepts the fixed-collection shape (`{"filters": [...]}`) as well as a
/// bare array of entries.
fn metadata_pairs(metadata: &Value) -> Vec<(String, Value)> {
    let entries = match metadata {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(map) => match map.get("filters") {
            Some(Value::Array(entries)) => entries.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    entries
        .iter()
        .filter_map(|entry| {
            let key = entry.get("key").filter(|k| is_truthy(k))?;
            let value = entry.get("value").filter(|v| is_truthy(v))?;
            let key = match key {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key, value.clone()))
        })
        .collect()
}

/// Parse a date parameter and return whole Unix seconds (floored).
///
/// Numbers are taken as epoch milliseconds. Strings may be RFC 3339, a
/// naive date-time (read as UTC) or a bare `YYYY-MM-DD` (UTC midnight).
pub fn unix_seconds(name: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|millis| (millis / 1000.0).floor() as i64)
            .ok_or_else(|| GigstackError::invalid(name, "not a finite number")),
        Value::String(s) => parse_datetime(s)
            .map(|dt| dt.timestamp())
            .ok_or_else(|| GigstackError::invalid(name, format!("'{}' is not a valid date", s))),
        _ => Err(GigstackError::invalid(name, "expected a date string")),
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
