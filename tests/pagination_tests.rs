//! Tests for the cursor paginator
//!
//! - Concatenation of every page in order
//! - Cursor/has_more conjunction
//! - Limit cap and early stop
//! - Error aborts the fetch

mod common;

use common::{ScriptedTransport, api_error};
use gigstack_n8n::request_all_items;
use gigstack_n8n::types::{DataObject, HttpMethod};
use serde_json::{Value, json};

fn ids(items: &[Value]) -> Vec<&str> {
    items.iter().map(|i| i["id"].as_str().unwrap()).collect()
}

async fn fetch(transport: &ScriptedTransport, query: DataObject, limit: Option<usize>) -> Vec<Value> {
    request_all_items(transport, HttpMethod::Get, "/clients", DataObject::new(), query, limit)
        .await
        .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// Page walking
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_collects_all_pages_in_order() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"data": [{"id": "a"}, {"id": "b"}], "has_more": true, "next": "c1"})),
        Ok(json!({"data": [{"id": "c"}], "has_more": true, "next": "c2"})),
        Ok(json!({"data": [{"id": "d"}, {"id": "e"}], "has_more": false})),
    ]);

    let items = fetch(&transport, DataObject::new(), None).await;
    assert_eq!(ids(&items), vec!["a", "b", "c", "d", "e"]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].query.get("next"), None);
    assert_eq!(requests[1].query["next"], json!("c1"));
    assert_eq!(requests[2].query["next"], json!("c2"));
}

#[tokio::test]
async fn test_default_page_size_is_100() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({"data": [], "has_more": false}))]);
    fetch(&transport, DataObject::new(), None).await;
    assert_eq!(transport.requests()[0].query["limit"], json!(100));
}

#[tokio::test]
async fn test_caller_page_size_is_kept() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({"data": [], "has_more": false}))]);
    let mut query = DataObject::new();
    query.insert("limit".into(), json!(25));
    query.insert("status".into(), json!("succeeded"));

    fetch(&transport, query, None).await;

    let request = &transport.requests()[0];
    assert_eq!(request.query["limit"], json!(25));
    assert_eq!(request.query["status"], json!("succeeded"));
}

#[tokio::test]
async fn test_has_more_without_cursor_stops() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"data": [{"id": "a"}], "has_more": true})),
        Ok(json!({"data": [{"id": "never"}], "has_more": false})),
    ]);

    let items = fetch(&transport, DataObject::new(), None).await;
    assert_eq!(ids(&items), vec!["a"]);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_cursor_without_has_more_stops() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"data": [{"id": "a"}], "has_more": false, "next": "stale"})),
        Ok(json!({"data": [{"id": "never"}], "has_more": false})),
    ]);

    let items = fetch(&transport, DataObject::new(), None).await;
    assert_eq!(ids(&items), vec!["a"]);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_missing_data_is_an_empty_page() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"has_more": true, "next": "c1"})),
        Ok(json!({"data": [{"id": "a"}], "has_more": false})),
    ]);

    let items = fetch(&transport, DataObject::new(), None).await;
    assert_eq!(ids(&items), vec!["a"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Limit cap
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_limit_truncates_and_stops() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"data": [{"id": "a"}, {"id": "b"}], "has_more": true, "next": "c1"})),
        Ok(json!({"data": [{"id": "c"}, {"id": "d"}], "has_more": true, "next": "c2"})),
        Ok(json!({"data": [{"id": "e"}], "has_more": false})),
    ]);

    let items = fetch(&transport, DataObject::new(), Some(3)).await;
    assert_eq!(ids(&items), vec!["a", "b", "c"]);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_limit_above_total_returns_everything() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"data": [{"id": "a"}], "has_more": true, "next": "c1"})),
        Ok(json!({"data": [{"id": "b"}], "has_more": false})),
    ]);

    let items = fetch(&transport, DataObject::new(), Some(10)).await;
    assert_eq!(ids(&items), vec!["a", "b"]);
}

#[tokio::test]
async fn test_zero_limit_means_no_cap() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"data": [{"id": "a"}], "has_more": true, "next": "c1"})),
        Ok(json!({"data": [{"id": "b"}], "has_more": false})),
    ]);

    let items = fetch(&transport, DataObject::new(), Some(0)).await;
    assert_eq!(items.len(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_error_on_later_page_discards_everything() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"data": [{"id": "a"}], "has_more": true, "next": "c1"})),
        Err(api_error(500, "boom")),
    ]);

    let result = request_all_items(
        &transport,
        HttpMethod::Get,
        "/clients",
        DataObject::new(),
        DataObject::new(),
        None,
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(transport.request_count(), 2);
}
