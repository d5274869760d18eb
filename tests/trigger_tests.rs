//! Tests for the webhook subscription lifecycle
//!
//! - checkExists adopts a matching subscription
//! - create registers and persists the id
//! - delete is idempotent and keeps the id on failure
//! - static data survives a save/load cycle

mod common;

use common::{ScriptedTransport, api_error};
use gigstack_n8n::trigger::{SubscriptionState, TriggerSettings, WebhookManager, WebhookStaticData};
use gigstack_n8n::types::HttpMethod;
use serde_json::json;

const CALLBACK: &str = "https://hooks.example.com/webhook/gigstack";

fn settings() -> TriggerSettings {
    TriggerSettings::new(CALLBACK, vec!["payment.succeeded".to_string()])
}

// ═══════════════════════════════════════════════════════════════════════════
// checkExists
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_check_exists_adopts_matching_subscription() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({
        "data": [
            {"id": "wh_other", "url": "https://elsewhere.example.com/hook", "events": []},
            {"id": "wh_ours", "url": CALLBACK, "events": ["payment.succeeded"], "status": "active"}
        ],
        "has_more": false
    }))]);
    let manager = WebhookManager::new(&transport, settings());
    let mut data = WebhookStaticData::default();

    assert!(manager.check_exists(&mut data).await.unwrap());
    assert_eq!(
        data.state(),
        SubscriptionState::Registered {
            webhook_id: "wh_ours".into()
        }
    );

    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.path, "/webhooks");
}

#[tokio::test]
async fn test_check_exists_without_match_leaves_state() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({
        "data": [{"id": "wh_other", "url": "https://elsewhere.example.com/hook"}]
    }))]);
    let manager = WebhookManager::new(&transport, settings());
    let mut data = WebhookStaticData::default();

    assert!(!manager.check_exists(&mut data).await.unwrap());
    assert_eq!(data, WebhookStaticData::default());
}

#[tokio::test]
async fn test_check_exists_scopes_by_team() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({"data": []}))]);
    let manager = WebhookManager::new(&transport, settings().with_team("team_1"));

    manager
        .check_exists(&mut WebhookStaticData::default())
        .await
        .unwrap();

    assert_eq!(transport.requests()[0].query["team"], json!("team_1"));
}

#[tokio::test]
async fn test_check_exists_propagates_errors() {
    let transport = ScriptedTransport::queue(vec![Err(api_error(401, "Invalid token"))]);
    let manager = WebhookManager::new(&transport, settings());

    let err = manager
        .check_exists(&mut WebhookStaticData::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

// ═══════════════════════════════════════════════════════════════════════════
// create
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_registers_subscription() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({
        "data": {"id": "wh_new", "url": CALLBACK, "events": ["payment.succeeded"]}
    }))]);
    let manager = WebhookManager::new(&transport, settings());
    let mut data = WebhookStaticData::default();

    assert!(manager.create(&mut data).await.unwrap());
    assert_eq!(data.webhook_id.as_deref(), Some("wh_new"));

    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.path, "/webhooks");
    assert_eq!(
        serde_json::Value::Object(request.body.clone()),
        json!({
            "url": CALLBACK,
            "events": ["payment.succeeded"],
            "status": "active",
            "description": "n8n webhook - payment.succeeded"
        })
    );
}

#[tokio::test]
async fn test_create_without_id_reports_failure() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({"data": {"url": CALLBACK}}))]);
    let manager = WebhookManager::new(&transport, settings());
    let mut data = WebhookStaticData::default();

    assert!(!manager.create(&mut data).await.unwrap());
    assert_eq!(data.state(), SubscriptionState::Unregistered);
}

#[tokio::test]
async fn test_activate_skips_create_when_registered() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({
        "data": [{"id": "wh_ours", "url": CALLBACK}]
    }))]);
    let manager = WebhookManager::new(&transport, settings());
    let mut data = WebhookStaticData::default();

    assert!(manager.activate(&mut data).await.unwrap());
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_activate_creates_when_absent() {
    let transport = ScriptedTransport::queue(vec![
        Ok(json!({"data": []})),
        Ok(json!({"data": {"id": "wh_new"}})),
    ]);
    let manager = WebhookManager::new(&transport, settings());
    let mut data = WebhookStaticData::default();

    assert!(manager.activate(&mut data).await.unwrap());
    assert_eq!(data.webhook_id.as_deref(), Some("wh_new"));
    assert_eq!(transport.requests()[1].method, HttpMethod::Post);
}

// ═══════════════════════════════════════════════════════════════════════════
// delete
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_delete_without_id_is_a_no_op() {
    let transport = ScriptedTransport::queue(vec![]);
    let manager = WebhookManager::new(&transport, settings());

    assert!(manager.delete(&mut WebhookStaticData::default()).await);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_delete_clears_id_on_success() {
    let transport = ScriptedTransport::queue(vec![Ok(json!({}))]);
    let manager = WebhookManager::new(&transport, settings());
    let mut data = WebhookStaticData {
        webhook_id: Some("wh_1".into()),
    };

    assert!(manager.delete(&mut data).await);
    assert_eq!(data.state(), SubscriptionState::Unregistered);

    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Delete);
    assert_eq!(request.path, "/webhooks/wh_1");
}

#[tokio::test]
async fn test_delete_failure_keeps_id() {
    let transport = ScriptedTransport::queue(vec![Err(api_error(500, "boom"))]);
    let manager = WebhookManager::new(&transport, settings());
    let mut data = WebhookStaticData {
        webhook_id: Some("wh_1".into()),
    };

    assert!(!manager.delete(&mut data).await);
    assert_eq!(data.webhook_id.as_deref(), Some("wh_1"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Persistence
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_static_data_save_and_load() {
    let path = std::env::temp_dir().join(format!("gigstack-static-{}.json", uuid::Uuid::new_v4()));

    let missing = WebhookStaticData::load(&path).await.unwrap();
    assert_eq!(missing, WebhookStaticData::default());

    let data = WebhookStaticData {
        webhook_id: Some("wh_saved".into()),
    };
    data.save(&path).await.unwrap();
    assert_eq!(WebhookStaticData::load(&path).await.unwrap(), data);

    tokio::fs::remove_file(&path).await.unwrap();
}
