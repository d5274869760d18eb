//! Gigstack trigger: webhook subscription lifecycle and inbound delivery.
//!
//! The subscription id lives in [`WebhookStaticData`], which the host loads
//! before activation and saves afterwards. Every lifecycle call takes it
//! explicitly, so the manager itself holds no mutable state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::clients::ApiTransport;
use crate::error::{GigstackError, Result};
use crate::types::{
    DataObject, NodeExecutionData, RequestDescriptor, WebhookSubscription, is_truthy,
    items_from_payload,
};

/// Events a trigger can subscribe to.
pub const TRIGGER_EVENTS: &[&str] = &[
    "client.created",
    "client.deleted",
    "client.updated",
    "invoice.cancelled",
    "invoice.created",
    "invoice.sent",
    "invoice.stamped",
    "payment.cancelled",
    "payment.created",
    "payment.failed",
    "payment.refunded",
    "payment.succeeded",
    "receipt.cancelled",
    "receipt.created",
    "receipt.stamped",
];

// ═══════════════════════════════════════════════════════════════════════════
// Persisted State
// ═══════════════════════════════════════════════════════════════════════════

/// Node-scoped static data kept across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStaticData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
}

/// Where a trigger instance stands with Gigstack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Unregistered,
    Registered { webhook_id: String },
}

impl WebhookStaticData {
    pub fn state(&self) -> SubscriptionState {
        match &self.webhook_id {
            Some(id) => SubscriptionState::Registered {
                webhook_id: id.clone(),
            },
            None => SubscriptionState::Unregistered,
        }
    }

    /// Load from a JSON file. A missing file is an empty state.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Self::default()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                GigstackError::SubscriptionState(format!(
                    "invalid static data in {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(GigstackError::SubscriptionState(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| GigstackError::SubscriptionState(e.to_string()))?;
        tokio::fs::write(path, bytes).await.map_err(|e| {
            GigstackError::SubscriptionState(format!("cannot write {}: {}", path.display(), e))
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Webhook Manager
// ═══════════════════════════════════════════════════════════════════════════

/// Trigger node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSettings {
    /// Public URL Gigstack delivers events to.
    pub callback_url: String,
    pub events: Vec<String>,
    pub team: Option<String>,
}

impl TriggerSettings {
    pub fn new(callback_url: impl Into<String>, events: Vec<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            events,
            team: None,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        let team = team.into();
        self.team = (!team.is_empty()).then_some(team);
        self
    }

    fn description(&self) -> String {
        format!("n8n webhook - {}", self.events.join(", "))
    }
}

/// What an inbound delivery produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The event is not subscribed; acknowledge without output.
    Ignored,
    Emit(Vec<NodeExecutionData>),
}

pub struct WebhookManager<T> {
    transport: T,
    settings: TriggerSettings,
}

impl<T: ApiTransport> WebhookManager<T> {
    pub fn new(transport: T, settings: TriggerSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &TriggerSettings {
        &self.settings
    }

    fn scoped(&self, request: RequestDescriptor) -> RequestDescriptor {
        match &self.settings.team {
            Some(team) => request.with_query_param("team", team.as_str()),
            None => request,
        }
    }

    /// Look for an existing subscription on our callback URL and adopt its id.
    pub async fn check_exists(&self, data: &mut WebhookStaticData) -> Result<bool> {
        let response = self
            .transport
            .request(self.scoped(RequestDescriptor::get("/webhooks")))
            .await?;

        let subscriptions = match response.get("data") {
            Some(Value::Array(entries)) => entries.as_slice(),
            _ => &[],
        };

        let matching = subscriptions.iter().find(|entry| {
            entry.get("url").and_then(Value::as_str) == Some(self.settings.callback_url.as_str())
        });

        match matching.and_then(subscription_id) {
            Some(id) => {
                info!(webhook_id = %id, url = %self.settings.callback_url, "Found existing Gigstack webhook");
                data.webhook_id = Some(id);
                Ok(true)
            }
            None => {
                debug!(url = %self.settings.callback_url, "No Gigstack webhook registered for callback URL");
                Ok(false)
            }
        }
    }

    /// Register a new subscription. Returns `false` when the API answered
    /// without an id; the state is left untouched in that case.
    pub async fn create(&self, data: &mut WebhookStaticData) -> Result<bool> {
        let mut body = DataObject::new();
        body.insert("url".to_string(), json!(self.settings.callback_url));
        body.insert("events".to_string(), json!(self.settings.events));
        body.insert("status".to_string(), json!("active"));
        body.insert("description".to_string(), json!(self.settings.description()));

        let response = self
            .transport
            .request(self.scoped(RequestDescriptor::post("/webhooks").with_body(body)))
            .await?;

        match response.get("data").and_then(subscription_id) {
            Some(id) => {
                info!(webhook_id = %id, events = ?self.settings.events, "Registered Gigstack webhook");
                data.webhook_id = Some(id);
                Ok(true)
            }
            None => {
                warn!("Gigstack webhook create returned no id");
                Ok(false)
            }
        }
    }

    /// Remove our subscription. Never fails: a delete error is logged,
    /// reported as `false` and the id is kept for the next attempt.
    pub async fn delete(&self, data: &mut WebhookStaticData) -> bool {
        let Some(id) = data.webhook_id.clone() else {
            return true;
        };

        let request = self.scoped(RequestDescriptor::delete(format!("/webhooks/{}", id)));
        match self.transport.request(request).await {
            Ok(_) => {
                info!(webhook_id = %id, "Deleted Gigstack webhook");
                data.webhook_id = None;
                true
            }
            Err(e) => {
                warn!(webhook_id = %id, "Failed to delete Gigstack webhook: {}", e);
                false
            }
        }
    }

    /// Activation: adopt an existing subscription or create one.
    pub async fn activate(&self, data: &mut WebhookStaticData) -> Result<bool> {
        if self.check_exists(data).await? {
            return Ok(true);
        }
        self.create(data).await
    }
}

/// Event filter for an inbound delivery.
///
/// A truthy `event` outside the subscribed set is ignored; anything else,
/// including a payload with no `event`, is emitted as-is.
pub fn filter_delivery(events: &[String], payload: Value) -> DeliveryOutcome {
    let event = payload.get("event").filter(|e| is_truthy(e));

    if let Some(event) = event {
        let subscribed = event
            .as_str()
            .is_some_and(|name| events.iter().any(|e| e == name));
        if !subscribed {
            debug!(event = %event, "Ignoring unsubscribed Gigstack event");
            return DeliveryOutcome::Ignored;
        }
    }

    DeliveryOutcome::Emit(items_from_payload(payload))
}

fn subscription_id(entry: &Value) -> Option<String> {
    if let Ok(subscription) = serde_json::from_value::<WebhookSubscription>(entry.clone()) {
        return Some(subscription.id).filter(|id| !id.is_empty());
    }
    match entry.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
