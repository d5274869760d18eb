//! HTTP request handlers for the node host
//!
//! - POST /webhook/gigstack (trigger delivery)
//! - POST /execute (action node over a batch of items)
//! - GET /credentials/test
//! - GET /healthz

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::test_credentials;
use crate::config::{AppState, WEBHOOK_PATH};
use crate::error::GigstackError;
use crate::node::GigstackNode;
use crate::operations::LayeredParameters;
use crate::trigger::{DeliveryOutcome, filter_delivery};
use crate::types::{DataObject, NodeExecutionData};

/// Build the router with every endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Trigger delivery
        .route(WEBHOOK_PATH, post(webhook_handler))
        // Action node
        .route("/execute", post(execute_handler))
        .route("/credentials/test", get(credentials_test_handler))
        // Health check
        .route("/healthz", get(health_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ═══════════════════════════════════════════════════════════════════════════
// Trigger Delivery
// ═══════════════════════════════════════════════════════════════════════════

/// POST /webhook/gigstack
///
/// Acknowledged with an empty 200 whether or not the event is subscribed.
pub async fn webhook_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    match filter_delivery(&state.config.trigger_events, body) {
        DeliveryOutcome::Ignored => {}
        DeliveryOutcome::Emit(records) => {
            info!(records = records.len(), "Gigstack delivery accepted");
            for record in records {
                // No subscriber just means nobody is listening yet.
                let _ = state.deliveries.send(record);
            }
        }
    }
    StatusCode::OK
}

// ═══════════════════════════════════════════════════════════════════════════
// Action Node
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub resource: String,
    pub operation: String,
    /// Per-item parameter values; each entry is one input item.
    #[serde(default)]
    pub items: Vec<DataObject>,
    /// Node-level parameters shared by every item.
    #[serde(default)]
    pub parameters: DataObject,
    #[serde(default)]
    pub continue_on_fail: bool,
}

/// POST /execute
pub async fn execute_handler(
    State(state): State<AppState>,
    Json(body): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let mut defaults = body.parameters;
    defaults.insert("resource".to_string(), json!(body.resource));
    defaults.insert("operation".to_string(), json!(body.operation));

    let items = if body.items.is_empty() {
        vec![DataObject::new()]
    } else {
        body.items
    };
    let input: Vec<NodeExecutionData> = items.iter().cloned().map(NodeExecutionData::new).collect();
    let params = LayeredParameters::new(defaults, items);

    let execution_id = Uuid::new_v4().to_string();
    info!(
        execution_id = %execution_id,
        resource = %body.resource,
        operation = %body.operation,
        items = input.len(),
        "Executing node"
    );

    let node = GigstackNode::new(state.transport.clone());
    match node.execute(&input, &params, body.continue_on_fail).await {
        Ok(records) => (
            StatusCode::OK,
            Json(json!({ "executionId": execution_id, "data": records })),
        ),
        Err(e) => {
            warn!(execution_id = %execution_id, "Execution failed: {}", e);
            error_response(&e)
        }
    }
}

/// GET /credentials/test
pub async fn credentials_test_handler(State(state): State<AppState>) -> impl IntoResponse {
    match test_credentials(&state.transport).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "OK" }))),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &GigstackError) -> (StatusCode, Json<Value>) {
    let status = match e {
        GigstackError::UnknownOperation { .. }
        | GigstackError::MissingParameter(_)
        | GigstackError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        GigstackError::Credential(_) => StatusCode::UNAUTHORIZED,
        GigstackError::Api { status, .. } if *status == 401 || *status == 403 => {
            StatusCode::UNAUTHORIZED
        }
        _ => StatusCode::BAD_GATEWAY,
    };

    let mut body = json!({ "error": e.to_string() });
    if let Some(upstream) = e.status() {
        body["status"] = json!(upstream);
    }
    (status, Json(body))
}

// ═══════════════════════════════════════════════════════════════════════════
// Health Check
// ═══════════════════════════════════════════════════════════════════════════

/// GET /healthz
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
