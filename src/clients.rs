//! HTTP request gateway for the Gigstack v2 REST API
//!
//! Every call made by the node pack goes through [`ApiTransport::request`].
//! [`GigstackClient`] is the reqwest-backed implementation; tests swap in a
//! scripted transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::credentials::CredentialProvider;
use crate::error::{GigstackError, Result};
use crate::types::{HttpMethod, RequestDescriptor, query_pairs};

/// Production base URL of the Gigstack API.
pub const DEFAULT_BASE_URL: &str = "https://api.gigstack.io/v2";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Issues one authenticated REST call and returns the parsed JSON body.
///
/// Implementations perform no retries: every failure is surfaced to the
/// caller.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn request(&self, request: RequestDescriptor) -> Result<Value>;
}

#[async_trait]
impl<T: ApiTransport + ?Sized> ApiTransport for Arc<T> {
    async fn request(&self, request: RequestDescriptor) -> Result<Value> {
        (**self).request(request).await
    }
}

#[async_trait]
impl<T: ApiTransport + ?Sized> ApiTransport for &T {
    async fn request(&self, request: RequestDescriptor) -> Result<Value> {
        (**self).request(request).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Gigstack Client (api.gigstack.io)
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct GigstackClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl GigstackClient {
    /// Create a client against the production base URL.
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GigstackError::Network(e.to_string()))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
            credentials,
        })
    }

    /// Point the client at another base URL (mock servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send(&self, request: &RequestDescriptor) -> Result<Value> {
        let token = self.credentials.bearer_token()?;
        let url = self.url(&request.path);

        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
            HttpMethod::Put => self.http.put(&url),
            HttpMethod::Delete => self.http.delete(&url),
        }
        .header("Authorization", format!("Bearer {}", token))
        .header("Accept", "application/json");

        // Empty mappings are left off entirely: some endpoints reject `{}`.
        if !request.query.is_empty() {
            builder = builder.query(&query_pairs(&request.query));
        }
        if !request.body.is_empty() {
            builder = builder.json(&request.body);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            environment = %self.credentials.environment(),
            query_keys = request.query.len(),
            has_body = !request.body.is_empty(),
            "Sending Gigstack request"
        );

        let response = builder.send().await.map_err(|e| {
            warn!(method = %request.method, path = %request.path, "Gigstack request failed to send");
            GigstackError::Network(e.without_url().to_string())
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GigstackError::Network(e.without_url().to_string()))?;

        if !status.is_success() {
            let body = parse_error_body(&bytes);
            let message = error_message(status, &body);
            warn!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                "Gigstack returned error: {}",
                message
            );
            return Err(GigstackError::Api {
                status: status.as_u16(),
                message,
                body,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(json!({}));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            GigstackError::MalformedResponse(format!(
                "{} {} returned invalid JSON: {}",
                request.method, request.path, e
            ))
        })
    }
}

#[async_trait]
impl ApiTransport for GigstackClient {
    async fn request(&self, request: RequestDescriptor) -> Result<Value> {
        self.send(&request).await
    }
}

fn parse_error_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Pick a human message out of an error body, falling back to the status line.
fn error_message(status: StatusCode, body: &Value) -> String {
    let from_body = body
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })
        .or_else(|| body.as_str().filter(|s| !s.trim().is_empty()));

    match from_body {
        Some(message) => message.to_string(),
        None => format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status")
        ),
    }
}

/// Verify a credential the way the node's credential test does:
/// `GET /teams?limit=1` must succeed.
pub async fn test_credentials<T: ApiTransport + ?Sized>(transport: &T) -> Result<()> {
    transport
        .request(RequestDescriptor::get("/teams").with_query_param("limit", 1))
        .await
        .map(|_| ())
}
