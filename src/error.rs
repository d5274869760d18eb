//! Error types for the Gigstack node pack.

use serde_json::Value;
use thiserror::Error;

/// Errors raised by the gateway, paginator, webhook manager and node loop.
#[derive(Error, Debug, Clone)]
pub enum GigstackError {
    /// The API answered with a non-2xx status.
    #[error("Gigstack API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Response body, parsed as JSON when possible.
        body: Value,
    },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("Gigstack request failed: {0}")]
    Network(String),

    /// A 2xx response whose body could not be parsed.
    #[error("Malformed Gigstack response: {0}")]
    MalformedResponse(String),

    /// Webhook subscription create/delete returned an unexpected shape.
    #[error("Webhook subscription error: {0}")]
    SubscriptionState(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Unknown operation '{operation}' for resource '{resource}'")]
    UnknownOperation { resource: String, operation: String },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

impl GigstackError {
    /// HTTP status of an API error, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            GigstackError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        GigstackError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for node pack operations.
pub type Result<T> = std::result::Result<T, GigstackError>;
