//! Gigstack API credentials and the bearer-token provider seam.
//!
//! The gateway never reads the token directly; it asks a
//! [`CredentialProvider`] for it on every request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GigstackError, Result};

/// Gigstack environment selected on the credential.
///
/// Both environments share the same base URL; the token decides which data
/// set a call touches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Test,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Environment {
    type Err = GigstackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "live" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(GigstackError::invalid(
                "environment",
                format!("expected 'production' or 'test', got '{}'", other),
            )),
        }
    }
}

/// Source of the bearer token attached to every outbound call.
pub trait CredentialProvider: Send + Sync {
    /// Token to send as `Authorization: Bearer <token>`.
    fn bearer_token(&self) -> Result<String>;

    fn environment(&self) -> Environment {
        Environment::Production
    }
}

/// The `gigstackApi` credential: an API token plus its environment.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GigstackCredentials {
    pub api_token: String,
    #[serde(default)]
    pub environment: Environment,
}

impl GigstackCredentials {
    pub fn new(api_token: impl Into<String>, environment: Environment) -> Self {
        Self {
            api_token: api_token.into(),
            environment,
        }
    }
}

impl fmt::Debug for GigstackCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GigstackCredentials")
            .field("api_token", &"<redacted>")
            .field("environment", &self.environment)
            .finish()
    }
}

impl CredentialProvider for GigstackCredentials {
    fn bearer_token(&self) -> Result<String> {
        let token = self.api_token.trim();
        if token.is_empty() {
            return Err(GigstackError::Credential(
                "Gigstack API token is not configured".to_string(),
            ));
        }
        Ok(token.to_string())
    }

    fn environment(&self) -> Environment {
        self.environment
    }
}
