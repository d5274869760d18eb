//! Configuration module - Environment-based configuration
//!
//! Every setting has a default except the API token; a missing token only
//! fails once a request is made.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::warn;

use crate::clients::{ApiTransport, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, GigstackClient};
use crate::credentials::{Environment, GigstackCredentials};
use crate::error::{GigstackError, Result};
use crate::trigger::{TRIGGER_EVENTS, TriggerSettings};
use crate::types::NodeExecutionData;

/// Path the trigger endpoint is served on, relative to `WEBHOOK_URL`.
pub const WEBHOOK_PATH: &str = "/webhook/gigstack";

/// Application configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    // Server config
    pub host: String,
    pub port: u16,
    /// Public base URL of this host, used to build the trigger callback.
    pub webhook_url: Option<String>,

    // Gigstack API
    pub api_token: String,
    pub environment: Environment,
    pub base_url: String,
    pub request_timeout_secs: u64,

    // Trigger
    pub trigger_events: Vec<String>,
    pub team: Option<String>,
    pub static_data_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = var("GIGSTACK_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let environment = match var("GIGSTACK_ENVIRONMENT") {
            Some(raw) => raw.parse().unwrap_or_else(|e: GigstackError| {
                warn!("{}; using production", e);
                Environment::Production
            }),
            None => Environment::Production,
        };

        let trigger_events: Vec<String> = var("GIGSTACK_TRIGGER_EVENTS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        for event in &trigger_events {
            if !TRIGGER_EVENTS.contains(&event.as_str()) {
                warn!(event = %event, "Unknown Gigstack trigger event");
            }
        }

        Self {
            host: var("GIGSTACK_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            webhook_url: var("WEBHOOK_URL"),
            api_token: lookup("GIGSTACK_API_TOKEN").unwrap_or_default(),
            environment,
            base_url: var("GIGSTACK_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: var("GIGSTACK_REQUEST_TIMEOUT_SECS")
                .and_then(|t| t.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            trigger_events,
            team: var("GIGSTACK_TEAM"),
            static_data_path: var("GIGSTACK_STATIC_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("gigstack-static-data.json")),
        }
    }

    /// Get server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public URL Gigstack should deliver events to.
    pub fn callback_url(&self) -> Option<String> {
        self.webhook_url
            .as_ref()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), WEBHOOK_PATH))
    }

    pub fn credentials(&self) -> GigstackCredentials {
        GigstackCredentials::new(self.api_token.clone(), self.environment)
    }

    /// Trigger settings, when both a callback URL and events are configured.
    pub fn trigger_settings(&self) -> Option<TriggerSettings> {
        if self.trigger_events.is_empty() {
            return None;
        }
        let settings = TriggerSettings::new(self.callback_url()?, self.trigger_events.clone());
        Some(match &self.team {
            Some(team) => settings.with_team(team.clone()),
            None => settings,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("webhook_url", &self.webhook_url)
            .field("api_token", &"<redacted>")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("trigger_events", &self.trigger_events)
            .field("team", &self.team)
            .field("static_data_path", &self.static_data_path)
            .finish()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub transport: Arc<dyn ApiTransport>,
    /// Records produced by trigger deliveries.
    pub deliveries: broadcast::Sender<NodeExecutionData>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GigstackError::Network(e.to_string()))?;

        let client = GigstackClient::new(Arc::new(config.credentials()))?
            .with_http_client(http)
            .with_base_url(config.base_url.clone());

        Ok(Self::with_transport(config, Arc::new(client)))
    }

    /// State over a caller-supplied transport.
    pub fn with_transport(config: Config, transport: Arc<dyn ApiTransport>) -> Self {
        let (deliveries, _) = broadcast::channel(256);
        Self {
            config: Arc::new(config),
            transport,
            deliveries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.bind_addr(), "0.0.0.0:8080");
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.environment, Environment::Production);
        assert_eq!(c.request_timeout_secs, 30);
        assert_eq!(c.static_data_path, PathBuf::from("gigstack-static-data.json"));
        assert!(c.trigger_settings().is_none());
    }

    #[test]
    fn test_trigger_settings_from_env() {
        let c = config(&[
            ("WEBHOOK_URL", "https://hooks.example.com/"),
            ("GIGSTACK_TRIGGER_EVENTS", "payment.succeeded, invoice.created,"),
            ("GIGSTACK_TEAM", "team_1"),
            ("GIGSTACK_ENVIRONMENT", "test"),
        ]);

        let settings = c.trigger_settings().unwrap();
        assert_eq!(settings.callback_url, "https://hooks.example.com/webhook/gigstack");
        assert_eq!(settings.events, vec!["payment.succeeded", "invoice.created"]);
        assert_eq!(settings.team.as_deref(), Some("team_1"));
        assert_eq!(c.environment, Environment::Test);
    }

    #[test]
    fn test_events_without_webhook_url_disable_trigger() {
        let c = config(&[("GIGSTACK_TRIGGER_EVENTS", "payment.succeeded")]);
        assert!(c.trigger_settings().is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let c = config(&[("GIGSTACK_API_TOKEN", "sk_secret")]);
        assert!(!format!("{:?}", c).contains("sk_secret"));
    }
}
