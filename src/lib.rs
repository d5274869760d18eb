//! Gigstack n8n node pack - Library
//!
//! Core of the Gigstack action and trigger nodes: the authenticated request
//! gateway, cursor paginator, filter compiler, response normalizer, webhook
//! subscription manager and the per-item execution loop.

pub mod clients;
pub mod config;
pub mod credentials;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod node;
pub mod operations;
pub mod pagination;
pub mod response;
pub mod trigger;
pub mod types;

pub use clients::{ApiTransport, GigstackClient, test_credentials};
pub use credentials::{CredentialProvider, Environment, GigstackCredentials};
pub use error::{GigstackError, Result};
pub use filters::compile_filters;
pub use node::GigstackNode;
pub use pagination::request_all_items;
pub use response::simplify;
pub use trigger::{WebhookManager, WebhookStaticData};
