//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use gigstack_n8n::types::RequestDescriptor;
use gigstack_n8n::{ApiTransport, GigstackError, Result};
use serde_json::Value;

type Handler = Box<dyn Fn(&RequestDescriptor) -> Result<Value> + Send + Sync>;

/// Answers requests from a handler (or a queue) and records every request.
pub struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer requests in order from a fixed list of responses.
    pub fn queue(responses: Vec<Result<Value>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GigstackError::Network("script exhausted".into())))
        })
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn request(&self, request: RequestDescriptor) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}

pub fn api_error(status: u16, message: &str) -> GigstackError {
    GigstackError::Api {
        status,
        message: message.to_string(),
        body: serde_json::json!({ "message": message }),
    }
}
