//! In-memory transport for session and coordinator tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::Result;
use crate::rpc::{PRIMARY_SESSION_COOKIE, RpcReply, RpcRequest};
use crate::session::SessionCookie;
use crate::transport::RpcTransport;

type Handler = dyn Fn(&RpcRequest, Option<&SessionCookie>) -> Result<RpcReply> + Send + Sync;

/// Answers every call with a handler and records `Service.method` per call.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RpcRequest, Option<&SessionCookie>) -> Result<RpcReply> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Makes every call sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn call(
        &self,
        request: &RpcRequest,
        session: Option<&SessionCookie>,
    ) -> Result<RpcReply> {
        self.calls.lock().unwrap().push(request.operation());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(request, session)
    }
}

/// A successful login reply carrying `token` in the primary session cookie.
pub fn login_ok(token: &str) -> RpcReply {
    RpcReply::ok(json!({
        "response": {"authenticated": true, "username": "admin", "permissions": {"role": "admin"}},
        "error": null
    }))
    .with_cookie(PRIMARY_SESSION_COOKIE, token)
}
