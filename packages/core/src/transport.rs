//! Transport abstraction for RPC calls.
//!
//! [`RpcTransport`] is the seam between the session logic and the network.
//! [`HttpTransport`] is the production implementation over `reqwest`; tests
//! substitute a scripted transport.

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, HttpResultExt, Result};
use crate::rpc::{RpcReply, RpcRequest};
use crate::session::SessionCookie;

/// Sends one RPC envelope and returns the raw reply.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Performs the call, attaching `session` as a cookie when given.
    ///
    /// Implementations return `Err` only for transport failures; HTTP and RPC
    /// level errors are left in the reply for the caller to classify.
    async fn call(&self, request: &RpcRequest, session: Option<&SessionCookie>)
    -> Result<RpcReply>;
}

/// JSON-over-HTTP transport to an OMV `rpc.php` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Creates a transport posting to `url`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("omv-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .http_context("client setup")?;
        Ok(Self::with_client(client, url))
    }

    /// Creates a transport reusing an existing client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(
        &self,
        request: &RpcRequest,
        session: Option<&SessionCookie>,
    ) -> Result<RpcReply> {
        let operation = request.operation();
        trace!(url = %self.url, %operation, "sending RPC request");

        let mut builder = self
            .client
            .post(&self.url)
            .header("X-Requested-With", "XMLHttpRequest")
            .json(request);
        if let Some(cookie) = session {
            builder = builder.header(COOKIE, cookie.header_value());
        }

        let response = builder.send().await.http_context(&operation)?;
        let status = response.status();
        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        let text = response.text().await.http_context(&operation)?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                Err(_) if !status.is_success() => Value::Null,
                Err(e) => {
                    return Err(Error::MalformedResponse {
                        operation,
                        message: format!("body is not JSON: {e}"),
                    });
                }
            }
        };

        Ok(RpcReply {
            status: status.as_u16(),
            body,
            cookies,
        })
    }
}

/// Extracts `(name, value)` from a `Set-Cookie` header value.
fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');
    Some((name.to_string(), value.to_string()))
}
