//! OpenMediaVault RPC envelopes.
//!
//! Every call is a JSON `{service, method, params}` POST to `rpc.php`; every
//! reply is `{response, error}`. Depending on the OMV release, list payloads
//! sit under `response.data` or directly under `response`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Cookie name used by OMV 6 and later.
pub const PRIMARY_SESSION_COOKIE: &str = "OPENMEDIAVAULT-SESSIONID";

/// Cookie name used by older PHP-based releases.
pub const FALLBACK_SESSION_COOKIE: &str = "PHPSESSID";

/// RPC error codes from 5000 up to this bound are session errors
/// (not authenticated, timed out, invalid client).
const SESSION_ERROR_CODES: std::ops::Range<i64> = 5000..5100;

/// One RPC call envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub service: String,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            params,
        }
    }

    /// `Session.login`.
    pub fn login(username: &str, password: &str) -> Self {
        Self::new(
            "Session",
            "login",
            json!({ "username": username, "password": password }),
        )
    }

    /// `DiskMgmt.getList` for every disk.
    pub fn disk_list() -> Self {
        Self::new("DiskMgmt", "getList", list_params())
    }

    /// `FileSystemMgmt.getList` for every filesystem.
    pub fn filesystem_list() -> Self {
        Self::new("FileSystemMgmt", "getList", list_params())
    }

    /// `Service.method`, used in logs and error context.
    pub fn operation(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }
}

/// Unpaged, unsorted listing.
fn list_params() -> Value {
    json!({
        "start": 0,
        "limit": -1,
        "sortfield": "",
        "sortdir": "asc"
    })
}

/// What came back from one RPC call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcReply {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body, `Null` when the body was empty or not JSON on an
    /// error status.
    pub body: Value,
    /// `(name, value)` pairs from `Set-Cookie` headers.
    pub cookies: Vec<(String, String)>,
}

impl RpcReply {
    /// Builds a 200 reply with the given body.
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            cookies: Vec::new(),
        }
    }

    /// Adds a cookie to the reply.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Returns the value of the named cookie, if set.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the `response` member of the envelope.
    pub fn response(&self) -> Option<&Value> {
        self.body.get("response").filter(|r| !r.is_null())
    }

    /// Checks the reply for HTTP or RPC level errors.
    ///
    /// 401/403 and RPC session error codes mean the session is gone; other
    /// failures are reported as malformed responses.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.status == 401 || self.status == 403 {
            return Err(Error::SessionExpired {
                operation: operation.to_string(),
            });
        }

        if let Some(error) = self.body.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64);
            if code.is_some_and(|c| SESSION_ERROR_CODES.contains(&c)) {
                return Err(Error::SessionExpired {
                    operation: operation.to_string(),
                });
            }
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(Error::MalformedResponse {
                operation: operation.to_string(),
                message,
            });
        }

        if !(200..300).contains(&self.status) {
            return Err(Error::MalformedResponse {
                operation: operation.to_string(),
                message: format!("unexpected HTTP status {}", self.status),
            });
        }

        Ok(())
    }
}

/// JSON truthiness: null, false, 0, "" and empty containers are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Pulls the item list out of a list reply.
///
/// Accepts `response.data`, `response.response`, or `response` itself being
/// the list. A body that is not a JSON object is a
/// [`Error::MalformedResponse`]. Within an object envelope, an absent payload
/// is an empty list and anything that is not a list is malformed.
pub fn extract_list(operation: &str, body: &Value) -> Result<Vec<Value>> {
    let malformed = |message: String| Error::MalformedResponse {
        operation: operation.to_string(),
        message,
    };

    let Value::Object(envelope) = body else {
        return Err(malformed(format!("expected an object, got: {body}")));
    };

    let payload = match envelope.get("response") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(response)) => ["data", "response"]
            .iter()
            .filter_map(|key| response.get(*key))
            .find(|v| is_truthy(v)),
        Some(list) if list.is_array() => Some(list),
        Some(other) => return Err(malformed(format!("unexpected response payload: {other}"))),
    };

    match payload {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(malformed(format!("expected a list, got: {other}"))),
    }
}

/// Decodes every item of a list reply into `T`.
pub fn decode_list<T: DeserializeOwned>(operation: &str, body: &Value) -> Result<Vec<T>> {
    extract_list(operation, body)?
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| Error::MalformedResponse {
                operation: operation.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}
