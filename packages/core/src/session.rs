//! Session handling against the OMV RPC API.
//!
//! The API authenticates with a session cookie returned by `Session.login`.
//! Its name depends on the OMV release (`OPENMEDIAVAULT-SESSIONID` on current
//! releases, `PHPSESSID` on older ones), so the name is recorded alongside the
//! token and replayed on every later call.
//!
//! ## State Machine
//!
//! `Unauthenticated` → `Authenticating` → `Authenticated`, and back to
//! `Unauthenticated` when a login fails or the session is invalidated after
//! the server rejects it. The state sits behind an async mutex that is held
//! for the whole login, so at most one login is in flight per manager.

use std::fmt;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::rpc::{FALLBACK_SESSION_COOKIE, PRIMARY_SESSION_COOKIE, RpcRequest};
use crate::transport::RpcTransport;

/// Login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The cookie carrying an established session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub token: String,
}

impl SessionCookie {
    /// Value for a `Cookie` request header.
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.token)
    }
}

/// Observable session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    /// A login is in flight.
    Authenticating,
    Authenticated,
}

/// Token and cookie name; authenticated iff both are present.
#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    cookie_name: Option<String>,
}

impl SessionState {
    fn cookie(&self) -> Option<SessionCookie> {
        match (&self.token, &self.cookie_name) {
            (Some(token), Some(name)) => Some(SessionCookie {
                name: name.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }

    fn establish(&mut self, cookie: &SessionCookie) {
        self.token = Some(cookie.token.clone());
        self.cookie_name = Some(cookie.name.clone());
    }

    fn clear(&mut self) {
        self.token = None;
        self.cookie_name = None;
    }
}

/// Owns the authentication state for one OMV host.
pub struct SessionManager<T> {
    transport: T,
    credentials: Credentials,
    host: String,
    state: Mutex<SessionState>,
}

impl<T: RpcTransport> SessionManager<T> {
    /// Creates an unauthenticated manager. `host` is used for logging only.
    pub fn new(transport: T, credentials: Credentials, host: impl Into<String>) -> Self {
        Self {
            transport,
            credentials,
            host: host.into(),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current status. Reports `Authenticating` while a login holds the state.
    pub fn status(&self) -> SessionStatus {
        match self.state.try_lock() {
            Ok(state) if state.cookie().is_some() => SessionStatus::Authenticated,
            Ok(_) => SessionStatus::Unauthenticated,
            Err(_) => SessionStatus::Authenticating,
        }
    }

    /// Returns the session cookie, logging in first if there is none.
    ///
    /// No network call is made while a session is established.
    pub async fn ensure_authenticated(&self) -> Result<SessionCookie> {
        let mut state = self.state.lock().await;
        if let Some(cookie) = state.cookie() {
            return Ok(cookie);
        }

        match self.login().await {
            Ok(cookie) => {
                state.establish(&cookie);
                Ok(cookie)
            }
            Err(e) => {
                state.clear();
                Err(e)
            }
        }
    }

    /// Drops the current session so the next call logs in again.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.cookie().is_some() {
            warn!(host = %self.host, "dropping OpenMediaVault session");
        }
        state.clear();
    }

    /// Performs an authenticated call and returns the checked reply body.
    ///
    /// A session rejected by the server surfaces as [`Error::SessionExpired`];
    /// the caller decides whether to re-authenticate.
    pub async fn call(&self, request: &RpcRequest) -> Result<Value> {
        let operation = request.operation();
        let Some(cookie) = self.state.lock().await.cookie() else {
            return Err(Error::SessionExpired { operation });
        };

        let reply = self.transport.call(request, Some(&cookie)).await?;
        reply.check(&operation)?;
        Ok(reply.body)
    }

    async fn login(&self) -> Result<SessionCookie> {
        let request = RpcRequest::login(&self.credentials.username, &self.credentials.password);
        let reply = self.transport.call(&request, None).await?;

        if reply.status == 401 || reply.status == 403 {
            return Err(Error::AuthenticationFailed {
                message: format!("login rejected with HTTP status {}", reply.status),
            });
        }

        let authenticated = reply
            .response()
            .and_then(|r| r.get("authenticated"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !authenticated {
            let message = reply
                .body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("response did not confirm authentication");
            return Err(Error::AuthenticationFailed {
                message: message.to_string(),
            });
        }

        let cookie = [PRIMARY_SESSION_COOKIE, FALLBACK_SESSION_COOKIE]
            .into_iter()
            .find_map(|name| {
                reply.cookie(name).map(|token| SessionCookie {
                    name: name.to_string(),
                    token: token.to_string(),
                })
            });

        let Some(cookie) = cookie else {
            let received: Vec<&str> = reply.cookies.iter().map(|(n, _)| n.as_str()).collect();
            error!(?received, "no session cookie in login response");
            return Err(Error::AuthenticationFailed {
                message: "no session cookie returned".to_string(),
            });
        };

        info!(host = %self.host, cookie = %cookie.name, "logged in to OpenMediaVault");
        Ok(cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcReply;
    use crate::test_support::{ScriptedTransport, login_ok};
    use serde_json::json;
    use std::time::Duration;

    fn manager(transport: ScriptedTransport) -> SessionManager<ScriptedTransport> {
        let credentials = Credentials::new("admin", "openmediavault");
        SessionManager::new(transport, credentials, "nas")
    }

    #[tokio::test]
    async fn test_ensure_authenticated_logs_in_once() {
        let session = manager(ScriptedTransport::new(|_, _| Ok(login_ok("tok-1"))));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);

        let cookie = session.ensure_authenticated().await.unwrap();
        assert_eq!(cookie.name, PRIMARY_SESSION_COOKIE);
        assert_eq!(cookie.token, "tok-1");
        assert_eq!(session.status(), SessionStatus::Authenticated);

        session.ensure_authenticated().await.unwrap();
        assert_eq!(session.transport().count("Session.login"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_login() {
        let transport = ScriptedTransport::new(|_, _| Ok(login_ok("shared")))
            .with_delay(Duration::from_secs(1));
        let session = manager(transport);

        let (a, b, c) = tokio::join!(
            session.ensure_authenticated(),
            session.ensure_authenticated(),
            session.ensure_authenticated()
        );

        for cookie in [a, b, c] {
            assert_eq!(cookie.unwrap().token, "shared");
        }
        assert_eq!(session.transport().count("Session.login"), 1);
        assert_eq!(session.status(), SessionStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_invalidate_forces_single_relogin() {
        let session = manager(ScriptedTransport::new(|_, _| Ok(login_ok("tok"))));
        session.ensure_authenticated().await.unwrap();

        session.invalidate().await;
        assert_eq!(session.status(), SessionStatus::Unauthenticated);

        session.ensure_authenticated().await.unwrap();
        session.ensure_authenticated().await.unwrap();
        assert_eq!(session.transport().count("Session.login"), 2);
    }

    #[tokio::test]
    async fn test_login_falls_back_to_phpsessid() {
        let session = manager(ScriptedTransport::new(|_, _| {
            Ok(RpcReply::ok(json!({"response": {"authenticated": true}}))
                .with_cookie("other", "x")
                .with_cookie(FALLBACK_SESSION_COOKIE, "legacy"))
        }));

        let cookie = session.ensure_authenticated().await.unwrap();
        assert_eq!(cookie.header_value(), "PHPSESSID=legacy");
    }

    #[tokio::test]
    async fn test_login_without_cookie_fails() {
        let session = manager(ScriptedTransport::new(|_, _| {
            Ok(RpcReply::ok(json!({"response": {"authenticated": true}})))
        }));

        let err = session.ensure_authenticated().await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed { .. }));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_not_authenticated_fails() {
        let session = manager(ScriptedTransport::new(|_, _| {
            Ok(RpcReply::ok(json!({
                "response": null,
                "error": {"code": 5001, "message": "Incorrect username or password."}
            }))
            .with_cookie(PRIMARY_SESSION_COOKIE, "tok"))
        }));

        match session.ensure_authenticated().await {
            Err(Error::AuthenticationFailed { message }) => {
                assert_eq!(message, "Incorrect username or password.");
            }
            result => panic!("unexpected result: {result:?}"),
        }
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_call_attaches_session_cookie() {
        let session = manager(ScriptedTransport::new(|request, cookie| {
            if request.service == "Session" {
                return Ok(login_ok("tok-9"));
            }
            let cookie = cookie.expect("data calls carry the session cookie");
            assert_eq!(cookie.header_value(), "OPENMEDIAVAULT-SESSIONID=tok-9");
            Ok(RpcReply::ok(json!({"response": {"data": []}})))
        }));

        session.ensure_authenticated().await.unwrap();
        let body = session.call(&RpcRequest::disk_list()).await.unwrap();
        assert_eq!(body["response"]["data"], json!([]));
    }

    #[tokio::test]
    async fn test_call_without_session_is_expired() {
        let session = manager(ScriptedTransport::new(|_, _| Ok(login_ok("tok"))));
        let err = session.call(&RpcRequest::disk_list()).await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired { .. }));
        assert_eq!(session.transport().total_calls(), 0);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
