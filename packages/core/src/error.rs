//! Unified error types for the omv-monitor-core library.
//!
//! Uses SNAFU for context-rich error handling, so the same underlying error
//! (a `reqwest::Error`, an `std::io::Error`) carries the operation it came from.

use std::path::PathBuf;
use std::time::Duration;

use snafu::{ResultExt, Snafu};

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Login was rejected or the login response had an unrecognized shape.
    #[snafu(display("authentication against OpenMediaVault failed: {message}"))]
    AuthenticationFailed { message: String },

    /// A previously valid session was rejected by the server.
    #[snafu(display("session expired during {operation}"))]
    SessionExpired { operation: String },

    /// The refresh cycle did not complete within its time budget.
    #[snafu(display("refresh cycle timed out after {}s", timeout.as_secs_f64()))]
    TransportTimeout { timeout: Duration },

    /// The RPC payload did not have the expected shape.
    #[snafu(display("malformed response from {operation}: {message}"))]
    MalformedResponse { operation: String, message: String },

    /// The HTTP request itself failed.
    #[snafu(display("HTTP request for {operation} failed"))]
    Http {
        operation: String,
        source: reqwest::Error,
    },

    /// A refresh cycle failed after its single recovery attempt.
    #[snafu(display("update failed: {source}"))]
    UpdateFailed {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Configuration file cannot be read.
    #[snafu(display("failed to read config at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::config::Config`].
    #[snafu(display("failed to parse config at {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Configuration values are present but unusable.
    #[snafu(display("invalid configuration: {message}"))]
    InvalidConfig { message: String },

    /// Platform config directory not found.
    #[snafu(display("Could not determine config directory"))]
    ConfigDirNotFound,

    #[snafu(whatever, display("{message}"))]
    Generic {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for config read errors.
    fn config_read_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn config_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(ConfigReadSnafu { path: path.into() })
    }
}

/// Extension trait for adding context to reqwest results.
pub trait HttpResultExt<T> {
    /// Add the RPC operation name to an HTTP failure.
    fn http_context(self, operation: impl Into<String>) -> Result<T>;
}

impl<T> HttpResultExt<T> for std::result::Result<T, reqwest::Error> {
    fn http_context(self, operation: impl Into<String>) -> Result<T> {
        self.context(HttpSnafu {
            operation: operation.into(),
        })
    }
}
