//! omv-monitor-core: Core library for monitoring OpenMediaVault storage.
//!
//! This library logs in to an OpenMediaVault (OMV) host over its JSON-RPC
//! API, fetches the physical disk and filesystem lists, and reconciles them
//! into one snapshot entry per disk with capacity and usage figures.
//!
//! # Modules
//!
//! - [`config`]: Connection settings loaded from TOML
//! - [`coordinator`]: Refresh cycle with timeout and one recovery attempt
//! - [`session`]: Login and session cookie handling
//! - [`transport`]: HTTP transport behind the [`RpcTransport`] trait
//! - [`rpc`]: RPC envelopes and reply classification
//! - [`record`]: Raw disk and filesystem records
//! - [`identifier`]: Device name normalization and aliases
//! - [`metrics`]: Lenient numeric parsing and capacity math
//! - [`reconcile`]: Disk to filesystem matching
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use omv_monitor_core::{Config, Coordinator};
//!
//! # async fn run() -> omv_monitor_core::Result<()> {
//! let config = Config::new("nas.local", "admin", "openmediavault");
//! let coordinator = Coordinator::from_config(&config)?;
//!
//! for disk in coordinator.refresh().await? {
//!     println!("{}: {:?}%", disk.display_name(), disk.usage_percent());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod identifier;
pub mod metrics;
pub mod reconcile;
pub mod record;
pub mod rpc;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, REFRESH_TIMEOUT};
pub use error::{Error, Result};
pub use reconcile::{MergedDiskView, reconcile};
pub use record::{DiskRecord, FilesystemRecord};
pub use session::{Credentials, SessionManager, SessionStatus};
pub use transport::{HttpTransport, RpcTransport};
