//! Per-cycle refresh driver.
//!
//! One [`Coordinator::refresh`] call is one polling cycle: make sure a session
//! exists, fetch disks and filesystems, reconcile them, and return the
//! snapshot. The whole cycle runs under a single timeout. A failed fetch gets
//! exactly one recovery attempt (fresh login, both lists fetched again); a
//! second failure is reported as [`Error::UpdateFailed`].
//!
//! Callers must not run cycles concurrently on the same coordinator.

use std::time::Duration;

use snafu::ResultExt;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result, UpdateFailedSnafu};
use crate::reconcile::{MergedDiskView, reconcile};
use crate::record::{DiskRecord, FilesystemRecord};
use crate::rpc::{self, RpcRequest};
use crate::session::{Credentials, SessionManager, SessionStatus};
use crate::transport::{HttpTransport, RpcTransport};

/// Time budget for one full cycle (login and both fetches together).
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives refresh cycles for one OMV host.
pub struct Coordinator<T> {
    session: SessionManager<T>,
    timeout: Duration,
}

impl Coordinator<HttpTransport> {
    /// Creates a coordinator talking HTTP to the host in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.rpc_url())?;
        let coordinator = Self::new(transport, config.credentials(), &config.host);
        Ok(coordinator.with_timeout(config.timeout()))
    }
}

impl<T: RpcTransport> Coordinator<T> {
    pub fn new(transport: T, credentials: Credentials, host: impl Into<String>) -> Self {
        Self {
            session: SessionManager::new(transport, credentials, host),
            timeout: REFRESH_TIMEOUT,
        }
    }

    /// Overrides the cycle time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &SessionManager<T> {
        &self.session
    }

    pub fn session_status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Runs one refresh cycle.
    ///
    /// Every failure, including a timeout, is returned as
    /// [`Error::UpdateFailed`] wrapping the cause.
    pub async fn refresh(&self) -> Result<Vec<MergedDiskView>> {
        match tokio::time::timeout(self.timeout, self.run_cycle()).await {
            Ok(result) => result.context(UpdateFailedSnafu),
            Err(_) => Err(Error::TransportTimeout {
                timeout: self.timeout,
            })
            .context(UpdateFailedSnafu),
        }
    }

    async fn run_cycle(&self) -> Result<Vec<MergedDiskView>> {
        self.session.ensure_authenticated().await?;

        let (disks, filesystems) = match self.fetch_all().await {
            Ok(lists) => lists,
            Err(e) => {
                warn!(error = %e, "OpenMediaVault fetch failed, logging in again");
                self.session.invalidate().await;
                self.session.ensure_authenticated().await?;
                self.fetch_all().await?
            }
        };

        let merged = reconcile(&disks, &filesystems);
        debug!(
            disks = merged.len(),
            filesystems = filesystems.len(),
            "OpenMediaVault data retrieved"
        );
        Ok(merged)
    }

    async fn fetch_all(&self) -> Result<(Vec<DiskRecord>, Vec<FilesystemRecord>)> {
        tokio::try_join!(self.fetch_disks(), self.fetch_filesystems())
    }

    async fn fetch_disks(&self) -> Result<Vec<DiskRecord>> {
        self.fetch_list(RpcRequest::disk_list()).await
    }

    async fn fetch_filesystems(&self) -> Result<Vec<FilesystemRecord>> {
        self.fetch_list(RpcRequest::filesystem_list()).await
    }

    async fn fetch_list<R>(&self, request: RpcRequest) -> Result<Vec<R>>
    where
        R: serde::de::DeserializeOwned,
    {
        let body = self.session.call(&request).await?;
        rpc::decode_list(&request.operation(), &body)
    }
}
