//! Polling loop for the `watch` command.

use std::time::Duration;

use omv_monitor_core::{Coordinator, MergedDiskView, RpcTransport};
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

/// Refreshes every `interval` until Ctrl-C.
///
/// Cycles run one after another; a failed cycle is logged and the next tick
/// tries again.
pub(crate) async fn run<T: RpcTransport>(coordinator: &Coordinator<T>, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_secs = interval.as_secs(),
        "watching OpenMediaVault host"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match coordinator.refresh().await {
                    Ok(snapshot) => log_snapshot(&snapshot),
                    Err(e) => error!(error = %e, "refresh failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                break;
            }
        }
    }
}

fn log_snapshot(snapshot: &[MergedDiskView]) {
    info!(disks = snapshot.len(), "refresh complete");
    for disk in snapshot {
        info!(
            disk = %disk.display_name(),
            id = %disk.disk_id,
            mountpoint = disk.mountpoint().unwrap_or("-"),
            size_gb = disk.size_gb(),
            used_gb = disk.used_gb(),
            usage_percent = disk.usage_percent(),
            temperature = disk.temperature_celsius(),
            "{}",
            summary_line(disk)
        );
    }
}

/// One-line human summary, e.g. `sda: 312.5/500.0 GB (62.5%)`.
fn summary_line(disk: &MergedDiskView) -> String {
    let usage = match (disk.used_gb(), disk.size_gb(), disk.usage_percent()) {
        (Some(used), Some(size), Some(percent)) => format!("{used:.1}/{size:.1} GB ({percent}%)"),
        (_, Some(size), _) => format!("{size:.1} GB, usage unknown"),
        _ => "size unknown".to_string(),
    };
    format!("{}: {usage}", disk.display_name())
}
