//! Disk/filesystem reconciliation.
//!
//! `DiskMgmt.getList` and `FileSystemMgmt.getList` are independent endpoints
//! that name devices differently. This module attaches at most one filesystem
//! to each disk and produces the [`MergedDiskView`] snapshot handed to callers.
//!
//! # Matching Strategy
//!
//! 1. Alias intersection: the first filesystem whose alias set (from
//!    `devicefile`, `canonicaldevicefile`, `uuid`) shares an entry with the
//!    disk's alias set (from `devicefile`, `canonicaldevicefile`, `devicename`)
//!    is taken immediately.
//! 2. Prefix fallback: otherwise, a filesystem whose raw `devicefile` starts
//!    with one of the disk aliases is accepted. When several qualify, the last
//!    one in iteration order wins.

use serde::Serialize;
use tracing::debug;

use crate::identifier::{device_aliases, matches_alias_prefix, normalize_identifier};
use crate::metrics::{self, Capacity};
use crate::record::{DiskRecord, FilesystemRecord};

/// Filesystem attributes copied onto a disk that matched a filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilesystemInfo {
    #[serde(rename = "filesystem_label")]
    pub label: Option<String>,
    pub mountpoint: Option<String>,
    #[serde(rename = "filesystem_type")]
    pub fs_type: Option<String>,
    #[serde(rename = "filesystem_uuid")]
    pub uuid: Option<String>,
}

impl From<&FilesystemRecord> for FilesystemInfo {
    fn from(fs: &FilesystemRecord) -> Self {
        Self {
            label: fs.label.clone(),
            mountpoint: fs.mountpoint.clone(),
            fs_type: fs.fs_type.clone(),
            uuid: fs.uuid.clone(),
        }
    }
}

/// A disk record enriched with its matched filesystem and capacity metrics.
///
/// Built once per refresh cycle and replaced wholesale by the next one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedDiskView {
    /// The disk as received.
    #[serde(flatten)]
    pub disk: DiskRecord,
    /// Present only if a filesystem matched.
    #[serde(flatten)]
    pub filesystem: Option<FilesystemInfo>,
    /// Normalized stable identifier; empty when the disk has no identifier at all.
    pub disk_id: String,
    pub size_bytes: Option<i64>,
    pub available_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_bytes: Option<i64>,
}

impl MergedDiskView {
    fn new(disk: &DiskRecord, filesystem: Option<&FilesystemRecord>) -> Self {
        let capacity = Capacity::derive(disk, filesystem);
        Self {
            disk: disk.clone(),
            filesystem: filesystem.map(FilesystemInfo::from),
            disk_id: stable_disk_identifier(disk, filesystem),
            size_bytes: capacity.size_bytes,
            available_bytes: capacity.available_bytes,
            used_bytes: capacity.used_bytes,
        }
    }

    /// Returns the filesystem label, if a labelled filesystem matched.
    pub fn filesystem_label(&self) -> Option<&str> {
        self.filesystem.as_ref()?.label.as_deref()
    }

    pub fn mountpoint(&self) -> Option<&str> {
        self.filesystem.as_ref()?.mountpoint.as_deref()
    }

    pub fn filesystem_type(&self) -> Option<&str> {
        self.filesystem.as_ref()?.fs_type.as_deref()
    }

    /// Returns a human-readable name: the description, else the device name.
    pub fn display_name(&self) -> &str {
        self.disk
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.disk.devicename.as_deref())
            .unwrap_or(self.disk_id.as_str())
    }

    /// Disk temperature in degrees Celsius, if the reading is numeric.
    pub fn temperature_celsius(&self) -> Option<f64> {
        let reading = match &self.disk.temperature {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        reading.filter(|t| t.is_finite())
    }

    fn capacity(&self) -> Capacity {
        Capacity {
            size_bytes: self.size_bytes,
            available_bytes: self.available_bytes,
            used_bytes: self.used_bytes,
        }
    }

    pub fn usage_percent(&self) -> Option<f64> {
        self.capacity().usage_percent()
    }

    pub fn size_gb(&self) -> Option<f64> {
        self.size_bytes.map(metrics::bytes_to_gb)
    }

    pub fn available_gb(&self) -> Option<f64> {
        self.available_bytes.map(metrics::bytes_to_gb)
    }

    pub fn used_gb(&self) -> Option<f64> {
        self.used_bytes.map(metrics::bytes_to_gb)
    }
}

/// Merges disks with filesystems, preserving the order of `disks`.
pub fn reconcile(disks: &[DiskRecord], filesystems: &[FilesystemRecord]) -> Vec<MergedDiskView> {
    disks
        .iter()
        .map(|disk| {
            let filesystem = find_matching_filesystem(disk, filesystems);
            MergedDiskView::new(disk, filesystem)
        })
        .collect()
}

/// Finds the filesystem mounted from `disk`, if any.
pub fn find_matching_filesystem<'a>(
    disk: &DiskRecord,
    filesystems: &'a [FilesystemRecord],
) -> Option<&'a FilesystemRecord> {
    let disk_keys = device_aliases([
        disk.devicefile.as_deref(),
        disk.canonicaldevicefile.as_deref(),
        disk.devicename.as_deref(),
    ]);
    if disk_keys.is_empty() {
        return None;
    }

    let mut prefix_match: Option<&FilesystemRecord> = None;
    for fs in filesystems {
        let fs_keys = device_aliases([
            fs.devicefile.as_deref(),
            fs.canonicaldevicefile.as_deref(),
            fs.uuid.as_deref(),
        ]);
        if fs_keys.is_empty() {
            continue;
        }
        if !disk_keys.is_disjoint(&fs_keys) {
            return Some(fs);
        }

        if matches_alias_prefix(fs.devicefile.as_deref(), &disk_keys) {
            if let Some(previous) = prefix_match {
                debug!(
                    disk = ?disk.devicefile,
                    replaced = ?previous.devicefile,
                    by = ?fs.devicefile,
                    "multiple filesystems match disk by prefix, keeping the last"
                );
            }
            prefix_match = Some(fs);
        }
    }

    prefix_match
}

/// Picks the most stable identifier available for a disk.
///
/// Order: filesystem UUID, disk UUID, serial number, WWN, device file,
/// device name.
pub fn stable_disk_identifier(disk: &DiskRecord, filesystem: Option<&FilesystemRecord>) -> String {
    [
        filesystem.and_then(|fs| fs.uuid.as_deref()),
        disk.uuid.as_deref(),
        disk.serialnumber.as_deref(),
        disk.serial.as_deref(),
        disk.wwn.as_deref(),
        disk.devicefile.as_deref(),
        disk.devicename.as_deref(),
    ]
    .into_iter()
    .map(normalize_identifier)
    .find(|id| !id.is_empty())
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn disk(value: serde_json::Value) -> DiskRecord {
        serde_json::from_value(value).unwrap()
    }

    fn filesystem(value: serde_json::Value) -> FilesystemRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_merge_uses_filesystem_capacity_overrides_disk_size() {
        let disks = vec![disk(json!({
            "devicename": "sda",
            "devicefile": "/dev/sda",
            "canonicaldevicefile": "/dev/disk/by-id/sda",
            "size": "500000000000",
            "model": "DiskOne"
        }))];
        let filesystems = vec![filesystem(json!({
            "devicefile": "/dev/sda",
            "size": "400000000000",
            "available": "150000000000",
            "label": "data",
            "mountpoint": "/data",
            "type": "ext4"
        }))];

        let merged = reconcile(&disks, &filesystems);
        let view = &merged[0];

        assert_eq!(view.size_bytes, Some(400_000_000_000));
        assert_eq!(view.available_bytes, Some(150_000_000_000));
        assert_eq!(view.used_bytes, Some(250_000_000_000));
        assert_eq!(view.filesystem_label(), Some("data"));
        assert_eq!(view.mountpoint(), Some("/data"));
        assert_eq!(view.filesystem_type(), Some("ext4"));
        assert_eq!(view.usage_percent(), Some(62.5));
        assert_eq!(view.disk.model.as_deref(), Some("DiskOne"));
    }

    #[test]
    fn test_merge_keeps_disk_only_data_when_filesystem_missing() {
        let disks = vec![disk(json!({
            "devicename": "sdb",
            "devicefile": "/dev/sdb",
            "size": 123456789,
            "model": "DiskTwo"
        }))];

        let merged = reconcile(&disks, &[]);
        let view = &merged[0];

        assert_eq!(view.size_bytes, Some(123456789));
        assert_eq!(view.available_bytes, None);
        assert_eq!(view.used_bytes, None);
        assert!(view.filesystem.is_none());

        let serialized = serde_json::to_value(view).unwrap();
        assert!(serialized.get("filesystem_label").is_none());
        assert!(serialized.get("used_bytes").is_none());
        assert_eq!(serialized["available_bytes"], json!(null));
        assert_eq!(serialized["disk_id"], json!("sdb"));
    }

    #[test]
    fn test_partition_filesystem_matches_whole_disk() {
        let disks = vec![disk(json!({"devicefile": "/dev/nvme0n1"}))];
        let filesystems = vec![
            filesystem(json!({"devicefile": "/dev/sda1", "label": "other"})),
            filesystem(json!({"devicefile": "/dev/nvme0n1p2", "label": "root"})),
        ];

        let merged = reconcile(&disks, &filesystems);
        assert_eq!(merged[0].filesystem_label(), Some("root"));
    }

    #[test]
    fn test_exact_match_wins_over_earlier_prefix_match() {
        let target = disk(json!({"devicefile": "/dev/sdx"}));
        let filesystems = vec![
            filesystem(json!({"devicefile": "/dev/sdxa", "label": "prefix"})),
            filesystem(json!({"devicefile": "/dev/sdx", "label": "exact"})),
        ];

        let matched = find_matching_filesystem(&target, &filesystems).unwrap();
        assert_eq!(matched.label.as_deref(), Some("exact"));
    }

    #[test]
    fn test_first_exact_match_stops_scan() {
        let target = disk(json!({"devicefile": "/dev/sdc"}));
        let filesystems = vec![
            filesystem(json!({"devicefile": "/dev/sdc", "label": "one"})),
            filesystem(json!({"canonicaldevicefile": "/dev/sdc", "label": "two"})),
        ];

        let matched = find_matching_filesystem(&target, &filesystems).unwrap();
        assert_eq!(matched.label.as_deref(), Some("one"));
    }

    #[test]
    fn test_last_prefix_match_wins() {
        let target = disk(json!({"devicefile": "/dev/sdx"}));
        let filesystems = vec![
            filesystem(json!({"devicefile": "/dev/sdxa", "label": "first"})),
            filesystem(json!({"devicefile": "/dev/sdxb", "label": "second"})),
        ];

        let matched = find_matching_filesystem(&target, &filesystems).unwrap();
        assert_eq!(matched.label.as_deref(), Some("second"));
    }

    #[test]
    fn test_prefix_match_on_stripped_devicefile() {
        let target = disk(json!({"devicefile": "/dev/vdz"}));
        let filesystems = vec![filesystem(json!({"devicefile": "vdzq", "label": "bare"}))];

        let matched = find_matching_filesystem(&target, &filesystems).unwrap();
        assert_eq!(matched.label.as_deref(), Some("bare"));
    }

    #[test]
    fn test_disk_without_identifiers_never_matches() {
        let target = disk(json!({"model": "Mystery", "size": "10"}));
        let filesystems = vec![filesystem(json!({"devicefile": "/dev/sda1"}))];

        assert!(find_matching_filesystem(&target, &filesystems).is_none());
        let merged = reconcile(std::slice::from_ref(&target), &filesystems);
        assert_eq!(merged[0].disk_id, "");
        assert_eq!(merged[0].size_bytes, Some(10));
        assert_eq!(merged[0].display_name(), "");
    }

    #[test]
    fn test_filesystem_without_identifiers_is_skipped() {
        let target = disk(json!({"devicefile": "/dev/sda"}));
        let filesystems = vec![filesystem(json!({"label": "orphan"}))];
        assert!(find_matching_filesystem(&target, &filesystems).is_none());
    }

    #[test]
    fn test_reconcile_preserves_disk_order() {
        let disks = vec![
            disk(json!({"devicename": "sdb"})),
            disk(json!({"devicename": "sda"})),
            disk(json!({"devicename": "nvme0n1"})),
        ];
        let names: Vec<_> = reconcile(&disks, &[])
            .into_iter()
            .map(|v| v.disk.devicename.unwrap())
            .collect();
        assert_eq!(names, ["sdb", "sda", "nvme0n1"]);
    }

    #[test]
    fn test_stable_identifier_precedence() {
        let target = disk(json!({
            "devicefile": "/dev/sda",
            "devicename": "sda",
            "serialnumber": "  WD-ABC 123 ",
            "wwn": "0x5000c500a1b2c3d4"
        }));
        assert_eq!(stable_disk_identifier(&target, None), "wd-abc_123");

        let fs = filesystem(json!({"uuid": "3F1C2A9E-77AA"}));
        assert_eq!(stable_disk_identifier(&target, Some(&fs)), "3f1c2a9e-77aa");

        let serial_only = disk(json!({"serial": "S4EV", "devicefile": "/dev/sdb"}));
        assert_eq!(stable_disk_identifier(&serial_only, None), "s4ev");

        let wwn_only = json!({"serialnumber": "", "wwn": "naa.5000", "devicename": "sdc"});
        let wwn_only = disk(wwn_only);
        assert_eq!(stable_disk_identifier(&wwn_only, None), "naa_5000");

        let path_only = disk(json!({"devicefile": "/dev/sdd", "devicename": "other"}));
        assert_eq!(stable_disk_identifier(&path_only, None), "sdd");
    }

    #[test]
    fn test_stable_identifier_ignores_field_order() {
        let a = disk(json!({"devicefile": "/dev/sda", "serialnumber": "XYZ"}));
        let raw = r#"{"serialnumber": "XYZ", "devicefile": "/dev/sda"}"#;
        let b: DiskRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(
            stable_disk_identifier(&a, None),
            stable_disk_identifier(&b, None)
        );
    }

    #[test]
    fn test_used_bytes_clamped_when_available_exceeds_size() {
        let disks = vec![disk(json!({"devicefile": "/dev/sde"}))];
        let filesystems = vec![filesystem(json!({
            "devicefile": "/dev/sde1",
            "size": "1000",
            "available_bytes": "1200"
        }))];

        let merged = reconcile(&disks, &filesystems);
        assert_eq!(merged[0].used_bytes, Some(0));
        assert_eq!(merged[0].usage_percent(), Some(0.0));
    }

    #[test]
    fn test_unreadable_filesystem_size_does_not_fall_back_to_disk() {
        let disks = vec![disk(json!({"devicefile": "/dev/sdf", "size": "2000"}))];
        let filesystems = vec![filesystem(json!({
            "devicefile": "/dev/sdf1",
            "label": "scratch",
            "size": "n/a",
            "available": "500"
        }))];

        let merged = reconcile(&disks, &filesystems);
        let view = &merged[0];
        assert_eq!(view.filesystem_label(), Some("scratch"));
        assert_eq!(view.size_bytes, None);
        assert_eq!(view.available_bytes, Some(500));
        assert_eq!(view.used_bytes, None);
        assert_eq!(view.usage_percent(), None);
    }

    #[test]
    fn test_display_helpers() {
        let view = reconcile(
            &[disk(json!({
                "devicename": "sda",
                "description": "WDC WD40EFRX [/dev/sda, 3.63 TiB]",
                "temperature": "36"
            }))],
            &[],
        )
        .remove(0);

        assert_eq!(view.display_name(), "WDC WD40EFRX [/dev/sda, 3.63 TiB]");
        assert_eq!(view.temperature_celsius(), Some(36.0));
        assert_eq!(view.size_gb(), None);

        let bare = disk(json!({"devicename": "sdb", "temperature": "n/a"}));
        let unreadable = reconcile(&[bare], &[]).remove(0);
        assert_eq!(unreadable.display_name(), "sdb");
        assert_eq!(unreadable.temperature_celsius(), None);
    }
}
