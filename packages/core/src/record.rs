//! Raw records returned by the OpenMediaVault list endpoints.
//!
//! Field values are loosely typed on the wire: identifiers usually arrive as
//! strings but may be numbers or null, and byte counts arrive as strings,
//! integers or floats depending on the OMV version. Identifier fields are
//! coerced to strings on read; byte counts are kept as raw JSON values and
//! coerced later by [`crate::metrics::to_int`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One entry of `DiskMgmt.getList`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskRecord {
    /// Kernel device name (e.g., "sda", "nvme0n1").
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub devicename: Option<String>,
    /// Device path (e.g., "/dev/sda").
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub devicefile: Option<String>,
    /// Persistent device path (e.g., "/dev/disk/by-id/ata-...").
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub canonicaldevicefile: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub serialnumber: Option<String>,
    /// Alternative serial field name emitted by some releases.
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub wwn: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Raw size in bytes.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub size: Value,
    /// Raw temperature reading in degrees Celsius.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub temperature: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub status: Value,
    /// Attributes this crate does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of `FileSystemMgmt.getList`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemRecord {
    /// Block device backing the filesystem (e.g., "/dev/sda1").
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub devicefile: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub canonicaldevicefile: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
    /// Filesystem type (e.g., "ext4", "btrfs").
    #[serde(rename = "type")]
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fs_type: Option<String>,
    /// Raw filesystem size in bytes.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub size: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub available: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub available_bytes: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub free: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub free_bytes: Value,
    /// Attributes this crate does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilesystemRecord {
    /// Raw available-bytes candidates in lookup order.
    pub fn available_candidates(&self) -> [&Value; 4] {
        [
            &self.available,
            &self.available_bytes,
            &self.free,
            &self.free_bytes,
        ]
    }
}

/// Reads an identifier that may arrive as a string, number or boolean.
///
/// Null, arrays and objects become `None`.
fn lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}
