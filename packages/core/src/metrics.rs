//! Derived capacity metrics.
//!
//! Byte counts coming off the wire are coerced with [`to_int`]; any value that
//! cannot be read degrades to `None` ("metric unknown") instead of failing the
//! refresh cycle.

use serde_json::Value;

use crate::record::{DiskRecord, FilesystemRecord};

/// Bytes per gigabyte (binary, 1024³).
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Best-effort conversion of a raw JSON value to a byte count.
///
/// Null and empty strings are absent. Strings are parsed as integers first,
/// then as floats truncated toward zero. Non-finite or out-of-range numbers
/// are absent.
pub fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().and_then(truncate_float)),
        Value::String(s) => parse_int_str(s),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_int_str(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(truncate_float))
}

fn truncate_float(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    let in_range = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
    in_range.then_some(truncated as i64)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Converts bytes to gigabytes rounded to 3 decimals. Negative input is 0.0.
pub fn bytes_to_gb(bytes: i64) -> f64 {
    if bytes <= 0 {
        return 0.0;
    }
    round_to(bytes as f64 / BYTES_PER_GB, 3)
}

/// Usage percentage rounded to 2 decimals, always within `[0, 100]`.
///
/// Requires a positive size. `used` is preferred; otherwise it is derived
/// from `available`. Returns `None` when neither is known.
pub fn usage_percent(size: Option<i64>, used: Option<i64>, available: Option<i64>) -> Option<f64> {
    let size = size.filter(|s| *s > 0)?;
    let used = used.or_else(|| available.map(|a| size.saturating_sub(a)))?;
    let used = used.clamp(0, size);
    Some(round_to(used as f64 / size as f64 * 100.0, 2))
}

/// First populated available-bytes field on a filesystem record.
pub fn filesystem_available(fs: &FilesystemRecord) -> Option<i64> {
    fs.available_candidates().into_iter().find_map(to_int)
}

/// Byte counts for one disk after matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capacity {
    pub size_bytes: Option<i64>,
    pub available_bytes: Option<i64>,
    /// Present only when size and available are both known; never negative.
    pub used_bytes: Option<i64>,
}

impl Capacity {
    /// Derives capacity from the matched filesystem, or the disk alone.
    ///
    /// A matched filesystem's size wins over the disk's raw size, even when
    /// the filesystem size is unreadable.
    pub fn derive(disk: &DiskRecord, filesystem: Option<&FilesystemRecord>) -> Self {
        let (size_bytes, available_bytes) = match filesystem {
            Some(fs) => (to_int(&fs.size), filesystem_available(fs)),
            None => (to_int(&disk.size), None),
        };
        let used_bytes = match (size_bytes, available_bytes) {
            (Some(size), Some(available)) => Some(size.saturating_sub(available).max(0)),
            _ => None,
        };

        Self {
            size_bytes,
            available_bytes,
            used_bytes,
        }
    }

    pub fn usage_percent(&self) -> Option<f64> {
        usage_percent(self.size_bytes, self.used_bytes, self.available_bytes)
    }
}
