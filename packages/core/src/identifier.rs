//! Device identifier normalization.
//!
//! The disk and filesystem endpoints name the same device in different ways
//! (`/dev/sda1`, `sda1`, `/dev/disk/by-id/...`, a UUID). This module turns
//! those into comparable alias forms.

use std::collections::HashSet;

const DEV_PREFIX: &str = "/dev/";

/// Canonicalizes a device identifier into a stable key.
///
/// Lowercases, strips one leading `/dev/`, collapses whitespace runs to `_`
/// and replaces anything outside `[a-z0-9_-]` with `_`. Returns an empty
/// string for absent or blank input; callers must treat that as "no identifier".
pub fn normalize_identifier(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let lowered = value.trim().to_lowercase();
    let stripped = lowered.strip_prefix(DEV_PREFIX).unwrap_or(&lowered);

    let mut normalized = String::with_capacity(stripped.len());
    let mut in_whitespace = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                normalized.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            normalized.push(c);
        } else {
            normalized.push('_');
        }
    }
    normalized
}

/// Device families whose whole-disk names end in a digit, so their
/// partitions carry a `p` separator (`nvme0n1p1`, `mmcblk0p2`, `md127p1`).
const P_SEPARATOR_FAMILIES: &[&str] = &[
    "nvme", "mmcblk", "md", "loop", "nbd", "zd", "pmem", "bcache", "rbd",
];

/// Derives the disk root name from a partition device name.
///
/// Names of the `p`-separator families lose their trailing `p<N>`
/// (`nvme0n1p1` becomes `nvme0n1`); other names lose a trailing digit run
/// (`sda1` becomes `sda`). The result is a fixed point: stripping it again
/// returns it unchanged.
pub fn strip_partition_suffix(name: &str) -> &str {
    if !is_p_separator_family(name) {
        return name.trim_end_matches(|c: char| c.is_ascii_digit());
    }
    let mut root = name;
    while let Some(stripped) = strip_p_partition(root) {
        root = stripped;
    }
    root
}

fn is_p_separator_family(name: &str) -> bool {
    P_SEPARATOR_FAMILIES.iter().any(|family| {
        name.strip_prefix(family)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_digit())
    })
}

/// Strips one trailing `p<N>` whose `p` follows a digit.
fn strip_p_partition(name: &str) -> Option<&str> {
    let without_digits = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == name.len() {
        return None;
    }
    let root = without_digits.strip_suffix('p')?;
    root.ends_with(|c: char| c.is_ascii_digit()).then_some(root)
}

/// Returns the last path component, or the whole value if it has none.
fn basename(value: &str) -> &str {
    value.rsplit('/').next().unwrap_or(value)
}

/// Builds the alias set for one entity from its candidate identifiers.
///
/// For each non-empty candidate this includes the raw value, its basename,
/// the `/dev/`-stripped form and the partition root of the basename.
pub fn device_aliases<'a, I>(candidates: I) -> HashSet<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut aliases = HashSet::new();
    for value in candidates.into_iter().flatten() {
        if value.is_empty() {
            continue;
        }
        let base = basename(value);
        aliases.insert(value.to_string());
        aliases.insert(base.to_string());
        if let Some(stripped) = value.strip_prefix(DEV_PREFIX) {
            aliases.insert(stripped.to_string());
        }
        aliases.insert(strip_partition_suffix(base).to_string());
    }
    aliases.retain(|alias| !alias.is_empty());
    aliases
}

/// Returns true if `devicefile` starts with any alias, also trying each
/// alias without its `/dev/` prefix.
pub fn matches_alias_prefix(devicefile: Option<&str>, aliases: &HashSet<String>) -> bool {
    let Some(devicefile) = devicefile.filter(|d| !d.is_empty()) else {
        return false;
    };
    aliases.iter().filter(|key| !key.is_empty()).any(|key| {
        devicefile.starts_with(key.as_str())
            || key
                .strip_prefix(DEV_PREFIX)
                .is_some_and(|stripped| devicefile.starts_with(stripped))
    })
}
