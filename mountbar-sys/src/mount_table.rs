// SPDX-License-Identifier: GPL-3.0-only

//! Mount-table parsing
//!
//! The share manager polls `mount` output to learn which configured SMB
//! shares are currently mounted. A line looks like:
//!
//! `//meo@192.168.1.100/public on /Volumes/public (smbfs, nodev, nosuid)`

/// One parsed mount-table line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mount source (e.g. "//user@server/share" or "/dev/disk4s2")
    pub source: String,

    /// Mount point path
    pub mount_point: String,

    /// Filesystem type from the parenthesized option list
    pub fs_type: String,
}

/// Parse `mount` output into entries. Lines that do not follow the
/// `source on path (type, …)` shape are skipped.
pub fn parse_mount_table(output: &str) -> Vec<MountEntry> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }

            let (source, rest) = line.split_once(" on ")?;
            let (mount_point, options) = rest.split_once(" (")?;
            let fs_type = options
                .trim_end_matches(')')
                .split(',')
                .next()
                .unwrap_or_default()
                .trim();

            Some(MountEntry {
                source: source.trim().to_string(),
                mount_point: mount_point.trim().to_string(),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}
