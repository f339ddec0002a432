// SPDX-License-Identifier: GPL-3.0-only

//! Volume data model
//!
//! A `Volume` is a single mountable filesystem instance. It is rebuilt from
//! scratch on every refresh; nothing here is persisted directly.

use serde::{Deserialize, Serialize};

use crate::disk::ApfsSnapshot;

/// Whether a volume is ordinary user data or a special system partition.
///
/// `System` currently only applies to EFI partitions living under a virtual
/// (disk image) parent; those are shown but never offered for mounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeCategory {
    User,
    System,
}

/// A mountable filesystem instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Stable identity: the volume's persistent UUID when diskutil reports
    /// one, otherwise the transient device identifier. The fallback means
    /// two UUID-less volumes could collide in the preference sets after
    /// reconnection; this is a known limitation carried over deliberately.
    pub id: String,

    /// Transient OS handle (e.g. "disk4s1"). Valid for this session only;
    /// used to issue diskutil commands and discarded otherwise.
    pub device_identifier: String,

    /// UUID of the owning physical disk, if available
    pub disk_uuid: Option<String>,

    /// Display name
    pub name: String,

    /// Whether the volume is currently mounted
    pub is_mounted: bool,

    /// Mount point path; `None` whenever unmounted
    pub mount_point: Option<String>,

    /// Filesystem / content type (e.g. "APFS", "EFI", "Windows_NTFS")
    pub file_system_type: Option<String>,

    // === Storage statistics (only populated for mounted volumes) ===
    /// Human-readable total size
    pub total_size: Option<String>,

    /// Human-readable free space
    pub free_space: Option<String>,

    /// Human-readable used space
    pub used_space: Option<String>,

    /// Raw used byte count
    pub used_bytes: Option<u64>,

    /// Usage as a fraction in 0..=1
    pub usage_percentage: Option<f64>,

    /// Set when statistics could not be computed (typically a permission
    /// denial); mutually exclusive with the numeric stats being populated
    pub storage_error: Option<String>,

    /// User data or special system partition
    pub category: VolumeCategory,

    /// Membership in the durable protected set, resolved at build time
    pub is_protected: bool,

    /// Mounted APFS snapshots, in discovery order
    pub snapshots: Vec<ApfsSnapshot>,
}

impl Volume {
    /// Durable join key against the persisted preference sets.
    ///
    /// `None` when the owning disk has no UUID: such a volume cannot be
    /// persistently tracked at all.
    pub fn composite_id(&self) -> Option<String> {
        self.disk_uuid
            .as_deref()
            .map(|disk_uuid| format!("{}-{}", disk_uuid, self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_volume() -> Volume {
        Volume {
            id: "E7E5xxxx".into(),
            device_identifier: "disk4s2".into(),
            disk_uuid: None,
            name: "Backup".into(),
            is_mounted: false,
            mount_point: None,
            file_system_type: Some("APFS".into()),
            total_size: None,
            free_space: None,
            used_space: None,
            used_bytes: None,
            usage_percentage: None,
            storage_error: None,
            category: VolumeCategory::User,
            is_protected: false,
            snapshots: Vec::new(),
        }
    }

    #[test]
    fn composite_id_requires_disk_uuid() {
        let mut volume = bare_volume();
        assert_eq!(volume.composite_id(), None);

        volume.disk_uuid = Some("AAAA-BBBB".into());
        assert_eq!(volume.composite_id().as_deref(), Some("AAAA-BBBB-E7E5xxxx"));
    }
}
