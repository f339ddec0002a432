// SPDX-License-Identifier: GPL-3.0-only

//! Volume/disk model builder
//!
//! Turns the parser's raw records into published [`Volume`] and
//! [`PhysicalDisk`] values, consulting the preference store to drop ignored
//! volumes and annotate protected ones, and computing derived storage
//! statistics.
//!
//! Statistics rules:
//! - unmounted volumes carry no stats at all (no mount point, no sizes)
//! - used bytes come preferentially from `CapacityInUse` — for APFS, free
//!   space is shared across a container and cannot be derived from
//!   free/total of one volume alone — with a statvfs query of the mount
//!   point as fallback
//! - a failed statvfs query sets `storage_error` and leaves the numbers
//!   unset; zero values are never fabricated

use std::path::Path;

use mountbar_sys::{FsAttributes, SysError, query_fs_attributes};
use mountbar_types::{
    ApfsContainer, ApfsSnapshot, DiskKind, DiskStats, PhysicalDisk, Volume, VolumeCategory,
    bytes_to_pretty,
};
use tracing::debug;

use crate::diskutil::{DiskInfo, RawContainer, RawRootDisk, RawVolume};
use crate::store::PreferenceStore;

const PERMISSION_HINT: &str = "Could not read storage details. Please grant Mountbar \
    'Full Disk Access' or 'Files and Folders' permissions in \
    System Settings > Privacy & Security.";

const AGGREGATE_ERROR: &str =
    "Could not calculate total usage because an error occurred on one of its volumes.";

/// Seam over statvfs so the builder can be exercised without real mounts
pub trait FsProbe: Send + Sync {
    fn attributes(&self, mount_point: &Path) -> mountbar_sys::Result<FsAttributes>;
}

/// Queries the live filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFsProbe;

impl FsProbe for SystemFsProbe {
    fn attributes(&self, mount_point: &Path) -> mountbar_sys::Result<FsAttributes> {
        query_fs_attributes(mount_point)
    }
}

/// Build one volume. Returns `None` when the volume matches the ignored set.
pub fn build_volume(
    raw: &RawVolume,
    parent_is_virtual: bool,
    prefs: &PreferenceStore,
    probe: &dyn FsProbe,
) -> Option<Volume> {
    // Volume UUID falls back to the device identifier for UUID-less
    // filesystems; accepted limitation, see the Volume docs.
    let id = raw
        .volume_uuid
        .clone()
        .unwrap_or_else(|| raw.device_identifier.clone());

    let composite = raw
        .disk_uuid
        .as_deref()
        .map(|disk_uuid| format!("{disk_uuid}-{id}"));

    if let Some(composite) = composite.as_deref() {
        if prefs.is_composite_ignored(composite) {
            debug!(volume = %id, "dropping ignored volume");
            return None;
        }
    }
    let is_protected = composite
        .as_deref()
        .is_some_and(|c| prefs.is_composite_protected(c));

    let name = raw
        .volume_name
        .clone()
        .or_else(|| raw.content.clone())
        .unwrap_or_else(|| raw.device_identifier.clone());

    // EFI partitions under virtual (disk image) parents are system
    // partitions; everything else is user data.
    let category = if raw.content.as_deref() == Some("EFI") && parent_is_virtual {
        VolumeCategory::System
    } else {
        VolumeCategory::User
    };

    let file_system_type = raw
        .content
        .clone()
        .or_else(|| raw.filesystem_name.clone())
        .or_else(|| Some("Unknown".to_string()));

    let is_mounted = raw.mount_point.is_some();

    let mut total_size = None;
    let mut free_space = None;
    let mut used_space = None;
    let mut used_bytes = None;
    let mut usage_percentage = None;
    let mut storage_error = None;

    if is_mounted {
        if let Some(total) = raw.size.filter(|&t| t > 0) {
            let used = match raw.capacity_in_use {
                Some(capacity) => Some(capacity),
                None => {
                    let mount_point = raw.mount_point.as_deref().unwrap_or_default();
                    match probe.attributes(Path::new(mount_point)) {
                        Ok(attrs) => Some(attrs.used_bytes()),
                        Err(e) => {
                            debug!(volume = %name, "filesystem attributes unavailable: {e}");
                            storage_error = Some(PERMISSION_HINT.to_string());
                            None
                        }
                    }
                }
            };

            if let Some(used) = used {
                let free = total.saturating_sub(used);
                total_size = Some(bytes_to_pretty(&total, false));
                free_space = Some(bytes_to_pretty(&free, false));
                used_space = Some(bytes_to_pretty(&used, false));
                used_bytes = Some(used);
                usage_percentage = Some((used as f64 / total as f64).min(1.0));
            }
        }
    }

    Some(Volume {
        id,
        device_identifier: raw.device_identifier.clone(),
        disk_uuid: raw.disk_uuid.clone(),
        name,
        is_mounted,
        mount_point: raw.mount_point.clone(),
        file_system_type,
        total_size,
        free_space,
        used_space,
        used_bytes,
        usage_percentage,
        storage_error,
        category,
        is_protected,
        snapshots: raw
            .snapshots
            .iter()
            .map(|s| ApfsSnapshot {
                id: s.uuid.clone(),
                name: s.name.clone(),
            })
            .collect(),
    })
}

/// Build a container; empty raw containers produce `None`.
pub fn build_container(
    raw: &RawContainer,
    parent_is_virtual: bool,
    prefs: &PreferenceStore,
    probe: &dyn FsProbe,
) -> Option<ApfsContainer> {
    if raw.volumes.is_empty() {
        return None;
    }
    let volumes = raw
        .volumes
        .iter()
        .filter_map(|v| build_volume(v, parent_is_virtual, prefs, probe))
        .collect();
    Some(ApfsContainer {
        id: raw.id.clone(),
        volumes,
    })
}

/// Aggregate statistics for a parent disk.
///
/// If any constituent volume carries a storage error the aggregate is an
/// error; partial numbers would present misleading totals.
pub fn disk_stats(total_bytes: u64, volumes: &[&Volume]) -> DiskStats {
    if volumes.iter().any(|v| v.storage_error.is_some()) {
        return DiskStats {
            storage_error: Some(AGGREGATE_ERROR.to_string()),
            ..DiskStats::default()
        };
    }

    if total_bytes == 0 {
        return DiskStats::default();
    }

    let used: u64 = volumes.iter().filter_map(|v| v.used_bytes).sum();
    // Floored at zero to tolerate skew between enumeration and live stat.
    let free = total_bytes.saturating_sub(used);

    DiskStats {
        total_size: Some(bytes_to_pretty(&total_bytes, false)),
        free_space: Some(bytes_to_pretty(&free, false)),
        used_space: Some(bytes_to_pretty(&used, false)),
        usage_percentage: Some((used as f64 / total_bytes as f64).min(1.0)),
        storage_error: None,
    }
}

/// Build one published disk from a raw root and its info record.
///
/// Returns `None` for internal disks (unless the preference is enabled) and
/// for disks with no visible content.
pub fn build_disk(
    raw: &RawRootDisk,
    info: Option<DiskInfo>,
    prefs: &PreferenceStore,
    probe: &dyn FsProbe,
) -> Option<PhysicalDisk> {
    let info = info.unwrap_or_default();

    if info.internal && !prefs.show_internal_disks() {
        return None;
    }

    let partitions: Vec<Volume> = raw
        .partitions
        .iter()
        .filter_map(|v| build_volume(v, info.is_virtual, prefs, probe))
        .collect();
    let containers: Vec<ApfsContainer> = raw
        .containers
        .iter()
        .filter_map(|c| build_container(c, info.is_virtual, prefs, probe))
        .collect();

    let kind = if info.internal {
        DiskKind::Internal
    } else if info.is_virtual {
        DiskKind::DiskImage
    } else {
        DiskKind::Physical
    };

    let connection_type = if kind == DiskKind::DiskImage {
        "Disk Image".to_string()
    } else {
        info.bus_protocol.clone().unwrap_or_else(|| "Unknown".into())
    };

    let name = info
        .display_name()
        .map(str::to_string)
        .or_else(|| {
            partitions
                .first()
                .or_else(|| containers.first().and_then(|c| c.volumes.first()))
                .map(|v| v.name.clone())
        });

    let all_volumes: Vec<&Volume> = partitions
        .iter()
        .chain(containers.iter().flat_map(|c| c.volumes.iter()))
        .collect();
    let stats = disk_stats(raw.size.unwrap_or(0), &all_volumes);

    let disk = PhysicalDisk {
        id: raw.device_identifier.clone(),
        disk_uuid: info.disk_uuid,
        connection_type,
        name,
        kind,
        stats,
        partitions,
        containers,
    };

    if disk.has_visible_content() {
        Some(disk)
    } else {
        None
    }
}

/// Publication order: internal < physical < disk image, then by name with
/// unnamed disks first.
pub fn sort_disks(disks: &mut [PhysicalDisk]) {
    disks.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.name.as_deref().unwrap_or("").cmp(b.name.as_deref().unwrap_or("")))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PreferenceStore};

    struct FixedProbe(mountbar_sys::Result<FsAttributes>);

    impl FsProbe for FixedProbe {
        fn attributes(&self, _mount_point: &Path) -> mountbar_sys::Result<FsAttributes> {
            match &self.0 {
                Ok(attrs) => Ok(*attrs),
                Err(SysError::PermissionDenied(path)) => {
                    Err(SysError::PermissionDenied(path.clone()))
                }
                Err(_) => Err(SysError::OperationFailed("probe".into())),
            }
        }
    }

    fn ok_probe() -> FixedProbe {
        FixedProbe(Ok(FsAttributes {
            total_bytes: 1_000,
            free_bytes: 250,
        }))
    }

    fn prefs() -> PreferenceStore {
        PreferenceStore::load(Box::new(MemoryStore::default()))
    }

    fn raw_volume(name: &str) -> RawVolume {
        RawVolume {
            device_identifier: "disk4s2".into(),
            volume_uuid: Some(format!("{name}-UUID")),
            disk_uuid: Some("DISK-UUID".into()),
            volume_name: Some(name.to_string()),
            content: Some("APFS".into()),
            ..RawVolume::default()
        }
    }

    #[test]
    fn unmounted_volume_has_no_stats() {
        let mut raw = raw_volume("Backup");
        raw.size = Some(100_000);

        let volume = build_volume(&raw, false, &prefs(), &ok_probe()).unwrap();
        assert!(!volume.is_mounted);
        assert!(volume.mount_point.is_none());
        assert!(volume.total_size.is_none());
        assert!(volume.free_space.is_none());
        assert!(volume.used_bytes.is_none());
        assert!(volume.storage_error.is_none());
    }

    #[test]
    fn capacity_in_use_is_preferred_over_statvfs() {
        let mut raw = raw_volume("Media");
        raw.mount_point = Some("/Volumes/Media".into());
        raw.size = Some(1_000);
        raw.capacity_in_use = Some(400);

        // Probe would report 750 used; CapacityInUse must win.
        let volume = build_volume(&raw, false, &prefs(), &ok_probe()).unwrap();
        assert_eq!(volume.used_bytes, Some(400));
        assert_eq!(volume.usage_percentage, Some(0.4));
    }

    #[test]
    fn statvfs_fallback_when_capacity_missing() {
        let mut raw = raw_volume("Games");
        raw.mount_point = Some("/Volumes/Games".into());
        raw.size = Some(1_000);

        let volume = build_volume(&raw, false, &prefs(), &ok_probe()).unwrap();
        assert_eq!(volume.used_bytes, Some(750));
    }

    #[test]
    fn probe_failure_sets_storage_error_without_fabricating_numbers() {
        let mut raw = raw_volume("Locked");
        raw.mount_point = Some("/Volumes/Locked".into());
        raw.size = Some(1_000);

        let probe = FixedProbe(Err(SysError::PermissionDenied("/Volumes/Locked".into())));
        let volume = build_volume(&raw, false, &prefs(), &probe).unwrap();
        assert!(volume.storage_error.is_some());
        assert!(volume.used_bytes.is_none());
        assert!(volume.total_size.is_none());
        assert!(volume.usage_percentage.is_none());
    }

    #[test]
    fn ignored_volume_is_dropped() {
        let mut store = prefs();
        let probe = ok_probe();
        let raw = raw_volume("Secret");

        let built = build_volume(&raw, false, &store, &probe).unwrap();
        store.ignore(&built).unwrap();

        assert!(build_volume(&raw, false, &store, &probe).is_none());
    }

    #[test]
    fn protected_flag_comes_from_the_store() {
        let mut store = prefs();
        let probe = ok_probe();
        let raw = raw_volume("Vault");

        let built = build_volume(&raw, false, &store, &probe).unwrap();
        assert!(!built.is_protected);

        store.protect(&built).unwrap();
        let rebuilt = build_volume(&raw, false, &store, &probe).unwrap();
        assert!(rebuilt.is_protected);
    }

    #[test]
    fn efi_on_virtual_parent_is_system() {
        let mut raw = raw_volume("EFI");
        raw.content = Some("EFI".into());

        let on_virtual = build_volume(&raw, true, &prefs(), &ok_probe()).unwrap();
        assert_eq!(on_virtual.category, VolumeCategory::System);

        let on_physical = build_volume(&raw, false, &prefs(), &ok_probe()).unwrap();
        assert_eq!(on_physical.category, VolumeCategory::User);
    }

    #[test]
    fn child_storage_error_poisons_the_aggregate() {
        let mut healthy = build_volume(
            &{
                let mut raw = raw_volume("A");
                raw.mount_point = Some("/Volumes/A".into());
                raw.size = Some(1_000);
                raw.capacity_in_use = Some(100);
                raw
            },
            false,
            &prefs(),
            &ok_probe(),
        )
        .unwrap();

        let stats = disk_stats(2_000, &[&healthy]);
        assert!(stats.storage_error.is_none());
        assert_eq!(stats.usage_percentage, Some(0.05));

        healthy.storage_error = Some("permission".into());
        let stats = disk_stats(2_000, &[&healthy]);
        assert!(stats.storage_error.is_some());
        assert!(stats.total_size.is_none());
        assert!(stats.usage_percentage.is_none());
    }

    #[test]
    fn free_space_floors_at_zero() {
        let volume = build_volume(
            &{
                let mut raw = raw_volume("A");
                raw.mount_point = Some("/Volumes/A".into());
                raw.size = Some(1_000);
                raw.capacity_in_use = Some(100);
                raw
            },
            false,
            &prefs(),
            &ok_probe(),
        )
        .unwrap();

        // Child claims more used than the stale parent total.
        let stats = disk_stats(50, &[&volume]);
        assert_eq!(stats.free_space.as_deref(), Some("0.00 B"));
        assert_eq!(stats.usage_percentage, Some(1.0));
    }

    #[test]
    fn sort_orders_kind_then_name() {
        fn disk(name: Option<&str>, kind: DiskKind) -> PhysicalDisk {
            PhysicalDisk {
                id: "disk0".into(),
                disk_uuid: None,
                connection_type: "USB".into(),
                name: name.map(str::to_string),
                kind,
                stats: DiskStats::default(),
                partitions: Vec::new(),
                containers: Vec::new(),
            }
        }

        let mut disks = vec![
            disk(Some("Zeta"), DiskKind::Physical),
            disk(Some("Image"), DiskKind::DiskImage),
            disk(None, DiskKind::Physical),
            disk(Some("Macintosh HD"), DiskKind::Internal),
        ];
        sort_disks(&mut disks);

        let order: Vec<(DiskKind, Option<&str>)> = disks
            .iter()
            .map(|d| (d.kind, d.name.as_deref()))
            .collect();
        assert_eq!(
            order,
            vec![
                (DiskKind::Internal, Some("Macintosh HD")),
                (DiskKind::Physical, None),
                (DiskKind::Physical, Some("Zeta")),
                (DiskKind::DiskImage, Some("Image")),
            ]
        );
    }

    #[test]
    fn internal_disks_hidden_unless_opted_in() {
        let raw = RawRootDisk {
            device_identifier: "disk0".into(),
            size: Some(1_000),
            partitions: vec![raw_volume("Macintosh HD")],
            containers: Vec::new(),
        };
        let info = DiskInfo {
            internal: true,
            ..DiskInfo::default()
        };

        let mut store = prefs();
        assert!(build_disk(&raw, Some(info.clone()), &store, &ok_probe()).is_none());

        store.set_show_internal_disks(true).unwrap();
        let disk = build_disk(&raw, Some(info), &store, &ok_probe()).unwrap();
        assert_eq!(disk.kind, DiskKind::Internal);
    }

    #[test]
    fn contentless_disk_is_not_published() {
        let raw = RawRootDisk {
            device_identifier: "disk6".into(),
            size: Some(0),
            partitions: Vec::new(),
            containers: Vec::new(),
        };
        assert!(build_disk(&raw, None, &prefs(), &ok_probe()).is_none());
    }
}
