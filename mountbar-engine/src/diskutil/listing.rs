// SPDX-License-Identifier: GPL-3.0-only

//! Parser for `diskutil list -plist` output
//!
//! The listing is a nested plist keyed by `AllDisksAndPartitions`. Entries
//! there mix three shapes that are not deterministically distinguishable by
//! their own fields alone:
//!
//! - plain root disks with a `Partitions` list
//! - APFS physical stores (appear as an `Apple_APFS` partition of a root
//!   disk *and* are referenced by a synthesized container's
//!   `APFSPhysicalStores`)
//! - synthesized APFS containers, top-level entries carrying `APFSVolumes`
//!
//! Root-disk detection is therefore two-pass: collect every identifier that
//! appears as somebody's partition, then treat any top-level entry not in
//! that set as a root.

use plist::{Dictionary, Value};

use crate::error::{EngineError, Result};

/// A mounted APFS snapshot as reported in `MountedSnapshots`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshot {
    pub uuid: String,
    pub name: String,
}

/// One volume record as it appears in the listing, untyped fields resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawVolume {
    pub device_identifier: String,
    pub volume_uuid: Option<String>,
    pub disk_uuid: Option<String>,
    pub volume_name: Option<String>,
    pub content: Option<String>,
    pub filesystem_name: Option<String>,
    pub mount_point: Option<String>,
    pub size: Option<u64>,
    pub capacity_in_use: Option<u64>,
    pub snapshots: Vec<RawSnapshot>,
}

/// A resolved APFS container: its synthesized disk id plus member volumes
#[derive(Debug, Clone, PartialEq)]
pub struct RawContainer {
    pub id: String,
    pub volumes: Vec<RawVolume>,
}

/// A root disk with its direct partitions and resolved containers
#[derive(Debug, Clone, PartialEq)]
pub struct RawRootDisk {
    pub device_identifier: String,
    pub size: Option<u64>,
    pub partitions: Vec<RawVolume>,
    pub containers: Vec<RawContainer>,
}

/// Parse the full listing into root disks.
///
/// Entries that fail to produce a single valid volume (e.g. an empty card
/// reader slot) still appear here with no content; the model builder filters
/// them before publication.
pub fn parse_listing(xml: &str) -> Result<Vec<RawRootDisk>> {
    let root = Value::from_reader_xml(xml.as_bytes())
        .map_err(|e| EngineError::Data(format!("failed to parse diskutil listing: {e}")))?;

    let root = root
        .as_dictionary()
        .ok_or_else(|| EngineError::Data("listing root is not a dictionary".to_string()))?;

    let all_disks = root
        .get("AllDisksAndPartitions")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Data("AllDisksAndPartitions missing".to_string()))?;

    let entries: Vec<&Dictionary> = all_disks.iter().filter_map(Value::as_dictionary).collect();

    // Pass 1: every identifier that is a partition of some other disk.
    let mut child_ids: Vec<&str> = Vec::new();
    for entry in &entries {
        for partition in dict_array(entry, "Partitions") {
            if let Some(id) = str_field(partition, "DeviceIdentifier") {
                child_ids.push(id);
            }
        }
    }

    // Pass 2: a root disk is any top-level entry that is nobody's partition.
    let mut roots = Vec::new();
    for entry in &entries {
        let Some(identifier) = str_field(entry, "DeviceIdentifier") else {
            continue;
        };
        if child_ids.contains(&identifier) {
            continue;
        }

        let mut partitions = Vec::new();
        let mut containers = Vec::new();

        if entry.get("Partitions").is_some() {
            for partition in dict_array(entry, "Partitions") {
                if str_field(partition, "Content") == Some("Apple_APFS") {
                    // A container pointer, not a volume: resolve it through
                    // the synthesized disk whose physical store references
                    // this partition's identifier.
                    let Some(store_id) = str_field(partition, "DeviceIdentifier") else {
                        continue;
                    };
                    if let Some(container) = find_container_for_store(store_id, &entries) {
                        containers.push(container);
                    }
                } else if let Some(volume) = parse_volume(partition) {
                    partitions.push(volume);
                }
            }
        } else if entry.get("APFSVolumes").is_some() {
            // Whole-disk APFS container with no partition table of its own.
            containers.push(parse_container(entry, identifier));
        }

        roots.push(RawRootDisk {
            device_identifier: identifier.to_string(),
            size: u64_field(entry, "Size"),
            partitions,
            containers,
        });
    }

    Ok(roots)
}

fn find_container_for_store(store_id: &str, entries: &[&Dictionary]) -> Option<RawContainer> {
    let container_entry = entries.iter().find(|entry| {
        dict_array(entry, "APFSPhysicalStores")
            .first()
            .and_then(|store| str_field(store, "DeviceIdentifier"))
            == Some(store_id)
    })?;

    let id = str_field(container_entry, "DeviceIdentifier")?;
    Some(parse_container(container_entry, id))
}

fn parse_container(entry: &Dictionary, id: &str) -> RawContainer {
    let volumes = dict_array(entry, "APFSVolumes")
        .into_iter()
        .filter_map(parse_volume)
        .collect();
    RawContainer {
        id: id.to_string(),
        volumes,
    }
}

fn parse_volume(entry: &Dictionary) -> Option<RawVolume> {
    // Without a device identifier there is nothing to issue commands
    // against; the record is unusable.
    let device_identifier = str_field(entry, "DeviceIdentifier")?;

    let snapshots = dict_array(entry, "MountedSnapshots")
        .into_iter()
        .filter_map(|snapshot| {
            Some(RawSnapshot {
                uuid: str_field(snapshot, "SnapshotUUID")?.to_string(),
                name: str_field(snapshot, "SnapshotName")?.to_string(),
            })
        })
        .collect();

    Some(RawVolume {
        device_identifier: device_identifier.to_string(),
        volume_uuid: str_field(entry, "VolumeUUID").map(str::to_string),
        disk_uuid: str_field(entry, "DiskUUID").map(str::to_string),
        volume_name: str_field(entry, "VolumeName").map(str::to_string),
        content: str_field(entry, "Content").map(str::to_string),
        filesystem_name: str_field(entry, "FilesystemName").map(str::to_string),
        mount_point: str_field(entry, "MountPoint").map(str::to_string),
        size: u64_field(entry, "Size"),
        capacity_in_use: u64_field(entry, "CapacityInUse"),
        snapshots,
    })
}

fn str_field<'a>(dict: &'a Dictionary, key: &str) -> Option<&'a str> {
    dict.get(key).and_then(Value::as_string)
}

fn u64_field(dict: &Dictionary, key: &str) -> Option<u64> {
    dict.get(key).and_then(Value::as_unsigned_integer)
}

fn dict_array<'a>(dict: &'a Dictionary, key: &str) -> Vec<&'a Dictionary> {
    dict.get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_dictionary).collect())
        .unwrap_or_default()
}

/// External USB disk (disk4) with an EFI partition, an NTFS partition
/// and an APFS physical store; synthesized container disk5 with two
/// volumes; empty card-reader slot disk6.
#[cfg(test)]
pub(crate) const LISTING_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>AllDisksAndPartitions</key>
    <array>
        <dict>
            <key>DeviceIdentifier</key><string>disk4</string>
            <key>Size</key><integer>512000000000</integer>
            <key>Partitions</key>
            <array>
                <dict>
                    <key>DeviceIdentifier</key><string>disk4s1</string>
                    <key>Content</key><string>EFI</string>
                    <key>VolumeName</key><string>EFI</string>
                    <key>DiskUUID</key><string>DISK-UUID-4</string>
                    <key>VolumeUUID</key><string>EFI-UUID</string>
                    <key>Size</key><integer>209715200</integer>
                </dict>
                <dict>
                    <key>DeviceIdentifier</key><string>disk4s2</string>
                    <key>Content</key><string>Apple_APFS</string>
                    <key>Size</key><integer>400000000000</integer>
                </dict>
                <dict>
                    <key>DeviceIdentifier</key><string>disk4s3</string>
                    <key>Content</key><string>Windows_NTFS</string>
                    <key>VolumeName</key><string>Games</string>
                    <key>DiskUUID</key><string>DISK-UUID-4</string>
                    <key>VolumeUUID</key><string>NTFS-UUID</string>
                    <key>MountPoint</key><string>/Volumes/Games</string>
                    <key>Size</key><integer>111000000000</integer>
                </dict>
            </array>
        </dict>
        <dict>
            <key>DeviceIdentifier</key><string>disk5</string>
            <key>Size</key><integer>400000000000</integer>
            <key>Partitions</key>
            <array/>
            <key>APFSPhysicalStores</key>
            <array>
                <dict>
                    <key>DeviceIdentifier</key><string>disk4s2</string>
                </dict>
            </array>
            <key>APFSVolumes</key>
            <array>
                <dict>
                    <key>DeviceIdentifier</key><string>disk5s1</string>
                    <key>Content</key><string>APFS</string>
                    <key>VolumeName</key><string>Media</string>
                    <key>DiskUUID</key><string>DISK-UUID-4</string>
                    <key>VolumeUUID</key><string>MEDIA-UUID</string>
                    <key>MountPoint</key><string>/Volumes/Media</string>
                    <key>Size</key><integer>400000000000</integer>
                    <key>CapacityInUse</key><integer>120000000000</integer>
                    <key>MountedSnapshots</key>
                    <array>
                        <dict>
                            <key>SnapshotUUID</key><string>SNAP-UUID-1</string>
                            <key>SnapshotName</key><string>com.apple.TimeMachine.2024-01-01</string>
                        </dict>
                    </array>
                </dict>
                <dict>
                    <key>DeviceIdentifier</key><string>disk5s2</string>
                    <key>Content</key><string>APFS</string>
                    <key>VolumeName</key><string>Vault</string>
                    <key>DiskUUID</key><string>DISK-UUID-4</string>
                    <key>VolumeUUID</key><string>VAULT-UUID</string>
                    <key>Size</key><integer>400000000000</integer>
                </dict>
            </array>
        </dict>
        <dict>
            <key>DeviceIdentifier</key><string>disk6</string>
            <key>Size</key><integer>0</integer>
            <key>Partitions</key>
            <array/>
        </dict>
    </array>
</dict>
</plist>
"#;
