// SPDX-License-Identifier: GPL-3.0-only

//! Physical disk, APFS container and snapshot models

use serde::{Deserialize, Serialize};

use crate::volume::Volume;

/// How a root disk is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiskKind {
    /// Built-in storage; hidden unless the user opts in
    Internal,
    /// External physical media
    Physical,
    /// Virtual media backed by a mounted disk image
    DiskImage,
}

/// A mounted APFS snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApfsSnapshot {
    /// Snapshot UUID
    pub id: String,

    /// Snapshot name
    pub name: String,
}

/// Groups sibling APFS volumes that share one physical store.
///
/// Ephemeral: reconstructed on every refresh, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApfsContainer {
    /// Container device identifier (e.g. "disk5")
    pub id: String,

    /// Volumes inside the container, in discovery order
    pub volumes: Vec<Volume>,
}

/// Aggregate storage statistics for a parent disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub total_size: Option<String>,
    pub free_space: Option<String>,
    pub used_space: Option<String>,
    pub usage_percentage: Option<f64>,

    /// Set instead of the numbers above when any constituent volume failed
    /// to report its own statistics
    pub storage_error: Option<String>,
}

/// A root storage device: not itself a partition of anything else
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalDisk {
    /// Device identifier of the root disk (e.g. "disk4"). Stable for the
    /// session, not across reboots.
    pub id: String,

    /// Persistent disk UUID, if available
    pub disk_uuid: Option<String>,

    /// Bus protocol string (e.g. "USB", "Thunderbolt") or "Disk Image"
    pub connection_type: String,

    /// Display name from the IO registry or media name
    pub name: Option<String>,

    /// Attachment classification
    pub kind: DiskKind,

    /// Aggregate statistics across all constituent volumes
    pub stats: DiskStats,

    /// Direct non-APFS volumes
    pub partitions: Vec<Volume>,

    /// APFS containers found under this disk
    pub containers: Vec<ApfsContainer>,
}

impl PhysicalDisk {
    /// A disk with no partitions and no non-empty containers is not shown.
    pub fn has_visible_content(&self) -> bool {
        !self.partitions.is_empty() || self.containers.iter().any(|c| !c.volumes.is_empty())
    }

    /// Every constituent volume, across direct partitions and containers.
    pub fn all_volumes(&self) -> impl Iterator<Item = &Volume> {
        self.partitions
            .iter()
            .chain(self.containers.iter().flat_map(|c| c.volumes.iter()))
    }
}
