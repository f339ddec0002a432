// SPDX-License-Identifier: GPL-3.0-only

//! Persisted identity records for ignored/protected/blocked volumes

use serde::{Deserialize, Serialize};

/// Durable record identifying one volume across reboots.
///
/// Device identifiers are reassigned on every re-enumeration, so persisted
/// state is keyed by the `diskUUID-volumeUUID` composite instead. Created and
/// removed only by explicit user action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedVolumeInfo {
    /// Persistent volume UUID (device identifier fallback for UUID-less
    /// filesystems)
    pub volume_uuid: String,

    /// Persistent UUID of the owning disk
    pub disk_uuid: String,

    /// Last-known display name. Stale snapshot for display only; never used
    /// for identity matching.
    pub name: String,
}

impl ManagedVolumeInfo {
    /// Composite identity used for set membership
    pub fn composite_id(&self) -> String {
        format!("{}-{}", self.disk_uuid, self.volume_uuid)
    }
}
