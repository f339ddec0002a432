// SPDX-License-Identifier: GPL-3.0-only

//! Identity & preference store
//!
//! Three independent durable sets (ignored, protected, blocked) of
//! [`ManagedVolumeInfo`], the network-share list, and a couple of scalar
//! flags. Everything is keyed by the `diskUUID-volumeUUID` composite;
//! device identifiers never reach persistence because they do not survive
//! re-enumeration.
//!
//! Loading a corrupt set degrades to an empty one: losing a preference list
//! is preferable to failing startup.

use std::fs;
use std::path::PathBuf;

use tracing::warn;
use uuid::Uuid;

use mountbar_types::{ManagedVolumeInfo, NetworkShare, PhysicalDisk, Volume};

use crate::error::{EngineError, Result};

const PROTECTED_KEY: &str = "protected_volumes_v4";
const IGNORED_KEY: &str = "ignored_volumes_v4";
const BLOCKED_KEY: &str = "blocked_volumes_v4";
const SHARES_KEY: &str = "network_shares_v1";
const SHOW_INTERNAL_KEY: &str = "show_internal_disks";
const BLOCK_USB_KEY: &str = "block_usb_auto_mount";

/// Durable key-value storage seam
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]) -> std::io::Result<()>;
}

/// One JSON file per key under a directory
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.dir.join(format!("{key}.json"))).ok()
    }

    fn set(&self, key: &str, value: &[u8]) -> std::io::Result<()> {
        fs::write(self.dir.join(format!("{key}.json")), value)
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) -> std::io::Result<()> {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// The reconciliation engine's view of everything the user has persisted
pub struct PreferenceStore {
    backing: Box<dyn KeyValueStore>,
    protected: Vec<ManagedVolumeInfo>,
    ignored: Vec<ManagedVolumeInfo>,
    blocked: Vec<ManagedVolumeInfo>,
    shares: Vec<NetworkShare>,
    show_internal_disks: bool,
    block_usb_auto_mount: bool,
}

impl PreferenceStore {
    pub fn load(backing: Box<dyn KeyValueStore>) -> Self {
        let protected = load_list(backing.as_ref(), PROTECTED_KEY);
        let ignored = load_list(backing.as_ref(), IGNORED_KEY);
        let blocked = load_list(backing.as_ref(), BLOCKED_KEY);
        let shares = load_list(backing.as_ref(), SHARES_KEY);
        let show_internal_disks = load_flag(backing.as_ref(), SHOW_INTERNAL_KEY);
        let block_usb_auto_mount = load_flag(backing.as_ref(), BLOCK_USB_KEY);

        Self {
            backing,
            protected,
            ignored,
            blocked,
            shares,
            show_internal_disks,
            block_usb_auto_mount,
        }
    }

    // === Volume set mutations ===

    pub fn protect(&mut self, volume: &Volume) -> Result<()> {
        let info = managed_info(volume)?;
        Self::insert_unique(&mut self.protected, info);
        self.save_list(PROTECTED_KEY, &self.protected)
    }

    pub fn unprotect(&mut self, info: &ManagedVolumeInfo) -> Result<()> {
        let id = info.composite_id();
        self.protected.retain(|i| i.composite_id() != id);
        self.save_list(PROTECTED_KEY, &self.protected)
    }

    pub fn ignore(&mut self, volume: &Volume) -> Result<()> {
        let info = managed_info(volume)?;
        Self::insert_unique(&mut self.ignored, info);
        self.save_list(IGNORED_KEY, &self.ignored)
    }

    /// Bulk-ignore every constituent volume of a disk. Volumes without a
    /// disk UUID cannot be tracked and are skipped rather than failing the
    /// whole bulk action.
    pub fn ignore_disk(&mut self, disk: &PhysicalDisk) -> Result<()> {
        for volume in disk.all_volumes() {
            if let Ok(info) = managed_info(volume) {
                Self::insert_unique(&mut self.ignored, info);
            }
        }
        self.save_list(IGNORED_KEY, &self.ignored)
    }

    pub fn unignore(&mut self, info: &ManagedVolumeInfo) -> Result<()> {
        let id = info.composite_id();
        self.ignored.retain(|i| i.composite_id() != id);
        self.save_list(IGNORED_KEY, &self.ignored)
    }

    pub fn block(&mut self, volume: &Volume) -> Result<()> {
        let info = managed_info(volume)?;
        Self::insert_unique(&mut self.blocked, info);
        self.save_list(BLOCKED_KEY, &self.blocked)
    }

    pub fn unblock(&mut self, info: &ManagedVolumeInfo) -> Result<()> {
        let id = info.composite_id();
        self.blocked.retain(|i| i.composite_id() != id);
        self.save_list(BLOCKED_KEY, &self.blocked)
    }

    // === Membership queries ===

    pub fn is_volume_protected(&self, volume: &Volume) -> bool {
        Self::contains(&self.protected, volume)
    }

    pub fn is_volume_ignored(&self, volume: &Volume) -> bool {
        Self::contains(&self.ignored, volume)
    }

    pub fn is_volume_blocked(&self, volume: &Volume) -> bool {
        Self::contains(&self.blocked, volume)
    }

    /// Membership test by a precomputed `diskUUID-volumeUUID` composite,
    /// for callers that have not built a full `Volume` yet.
    pub fn is_composite_protected(&self, composite: &str) -> bool {
        self.protected.iter().any(|i| i.composite_id() == composite)
    }

    pub fn is_composite_ignored(&self, composite: &str) -> bool {
        self.ignored.iter().any(|i| i.composite_id() == composite)
    }

    pub fn protected_volumes(&self) -> &[ManagedVolumeInfo] {
        &self.protected
    }

    pub fn ignored_volumes(&self) -> &[ManagedVolumeInfo] {
        &self.ignored
    }

    pub fn blocked_volumes(&self) -> &[ManagedVolumeInfo] {
        &self.blocked
    }

    /// Composite ids of the blocked set, snapshotted for the auto-mount
    /// approval hook which runs off the state-owner task.
    pub fn blocked_composite_ids(&self) -> Vec<String> {
        self.blocked.iter().map(|i| i.composite_id()).collect()
    }

    // === Network shares ===

    pub fn shares(&self) -> &[NetworkShare] {
        &self.shares
    }

    pub fn share(&self, id: Uuid) -> Option<&NetworkShare> {
        self.shares.iter().find(|s| s.id == id)
    }

    pub fn upsert_share(&mut self, share: NetworkShare) -> Result<()> {
        match self.shares.iter_mut().find(|s| s.id == share.id) {
            Some(existing) => *existing = share,
            None => self.shares.push(share),
        }
        self.save_list(SHARES_KEY, &self.shares)
    }

    pub fn delete_share(&mut self, id: Uuid) -> Result<()> {
        self.shares.retain(|s| s.id != id);
        self.save_list(SHARES_KEY, &self.shares)
    }

    // === Flags ===

    pub fn show_internal_disks(&self) -> bool {
        self.show_internal_disks
    }

    pub fn set_show_internal_disks(&mut self, value: bool) -> Result<()> {
        self.show_internal_disks = value;
        self.save_flag(SHOW_INTERNAL_KEY, value)
    }

    pub fn block_usb_auto_mount(&self) -> bool {
        self.block_usb_auto_mount
    }

    pub fn set_block_usb_auto_mount(&mut self, value: bool) -> Result<()> {
        self.block_usb_auto_mount = value;
        self.save_flag(BLOCK_USB_KEY, value)
    }

    // === Helpers ===

    fn contains(list: &[ManagedVolumeInfo], volume: &Volume) -> bool {
        // A volume without a disk UUID can never match a persisted entry.
        let Some(composite) = volume.composite_id() else {
            return false;
        };
        list.iter().any(|info| info.composite_id() == composite)
    }

    fn insert_unique(list: &mut Vec<ManagedVolumeInfo>, info: ManagedVolumeInfo) {
        let id = info.composite_id();
        if !list.iter().any(|existing| existing.composite_id() == id) {
            list.push(info);
        }
    }

    fn save_list<T: serde::Serialize>(&self, key: &str, list: &[T]) -> Result<()> {
        let bytes = serde_json::to_vec(list)?;
        self.backing.set(key, &bytes).map_err(EngineError::Io)
    }

    fn save_flag(&self, key: &str, value: bool) -> Result<()> {
        let bytes = serde_json::to_vec(&value)?;
        self.backing.set(key, &bytes).map_err(EngineError::Io)
    }
}

fn managed_info(volume: &Volume) -> Result<ManagedVolumeInfo> {
    let disk_uuid = volume
        .disk_uuid
        .clone()
        .ok_or_else(|| EngineError::MissingIdentity {
            name: volume.name.clone(),
        })?;
    Ok(ManagedVolumeInfo {
        volume_uuid: volume.id.clone(),
        disk_uuid,
        name: volume.name.clone(),
    })
}

fn load_list<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Vec<T> {
    let Some(bytes) = store.get(key) else {
        return Vec::new();
    };
    match serde_json::from_slice(&bytes) {
        Ok(list) => list,
        Err(e) => {
            warn!(key, "discarding corrupt preference list: {e}");
            Vec::new()
        }
    }
}

fn load_flag(store: &dyn KeyValueStore, key: &str) -> bool {
    store
        .get(key)
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mountbar_types::VolumeCategory;

    fn volume(disk_uuid: Option<&str>, id: &str) -> Volume {
        Volume {
            id: id.to_string(),
            device_identifier: "disk4s2".into(),
            disk_uuid: disk_uuid.map(str::to_string),
            name: "Backup".into(),
            is_mounted: false,
            mount_point: None,
            file_system_type: None,
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

    fn store() -> PreferenceStore {
        PreferenceStore::load(Box::new(MemoryStore::default()))
    }

    #[test]
    fn protect_is_idempotent() {
        let mut prefs = store();
        let v = volume(Some("DISK-1"), "VOL-1");
        prefs.protect(&v).unwrap();
        prefs.protect(&v).unwrap();
        assert_eq!(prefs.protected_volumes().len(), 1);
        assert!(prefs.is_volume_protected(&v));
    }

    #[test]
    fn protect_requires_disk_uuid() {
        let mut prefs = store();
        let v = volume(None, "VOL-1");
        assert!(matches!(
            prefs.protect(&v),
            Err(EngineError::MissingIdentity { .. })
        ));
        assert!(!prefs.is_volume_protected(&v));
    }

    #[test]
    fn ignore_disk_skips_untrackable_volumes() {
        use mountbar_types::{DiskKind, DiskStats};

        let mut prefs = store();
        let disk = PhysicalDisk {
            id: "disk4".into(),
            disk_uuid: Some("DISK-1".into()),
            connection_type: "USB".into(),
            name: Some("T7".into()),
            kind: DiskKind::Physical,
            stats: DiskStats::default(),
            partitions: vec![volume(Some("DISK-1"), "VOL-1"), volume(None, "VOL-2")],
            containers: Vec::new(),
        };

        prefs.ignore_disk(&disk).unwrap();

        // The UUID-less volume is skipped, not an error for the bulk action.
        assert_eq!(prefs.ignored_volumes().len(), 1);
        assert_eq!(prefs.ignored_volumes()[0].volume_uuid, "VOL-1");
    }

    #[test]
    fn membership_round_trips_through_reload() {
        let backing = std::sync::Arc::new(MemoryStore::default());

        struct Shared(std::sync::Arc<MemoryStore>);
        impl KeyValueStore for Shared {
            fn get(&self, key: &str) -> Option<Vec<u8>> {
                self.0.get(key)
            }
            fn set(&self, key: &str, value: &[u8]) -> std::io::Result<()> {
                self.0.set(key, value)
            }
        }

        let v = volume(Some("DISK-1"), "VOL-1");
        {
            let mut prefs = PreferenceStore::load(Box::new(Shared(backing.clone())));
            prefs.protect(&v).unwrap();
        }

        let mut reloaded = PreferenceStore::load(Box::new(Shared(backing)));
        assert!(reloaded.is_volume_protected(&v));

        let info = reloaded.protected_volumes()[0].clone();
        reloaded.unprotect(&info).unwrap();
        assert!(!reloaded.is_volume_protected(&v));
    }

    #[test]
    fn corrupt_list_degrades_to_empty() {
        let backing = MemoryStore::default();
        backing.set(PROTECTED_KEY, b"{{{ not json").unwrap();
        let prefs = PreferenceStore::load(Box::new(backing));
        assert!(prefs.protected_volumes().is_empty());
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let v = volume(Some("DISK-1"), "VOL-1");
        {
            let mut prefs =
                PreferenceStore::load(Box::new(FileStore::new(dir.path()).unwrap()));
            prefs.ignore(&v).unwrap();
            prefs.set_show_internal_disks(true).unwrap();
        }
        let prefs = PreferenceStore::load(Box::new(FileStore::new(dir.path()).unwrap()));
        assert!(prefs.is_volume_ignored(&v));
        assert!(prefs.show_internal_disks());
    }
}
