// SPDX-License-Identifier: GPL-3.0-only

//! Drive manager: published state and user-initiated operations
//!
//! One `DriveManager` owns the published [`DriveState`] and executes
//! mount/unmount/eject/unlock against diskutil. State is observed through a
//! `watch` channel, so readers always see a complete snapshot; a refresh
//! replaces the disk list atomically.
//!
//! Concurrent operations against the *same* identifier are soft-prevented
//! only: the busy identifiers published here are meant to disable the
//! corresponding controls, the engine does not hard-lock a second call.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use mountbar_sys::CommandRunner;
use mountbar_types::{DiskKind, OperationAlert, PhysicalDisk, Volume, VolumeCategory};

use crate::automount::{AutoMountDecision, DiskDescription, ManualMountWindow, should_block_mount};
use crate::builder::{FsProbe, SystemFsProbe};
use crate::classifier::{FailureKind, Operation, alert_for, classify};
use crate::diskutil::DiskutilClient;
use crate::scheduler::{self, RefreshHandle, RefreshReason, RefreshWorker};
use crate::store::PreferenceStore;

/// Engine timing knobs. Defaults match the observed production behavior;
/// tests shrink them.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Debounce window for OS mount/unmount notification bursts
    pub refresh_debounce: Duration,

    /// Delay before the single refresh retry
    pub refresh_retry_delay: Duration,

    /// Back-off before the single retry of a transiently failed mount
    pub mount_retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_debounce: Duration::from_millis(500),
            refresh_retry_delay: Duration::from_secs(5),
            mount_retry_backoff: Duration::from_secs(15),
        }
    }
}

/// The published engine state. Replaced atomically; never observed
/// half-updated.
#[derive(Debug, Clone, Default)]
pub struct DriveState {
    pub disks: Vec<PhysicalDisk>,
    pub is_refreshing: bool,
    pub initial_load_complete: bool,

    /// Volume id of an in-flight mount/unmount/unlock
    pub busy_volume: Option<String>,

    /// Disk id of an in-flight eject
    pub busy_eject: Option<String>,

    pub unmounting_all: bool,

    /// Most recent alert for the presentation layer; cleared via
    /// [`DriveManager::clear_alert`]
    pub alert: Option<OperationAlert>,
}

pub struct DriveManager {
    diskutil: DiskutilClient,
    prefs: Arc<RwLock<PreferenceStore>>,
    window: Arc<ManualMountWindow>,
    state: watch::Sender<DriveState>,
    refresh: RefreshHandle,
    config: EngineConfig,
}

impl DriveManager {
    pub fn spawn(
        shell: Arc<dyn CommandRunner>,
        prefs: PreferenceStore,
        config: EngineConfig,
    ) -> Arc<Self> {
        Self::spawn_with_probe(shell, prefs, config, Arc::new(SystemFsProbe))
    }

    pub fn spawn_with_probe(
        shell: Arc<dyn CommandRunner>,
        prefs: PreferenceStore,
        config: EngineConfig,
        probe: Arc<dyn FsProbe>,
    ) -> Arc<Self> {
        let diskutil = DiskutilClient::new(shell);
        let prefs = Arc::new(RwLock::new(prefs));
        let (state, _) = watch::channel(DriveState::default());

        let refresh = scheduler::spawn(RefreshWorker {
            diskutil: diskutil.clone(),
            prefs: prefs.clone(),
            probe,
            state: state.clone(),
            debounce: config.refresh_debounce,
            retry_delay: config.refresh_retry_delay,
        });

        Arc::new(Self {
            diskutil,
            prefs,
            window: Arc::new(ManualMountWindow::new()),
            state,
            refresh,
            config,
        })
    }

    /// Observe the published state
    pub fn subscribe(&self) -> watch::Receiver<DriveState> {
        self.state.subscribe()
    }

    pub fn refresh(&self, reason: RefreshReason) {
        self.refresh.request(reason);
    }

    pub fn prefs(&self) -> &Arc<RwLock<PreferenceStore>> {
        &self.prefs
    }

    pub fn mount_window(&self) -> &Arc<ManualMountWindow> {
        &self.window
    }

    pub fn clear_alert(&self) {
        self.state.send_modify(|s| s.alert = None);
    }

    /// Decision for the OS auto-mount approval hook
    pub fn should_block_auto_mount(&self, description: &DiskDescription) -> AutoMountDecision {
        let (block_usb, blocked) = {
            let prefs = self.prefs.read().unwrap();
            (prefs.block_usb_auto_mount(), prefs.blocked_composite_ids())
        };
        should_block_mount(description, &self.window, block_usb, &blocked)
    }

    // === Operations ===

    pub async fn mount(&self, volume: &Volume) {
        // Whitelist the impending mount so the approval hook does not
        // dissent the action the user just took.
        self.window.note(&volume.device_identifier);
        self.set_busy_volume(Some(volume.id.clone()));

        match self.diskutil.mount(&volume.device_identifier).await {
            Ok(output) => {
                if let Some(stderr) = output.failure() {
                    let kind = classify(Operation::Mount, &volume.name, stderr);
                    if kind == FailureKind::Other && is_transient_mount_failure(stderr) {
                        // The volume may have been enumerated before the OS
                        // settled it; retry once after a back-off.
                        info!(volume = %volume.name, "transient mount failure, retrying");
                        tokio::time::sleep(self.config.mount_retry_backoff).await;
                        self.window.note(&volume.device_identifier);
                        match self.diskutil.mount(&volume.device_identifier).await {
                            Ok(second) => {
                                if let Some(stderr) = second.failure() {
                                    self.publish_failure(Operation::Mount, &volume.name, stderr);
                                }
                            }
                            Err(e) => self.publish_command_error(Operation::Mount, &e),
                        }
                    } else {
                        self.publish_failure(Operation::Mount, &volume.name, stderr);
                    }
                }
            }
            Err(e) => self.publish_command_error(Operation::Mount, &e),
        }

        self.set_busy_volume(None);
        self.refresh.request(RefreshReason::PostOperation);
    }

    /// Unlock-and-mount an encrypted APFS volume. The passphrase travels
    /// over stdin only.
    pub async fn mount_locked(&self, volume: &Volume, passphrase: &str) {
        self.window.note(&volume.id);
        self.set_busy_volume(Some(volume.id.clone()));

        match self.diskutil.unlock(&volume.id, passphrase).await {
            Ok(output) => {
                if let Some(stderr) = output.failure() {
                    self.publish_failure(Operation::Mount, &volume.name, stderr);
                }
            }
            Err(e) => self.publish_command_error(Operation::Mount, &e),
        }

        self.set_busy_volume(None);
        self.refresh.request(RefreshReason::PostOperation);
    }

    pub async fn unmount(&self, volume: &Volume) {
        self.set_busy_volume(Some(volume.id.clone()));

        match self.diskutil.unmount(&volume.device_identifier).await {
            Ok(output) => {
                if let Some(stderr) = output.failure() {
                    self.publish_failure(Operation::Unmount, &volume.name, stderr);
                }
            }
            Err(e) => self.publish_command_error(Operation::Unmount, &e),
        }

        self.set_busy_volume(None);
        self.refresh.request(RefreshReason::PostOperation);
    }

    pub async fn eject(&self, disk: &PhysicalDisk, force: bool) {
        self.state
            .send_modify(|s| s.busy_eject = Some(disk.id.clone()));

        let name = disk.name.clone().unwrap_or_else(|| disk.id.clone());
        match self.diskutil.eject(&disk.id, force).await {
            Ok(output) => {
                if let Some(stderr) = output.failure() {
                    self.publish_failure(Operation::Eject, &name, stderr);
                }
            }
            Err(e) => self.publish_command_error(Operation::Eject, &e),
        }

        self.state.send_modify(|s| s.busy_eject = None);
        self.refresh.request(RefreshReason::PostOperation);
    }

    /// Unmount every mounted, user-category, unprotected volume on every
    /// non-internal disk. Commands are issued sequentially; parallel
    /// unmounts contend on the OS mount-table locks.
    pub async fn unmount_all(&self) {
        let targets: Vec<Volume> = {
            let state = self.state.borrow();
            bulk_unmount_targets(&state.disks)
                .into_iter()
                .cloned()
                .collect()
        };
        if targets.is_empty() {
            return;
        }

        self.state.send_modify(|s| s.unmounting_all = true);

        for volume in &targets {
            if let Err(e) = self.diskutil.unmount(&volume.device_identifier).await {
                warn!(volume = %volume.name, "bulk unmount failed: {e}");
            }
        }

        self.refresh.request(RefreshReason::PostOperation);
    }

    // === Helpers ===

    fn set_busy_volume(&self, id: Option<String>) {
        self.state.send_modify(|s| s.busy_volume = id);
    }

    fn publish_failure(&self, operation: Operation, name: &str, stderr: &str) {
        let kind = classify(operation, name, stderr);
        let alert = alert_for(kind, operation, name, stderr);
        warn!(%name, ?kind, "operation failed");
        self.state.send_modify(|s| s.alert = Some(alert));
    }

    fn publish_command_error(&self, operation: Operation, error: &crate::error::EngineError) {
        let details = error.to_string();
        let mut message = format!("The diskutil command could not be run.\n\nDetails:\n{details}");
        if details.to_lowercase().contains("timed out") {
            message.push_str(
                "\n\nPlease grant Mountbar 'Full Disk Access' in \
                 System Settings > Privacy & Security.",
            );
        }
        let title = match operation {
            Operation::Mount => "Mount Failed",
            Operation::Unmount => "Unmount Failed",
            Operation::Eject => "Eject Failed",
        };
        self.state
            .send_modify(|s| s.alert = Some(OperationAlert::basic(title, message)));
    }
}

/// Select the bulk-unmount targets: mounted, user-category, unprotected
/// volumes on non-internal disks. Protection categorically excludes a
/// volume here; that is the primary purpose of the protected set.
pub fn bulk_unmount_targets(disks: &[PhysicalDisk]) -> Vec<&Volume> {
    disks
        .iter()
        .filter(|disk| disk.kind != DiskKind::Internal)
        .flat_map(|disk| disk.all_volumes())
        .filter(|v| v.is_mounted && v.category == VolumeCategory::User && !v.is_protected)
        .collect()
}

fn is_transient_mount_failure(stderr: &str) -> bool {
    stderr.to_lowercase().contains("failed to mount")
}
