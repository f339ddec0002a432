// SPDX-License-Identifier: GPL-3.0-only

//! Refresh scheduling
//!
//! One task owns the refresh loop, which gives single-flight execution for
//! free: requests arriving while a cycle is running queue up and are drained
//! to a single follow-up cycle, never unboundedly. OS disk notifications are
//! debounced so a multi-partition eject produces one refresh instead of a
//! burst.
//!
//! A failed cycle is retried once after a fixed delay; if the retry also
//! fails, an empty disk list is published together with a user-visible
//! banner and the state returns to idle. There is no stuck-loading state.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use mountbar_types::{OperationAlert, PhysicalDisk};

use crate::builder::{FsProbe, build_disk, sort_disks};
use crate::diskutil::{DiskutilClient, parse_disk_info, parse_listing};
use crate::error::{EngineError, Result};
use crate::manager::DriveState;
use crate::store::PreferenceStore;

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Startup,
    /// OS mount/unmount notification; debounced
    DiskNotification,
    UserInitiated,
    PostOperation,
}

/// Cheap cloneable handle for requesting refreshes
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::UnboundedSender<RefreshReason>,
}

impl RefreshHandle {
    pub fn request(&self, reason: RefreshReason) {
        // A closed channel means the engine is shutting down; dropping the
        // request is the right behavior then.
        let _ = self.tx.send(reason);
    }
}

pub(crate) struct RefreshWorker {
    pub diskutil: DiskutilClient,
    pub prefs: Arc<RwLock<PreferenceStore>>,
    pub probe: Arc<dyn FsProbe>,
    pub state: watch::Sender<DriveState>,
    pub debounce: Duration,
    pub retry_delay: Duration,
}

pub(crate) fn spawn(worker: RefreshWorker) -> RefreshHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<RefreshReason>();

    tokio::spawn(async move {
        while let Some(reason) = rx.recv().await {
            if reason == RefreshReason::DiskNotification {
                tokio::time::sleep(worker.debounce).await;
            }
            // Coalesce everything that queued up meanwhile into this cycle.
            while rx.try_recv().is_ok() {}

            worker.refresh_cycle().await;
        }
    });

    RefreshHandle { tx }
}

impl RefreshWorker {
    async fn refresh_cycle(&self) {
        self.state.send_modify(|s| s.is_refreshing = true);

        match self.fetch_disks().await {
            Ok(disks) => self.publish(disks),
            Err(first) => {
                warn!("refresh failed, retrying once: {first}");
                tokio::time::sleep(self.retry_delay).await;
                match self.fetch_disks().await {
                    Ok(disks) => self.publish(disks),
                    Err(second) => {
                        warn!("refresh retry failed: {second}");
                        self.publish_failure(&second);
                    }
                }
            }
        }
    }

    async fn fetch_disks(&self) -> Result<Vec<PhysicalDisk>> {
        let listing_xml = self.diskutil.list_raw().await?;
        let roots = parse_listing(&listing_xml)?;

        let mut disks = Vec::new();
        for raw in &roots {
            let info = match self.diskutil.disk_info_raw(&raw.device_identifier).await {
                Ok(xml) => parse_disk_info(&xml),
                Err(e) => {
                    // One disk's metadata failing should not abort the
                    // whole cycle.
                    warn!(disk = %raw.device_identifier, "disk info unavailable: {e}");
                    None
                }
            };

            let built = {
                let prefs = self.prefs.read().unwrap();
                build_disk(raw, info, &prefs, self.probe.as_ref())
            };
            if let Some(disk) = built {
                disks.push(disk);
            }
        }

        sort_disks(&mut disks);
        Ok(disks)
    }

    fn publish(&self, disks: Vec<PhysicalDisk>) {
        info!(count = disks.len(), "publishing refreshed disk list");
        self.state.send_modify(|s| {
            s.disks = disks;
            s.is_refreshing = false;
            s.initial_load_complete = true;
            s.busy_volume = None;
            s.busy_eject = None;
            s.unmounting_all = false;
        });
    }

    fn publish_failure(&self, error: &EngineError) {
        let alert = refresh_failure_alert(error);
        self.state.send_modify(|s| {
            s.disks = Vec::new();
            s.is_refreshing = false;
            s.initial_load_complete = true;
            s.busy_volume = None;
            s.busy_eject = None;
            s.unmounting_all = false;
            s.alert = Some(alert.clone());
        });
    }
}

/// Compose the non-fatal refresh failure banner. Timeouts and permission
/// failures get a Full Disk Access hint; empirically they correlate with
/// missing disk-access entitlements.
pub fn refresh_failure_alert(error: &EngineError) -> OperationAlert {
    let (title, base) = match error {
        EngineError::Data(_) => (
            "Could Not Load Disks",
            "Failed to read the disk list from `diskutil`.",
        ),
        _ => (
            "Command Execution Failed",
            "The `diskutil` command failed to execute. This can happen due to permission issues.",
        ),
    };

    let details = error.to_string();
    let lower = details.to_lowercase();
    let mut message = base.to_string();
    if lower.contains("permission") || lower.contains("timed out") {
        message.push_str(
            "\n\nPlease grant Mountbar 'Full Disk Access' in \
             System Settings > Privacy & Security.",
        );
    }
    message.push_str(&format!("\n\nDetails:\n{details}"));

    OperationAlert::basic(title, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mountbar_sys::SysError;

    #[test]
    fn timeout_banner_carries_permission_hint() {
        let err = EngineError::Command(SysError::Timeout {
            command: "diskutil".into(),
            timeout: Duration::from_secs(6),
        });
        let alert = refresh_failure_alert(&err);
        assert_eq!(alert.title, "Command Execution Failed");
        assert!(alert.message.contains("Full Disk Access"));
    }

    #[test]
    fn parse_failure_banner_has_no_hint() {
        let err = EngineError::Data("AllDisksAndPartitions missing".into());
        let alert = refresh_failure_alert(&err);
        assert_eq!(alert.title, "Could Not Load Disks");
        assert!(!alert.message.contains("Full Disk Access"));
        assert!(alert.message.contains("AllDisksAndPartitions"));
    }
}
