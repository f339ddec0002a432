// SPDX-License-Identifier: GPL-3.0-only

//! Auto-mount approval coordination
//!
//! The OS invokes a mount-approval callback on an arbitrary thread for every
//! disk insertion. Two pieces cooperate here:
//!
//! - [`ManualMountWindow`]: a thread-safe single-entry cache recording the
//!   device identifier the user just asked to mount, valid for ~3 seconds.
//!   Written immediately before issuing a manual mount/unlock command so the
//!   approval hook does not reject the mount the user explicitly requested.
//! - [`should_block_mount`]: the pure approval decision, combining the
//!   window, the global block-USB flag and the blocked volume set.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a pending manual mount stays whitelisted
pub const APPROVAL_WINDOW: Duration = Duration::from_secs(3);

/// Single-entry whitelist of the impending manual mount
#[derive(Debug)]
pub struct ManualMountWindow {
    window: Duration,
    entry: Mutex<Option<(String, Instant)>>,
}

impl Default for ManualMountWindow {
    fn default() -> Self {
        Self::with_window(APPROVAL_WINDOW)
    }
}

impl ManualMountWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            entry: Mutex::new(None),
        }
    }

    /// Record that `device_identifier` is about to be mounted manually.
    /// Replaces any previous entry.
    pub fn note(&self, device_identifier: &str) {
        let mut entry = self.entry.lock().unwrap();
        *entry = Some((device_identifier.to_string(), Instant::now() + self.window));
    }

    /// Whether a manual mount of `device_identifier` is currently pending.
    pub fn is_pending(&self, device_identifier: &str) -> bool {
        let mut entry = self.entry.lock().unwrap();
        match entry.as_ref() {
            Some((id, expiry)) if id == device_identifier => {
                if Instant::now() <= *expiry {
                    true
                } else {
                    *entry = None;
                    false
                }
            }
            _ => false,
        }
    }
}

/// What the approval hook knows about the disk being inserted
#[derive(Debug, Clone, Default)]
pub struct DiskDescription {
    pub device_identifier: Option<String>,
    pub device_model: Option<String>,
    pub device_protocol: Option<String>,
    pub volume_uuid: Option<String>,
    pub disk_uuid: Option<String>,
}

/// Outcome of the approval decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoMountDecision {
    Approve,
    Block,
}

/// Decide whether an OS auto-mount should be dissented.
///
/// Pending manual mounts and disk images are always approved. Otherwise a
/// mount is blocked when the global USB block is on and the disk is USB, or
/// when the volume's composite id is in the blocked set.
pub fn should_block_mount(
    description: &DiskDescription,
    window: &ManualMountWindow,
    block_usb_auto_mount: bool,
    blocked_composite_ids: &[String],
) -> AutoMountDecision {
    if let Some(id) = description.device_identifier.as_deref() {
        if window.is_pending(id) {
            return AutoMountDecision::Approve;
        }
    }

    if description.device_model.as_deref() == Some("Disk Image") {
        return AutoMountDecision::Approve;
    }

    if block_usb_auto_mount && description.device_protocol.as_deref() == Some("USB") {
        return AutoMountDecision::Block;
    }

    if let (Some(disk_uuid), Some(volume_uuid)) = (
        description.disk_uuid.as_deref(),
        description.volume_uuid.as_deref(),
    ) {
        let composite = format!("{disk_uuid}-{volume_uuid}");
        if blocked_composite_ids.iter().any(|id| *id == composite) {
            return AutoMountDecision::Block;
        }
    }

    AutoMountDecision::Approve
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb_disk(device: &str) -> DiskDescription {
        DiskDescription {
            device_identifier: Some(device.to_string()),
            device_protocol: Some("USB".to_string()),
            ..DiskDescription::default()
        }
    }

    #[test]
    fn pending_manual_mount_is_always_approved() {
        let window = ManualMountWindow::new();
        window.note("disk4s2");

        let decision = should_block_mount(&usb_disk("disk4s2"), &window, true, &[]);
        assert_eq!(decision, AutoMountDecision::Approve);

        // A different identifier is still subject to the USB block.
        let decision = should_block_mount(&usb_disk("disk9s1"), &window, true, &[]);
        assert_eq!(decision, AutoMountDecision::Block);
    }

    #[test]
    fn pending_entry_lapses_after_the_window() {
        let window = ManualMountWindow::with_window(Duration::from_millis(20));
        window.note("disk4s2");
        assert!(window.is_pending("disk4s2"));

        std::thread::sleep(Duration::from_millis(60));
        assert!(!window.is_pending("disk4s2"));
        // The lapsed entry is cleared, not merely masked.
        assert!(!window.is_pending("disk4s2"));
    }

    #[test]
    fn disk_images_are_never_blocked() {
        let window = ManualMountWindow::new();
        let description = DiskDescription {
            device_model: Some("Disk Image".to_string()),
            device_protocol: Some("USB".to_string()),
            ..DiskDescription::default()
        };
        let decision = should_block_mount(&description, &window, true, &[]);
        assert_eq!(decision, AutoMountDecision::Approve);
    }

    #[test]
    fn blocked_set_matches_by_composite_id() {
        let window = ManualMountWindow::new();
        let description = DiskDescription {
            device_identifier: Some("disk4s2".to_string()),
            disk_uuid: Some("DISK-1".to_string()),
            volume_uuid: Some("VOL-1".to_string()),
            ..DiskDescription::default()
        };

        let blocked = vec!["DISK-1-VOL-1".to_string()];
        assert_eq!(
            should_block_mount(&description, &window, false, &blocked),
            AutoMountDecision::Block
        );
        assert_eq!(
            should_block_mount(&description, &window, false, &[]),
            AutoMountDecision::Approve
        );
    }

    #[test]
    fn window_entry_is_single_slot() {
        let window = ManualMountWindow::new();
        window.note("disk4s1");
        window.note("disk4s2");
        assert!(!window.is_pending("disk4s1"));
        assert!(window.is_pending("disk4s2"));
    }
}
