// SPDX-License-Identifier: GPL-3.0-only

//! diskutil invocation and output parsing
//!
//! Every command the engine issues is listed here; nothing else in the crate
//! builds a diskutil command line. The passphrase for locked volumes goes
//! over stdin, never on the command line, so it cannot leak through a
//! process listing.

pub mod info;
pub mod listing;

use std::sync::Arc;

use mountbar_sys::{CommandOutput, CommandRunner};

use crate::error::{EngineError, Result};

pub use info::{DiskInfo, parse_disk_info};
pub use listing::{RawContainer, RawRootDisk, RawSnapshot, RawVolume, parse_listing};

/// Thin typed wrapper over the diskutil command set
#[derive(Clone)]
pub struct DiskutilClient {
    shell: Arc<dyn CommandRunner>,
}

impl DiskutilClient {
    pub fn new(shell: Arc<dyn CommandRunner>) -> Self {
        Self { shell }
    }

    /// `diskutil list -plist`: the full disks-and-partitions listing
    pub async fn list_raw(&self) -> Result<String> {
        let output = self.shell.run("diskutil", &["list", "-plist"], None).await?;
        if let Some(stderr) = output.failure() {
            return Err(EngineError::Data(format!(
                "diskutil list failed: {stderr}"
            )));
        }
        if output.stdout.is_empty() {
            return Err(EngineError::Data(
                "diskutil list returned no data".to_string(),
            ));
        }
        Ok(output.stdout)
    }

    /// `diskutil info -plist <id>`: detail record for one disk
    pub async fn disk_info_raw(&self, identifier: &str) -> Result<String> {
        let output = self
            .shell
            .run("diskutil", &["info", "-plist", identifier], None)
            .await?;
        Ok(output.stdout)
    }

    pub async fn mount(&self, device_identifier: &str) -> Result<CommandOutput> {
        Ok(self
            .shell
            .run("diskutil", &["mount", device_identifier], None)
            .await?)
    }

    pub async fn unmount(&self, device_identifier: &str) -> Result<CommandOutput> {
        Ok(self
            .shell
            .run("diskutil", &["unmount", device_identifier], None)
            .await?)
    }

    /// Eject a whole disk. The `eject` verb has no force flag, so a forced
    /// eject is a forced unmount of every volume (`unmountDisk force`)
    /// followed by the eject proper; a failed forced unmount is returned
    /// as-is without attempting the eject.
    pub async fn eject(&self, disk_identifier: &str, force: bool) -> Result<CommandOutput> {
        if force {
            let unmounted = self
                .shell
                .run("diskutil", &["unmountDisk", "force", disk_identifier], None)
                .await?;
            if unmounted.failure().is_some() {
                return Ok(unmounted);
            }
        }
        Ok(self
            .shell
            .run("diskutil", &["eject", disk_identifier], None)
            .await?)
    }

    /// Unlock an encrypted APFS volume, feeding the passphrase via stdin
    pub async fn unlock(&self, identifier: &str, passphrase: &str) -> Result<CommandOutput> {
        Ok(self
            .shell
            .run(
                "diskutil",
                &["apfs", "unlockVolume", identifier, "-stdinpassphrase"],
                Some(passphrase.as_bytes()),
            )
            .await?)
    }
}
