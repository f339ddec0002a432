// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem-attribute queries for mounted volumes

use std::path::Path;

use nix::sys::statvfs::statvfs;

use crate::error::{Result, SysError};

/// Capacity of a mounted filesystem as reported by statvfs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsAttributes {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl FsAttributes {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

/// Query total and free bytes for a mount point.
///
/// Fails with `PermissionDenied` when the process lacks access to the mount
/// point (commonly missing Full Disk Access); callers degrade that volume's
/// display instead of aborting the refresh.
pub fn query_fs_attributes(mount_point: &Path) -> Result<FsAttributes> {
    let stat = statvfs(mount_point).map_err(|errno| {
        if errno == nix::errno::Errno::EACCES || errno == nix::errno::Errno::EPERM {
            SysError::PermissionDenied(mount_point.display().to_string())
        } else {
            SysError::Io(std::io::Error::from_raw_os_error(errno as i32))
        }
    })?;

    let fragment = stat.fragment_size() as u64;
    Ok(FsAttributes {
        total_bytes: stat.blocks() as u64 * fragment,
        free_bytes: stat.blocks_available() as u64 * fragment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_capacity_for_an_existing_path() {
        let attrs = query_fs_attributes(Path::new("/")).unwrap();
        assert!(attrs.total_bytes > 0);
        assert!(attrs.used_bytes() <= attrs.total_bytes);
    }
}
