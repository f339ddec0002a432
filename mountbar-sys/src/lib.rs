// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for Mountbar
//!
//! This crate provides the boundary collaborators the engine treats as
//! opaque:
//! - External command execution with a hard deadline
//! - Filesystem-attribute queries (statvfs)
//! - Mount-table reading and parsing
//!
//! Nothing in here knows about the disk domain model; that lives in
//! `mountbar-engine`.

pub mod error;
pub mod fsattr;
pub mod mount_table;
pub mod shell;

pub use error::{Result, SysError};
pub use fsattr::{FsAttributes, query_fs_attributes};
pub use mount_table::{MountEntry, parse_mount_table};
pub use shell::{CommandOutput, CommandRunner, SystemShell};
