// SPDX-License-Identifier: GPL-3.0-only

//! Disk state reconciliation engine for Mountbar
//!
//! The engine turns `diskutil` output into a published domain model and
//! executes user-initiated volume operations:
//!
//! 1. The refresh scheduler invokes `diskutil list -plist` through the
//!    [`CommandRunner`](mountbar_sys::CommandRunner) seam
//! 2. The listing parser builds typed intermediate records
//!    (root disks → non-APFS partitions + APFS containers)
//! 3. The model builder resolves them into `PhysicalDisk`/`Volume` values,
//!    consulting the preference store to drop ignored volumes and annotate
//!    protected ones
//! 4. The resulting snapshot atomically replaces the published state
//!
//! Mount/unmount/eject/unlock go through [`manager::DriveManager`], which
//! classifies free-text diskutil failures into a closed taxonomy and
//! schedules a refresh after every operation.

pub mod automount;
pub mod builder;
pub mod classifier;
pub mod creds;
pub mod diskutil;
pub mod error;
pub mod manager;
pub mod scheduler;
pub mod shares;
pub mod store;

pub use automount::{AutoMountDecision, DiskDescription, ManualMountWindow, should_block_mount};
pub use classifier::{FailureKind, Operation, alert_for, classify};
pub use creds::{CredentialStore, MemoryCredentialStore};
pub use error::{EngineError, Result};
pub use manager::{DriveManager, DriveState, EngineConfig};
pub use scheduler::{RefreshHandle, RefreshReason};
pub use shares::NetworkShareManager;
pub use store::{FileStore, KeyValueStore, PreferenceStore};
