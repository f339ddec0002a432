// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for Mountbar volume management
//!
//! This crate defines the single source of truth for the domain types used
//! throughout the stack:
//!
//! - **mountbar-engine**: Builds and returns these types from its public API
//! - **mountbar-cli**: Consumes these types for display
//!
//! The hierarchy mirrors what `diskutil` reports on macOS:
//!
//! `PhysicalDisk` → `{ Volume | ApfsContainer → Volume }` → `ApfsSnapshot`
//!
//! Volumes carry a dual identity: a transient device identifier (`disk4s1`,
//! reassigned on every re-enumeration) used only to issue the next command,
//! and a persistent UUID-based identity used as the join key against the
//! durable preference sets.

pub mod alert;
pub mod common;
pub mod disk;
pub mod managed;
pub mod share;
pub mod volume;

pub use alert::{AlertInteraction, OperationAlert};
pub use common::bytes_to_pretty;
pub use disk::{ApfsContainer, ApfsSnapshot, DiskKind, DiskStats, PhysicalDisk};
pub use managed::ManagedVolumeInfo;
pub use share::NetworkShare;
pub use volume::{Volume, VolumeCategory};
