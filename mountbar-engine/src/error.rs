// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the reconciliation engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The listing output was missing, empty, or failed to parse. Aborts the
    /// current refresh cycle only; the scheduler retries once.
    #[error("disk listing unusable: {0}")]
    Data(String),

    /// The external command itself failed or timed out
    #[error(transparent)]
    Command(#[from] mountbar_sys::SysError),

    /// The volume has no persistent disk UUID, so it cannot be added to a
    /// durable preference set. Surfaced to the user rather than silently
    /// dropped.
    #[error("\"{name}\" has no unique identifier and cannot be tracked across reconnects")]
    MissingIdentity { name: String },

    #[error("preference serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Share(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
