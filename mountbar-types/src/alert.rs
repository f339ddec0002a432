// SPDX-License-Identifier: GPL-3.0-only

//! Structured user-facing alerts produced by the engine
//!
//! Operation failures are never surfaced as raw stderr alone; the classifier
//! turns them into a title, a message, and the interaction the presentation
//! layer must offer.

use serde::{Deserialize, Serialize};

/// What the presentation layer should offer alongside the alert text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertInteraction {
    /// A plain dismissable notice
    Basic,

    /// Prompt for a passphrase, then call back into the engine's
    /// locked-volume mount path with it
    UnlockPrompt,

    /// Offer to retry the eject with the force flag
    ForceEject,
}

/// A user-facing alert with resolved title and message text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationAlert {
    pub title: String,
    pub message: String,
    pub interaction: AlertInteraction,
}

impl OperationAlert {
    pub fn basic(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            interaction: AlertInteraction::Basic,
        }
    }
}
