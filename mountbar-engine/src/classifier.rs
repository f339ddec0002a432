// SPDX-License-Identifier: GPL-3.0-only

//! Free-text diskutil error classification
//!
//! diskutil has no structured error codes for these cases, so the only
//! available signal is lowercase substring matching on stderr. The strings
//! are OS-version-dependent; the `Other` fallback guarantees total coverage
//! so an unmatched message can never crash the caller. The classifier is
//! pure: only the caller acts on the result.

use mountbar_types::{AlertInteraction, OperationAlert};

const LOCKED_APFS_MESSAGE: &str =
    "This is an encrypted and locked APFS Volume; use \"diskutil apfs unlockVolume\"";

/// Which user-initiated operation produced the stderr text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Mount,
    Unmount,
    Eject,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Operation::Mount => "mount",
            Operation::Unmount => "unmount",
            Operation::Eject => "eject",
        }
    }

    fn failed_title(self) -> &'static str {
        match self {
            Operation::Mount => "Mount Failed",
            Operation::Unmount => "Unmount Failed",
            Operation::Eject => "Eject Failed",
        }
    }
}

/// Closed failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// EFI partitions are categorically unmountable; expected, not a real
    /// failure
    MountEfiVolume,

    /// Partial eject failure: "at least one volume could not be unmounted"
    UnmountBusyVolume,

    MountInUseVolume,
    UnmountInUseVolume,
    EjectInUseVolume,

    /// Encrypted APFS volume is locked; a passphrase round-trip is needed
    MountLockedVolume,

    /// Anything unmatched; the raw text is shown verbatim for support
    Other,
}

/// Classify a diskutil failure from the operation context, target name and
/// raw stderr.
pub fn classify(operation: Operation, volume_name: &str, stderr: &str) -> FailureKind {
    let lower = stderr.to_lowercase();

    if operation == Operation::Mount && volume_name.eq_ignore_ascii_case("EFI") {
        return FailureKind::MountEfiVolume;
    }

    if lower.contains("at least one volume could not be unmounted") {
        return FailureKind::UnmountBusyVolume;
    }

    if lower.contains("busy") || lower.contains("in use") {
        return match operation {
            Operation::Mount => FailureKind::MountInUseVolume,
            Operation::Unmount => FailureKind::UnmountInUseVolume,
            Operation::Eject => FailureKind::EjectInUseVolume,
        };
    }

    if stderr.contains(LOCKED_APFS_MESSAGE) {
        return FailureKind::MountLockedVolume;
    }

    FailureKind::Other
}

/// Map a classified failure to the structured alert handed to the
/// presentation layer.
pub fn alert_for(
    kind: FailureKind,
    operation: Operation,
    name: &str,
    raw_stderr: &str,
) -> OperationAlert {
    match kind {
        FailureKind::MountLockedVolume => OperationAlert {
            title: format!("\u{201c}{name}\u{201d} is locked"),
            message: format!("Enter the password to unlock \u{201c}{name}\u{201d}"),
            interaction: AlertInteraction::UnlockPrompt,
        },
        FailureKind::MountEfiVolume => OperationAlert::basic(
            "Mount Failed",
            "The \u{201c}EFI\u{201d} partition cannot be mounted directly. \
             This is a special system partition and this behavior is normal.",
        ),
        FailureKind::UnmountBusyVolume => OperationAlert {
            title: "Eject Failed".to_string(),
            message: format!(
                "Failed to eject \u{201c}{name}\u{201d} because one of its volumes \
                 is busy or in use."
            ),
            interaction: AlertInteraction::ForceEject,
        },
        FailureKind::MountInUseVolume
        | FailureKind::UnmountInUseVolume
        | FailureKind::EjectInUseVolume => {
            let verb = match kind {
                FailureKind::MountInUseVolume => "mount",
                FailureKind::UnmountInUseVolume => "unmount",
                _ => "eject",
            };
            let title = match kind {
                FailureKind::MountInUseVolume => "Mount Failed",
                FailureKind::UnmountInUseVolume => "Unmount Failed",
                _ => "Eject Failed",
            };
            OperationAlert::basic(
                title,
                format!(
                    "Failed to {verb} \u{201c}{name}\u{201d} because it is currently \
                     in use by another application."
                ),
            )
        }
        FailureKind::Other => OperationAlert::basic(
            operation.failed_title(),
            format!(
                "An unknown error occurred while trying to {} \u{201c}{name}\u{201d}.\
                 \n\nDetails:\n{raw_stderr}",
                operation.verb()
            ),
        ),
    }
}
