// SPDX-License-Identifier: GPL-3.0-only

//! Credential storage seam
//!
//! Share passwords never enter the serialized share list; they live behind
//! this trait, keyed by the share's id. The production implementation is
//! platform keychain territory and stays outside the engine.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

pub trait CredentialStore: Send + Sync {
    fn save(&self, account: &str, secret: &str) -> Result<()>;

    /// `Ok(None)` when no secret is stored for the account
    fn load(&self, account: &str) -> Result<Option<String>>;

    fn delete(&self, account: &str) -> Result<()>;
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, account: &str, secret: &str) -> Result<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(account.to_string(), secret.to_string());
        Ok(())
    }

    fn load(&self, account: &str) -> Result<Option<String>> {
        Ok(self.secrets.lock().unwrap().get(account).cloned())
    }

    fn delete(&self, account: &str) -> Result<()> {
        self.secrets.lock().unwrap().remove(account);
        Ok(())
    }
}
