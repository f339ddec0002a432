// SPDX-License-Identifier: GPL-3.0-only

//! Network share configuration model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-configured SMB share.
///
/// Mount status is deliberately not part of this record; it is polled live
/// from the system mount table on each refresh. The password lives in the
/// credential store keyed by `id`, never in the serialized share list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkShare {
    pub id: Uuid,
    pub name: String,
    pub server: String,
    pub share_path: String,
    pub username: String,
    pub mount_at_login: bool,
    pub custom_mount_point: Option<String>,
}

impl NetworkShare {
    pub fn new(name: &str, server: &str, share_path: &str, username: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            server: server.to_string(),
            share_path: share_path.to_string(),
            username: username.to_string(),
            mount_at_login: true,
            custom_mount_point: None,
        }
    }
}
