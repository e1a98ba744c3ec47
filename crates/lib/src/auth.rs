//! Authorization gate: capabilities a step requires vs. capabilities an actor holds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::config::PermissionsConfig;

/// A permission token granted to Slack actors. Wire form is `scope:action` (e.g. `chatops:write`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "chatops:read")]
    ChatopsRead,
    #[serde(rename = "chatops:write")]
    ChatopsWrite,
    #[serde(rename = "chatops:update_settings")]
    ChatopsUpdateSettings,
    #[serde(rename = "alert_groups:read")]
    AlertGroupsRead,
    #[serde(rename = "alert_groups:write")]
    AlertGroupsWrite,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::ChatopsRead,
        Capability::ChatopsWrite,
        Capability::ChatopsUpdateSettings,
        Capability::AlertGroupsRead,
        Capability::AlertGroupsWrite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ChatopsRead => "chatops:read",
            Capability::ChatopsWrite => "chatops:write",
            Capability::ChatopsUpdateSettings => "chatops:update_settings",
            Capability::AlertGroupsRead => "alert_groups:read",
            Capability::AlertGroupsWrite => "alert_groups:write",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown capability `{0}`")]
pub struct UnknownCapability(String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

pub type CapabilitySet = BTreeSet<Capability>;

/// True when every required capability is granted. An empty requirement always passes.
pub fn authorize(required: &CapabilitySet, granted: &CapabilitySet) -> bool {
    required.is_subset(granted)
}

/// Source of an actor's granted capabilities.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn actor_capabilities(&self, team_id: Option<&str>, user_id: &str) -> CapabilitySet;
}

/// Grants read from the `permissions` config section: per-user grants, else the default set.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPermissions {
    default: CapabilitySet,
    grants: HashMap<String, CapabilitySet>,
}

impl ConfiguredPermissions {
    pub fn from_config(config: &PermissionsConfig) -> Self {
        Self {
            default: config.default.iter().copied().collect(),
            grants: config
                .grants
                .iter()
                .map(|(user, caps)| (user.clone(), caps.iter().copied().collect()))
                .collect(),
        }
    }
}

#[async_trait]
impl PermissionSource for ConfiguredPermissions {
    async fn actor_capabilities(&self, _team_id: Option<&str>, user_id: &str) -> CapabilitySet {
        self.grants
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}
