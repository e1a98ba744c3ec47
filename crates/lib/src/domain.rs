//! Domain collaborators: alert groups, their Slack messages, organizations.
//!
//! The engine only reads domain state through [`AlertGroupRepository`] and renders message
//! content through [`MessageRenderer`]. [`MemoryDirectory`] is an in-memory repository that
//! can be seeded from a JSON snapshot (`directory.json`) for running the gateway locally and
//! for tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use crate::steps::appearance::OPEN_APPEARANCE_DIALOG;

pub type OrganizationId = i64;
pub type AlertGroupPk = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrganizationId,
    /// Stack the organization lives in; used to route private metadata through the chatops proxy.
    pub stack_id: i64,
    pub slack_team_id: String,
}

/// Integration the alert group was received through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub name: String,
    /// Link to the integration's settings page (Slack templates are edited there).
    pub web_link: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertGroupState {
    #[default]
    Firing,
    Acknowledged,
    Resolved,
    Silenced,
}

impl AlertGroupState {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertGroupState::Firing => "firing",
            AlertGroupState::Acknowledged => "acknowledged",
            AlertGroupState::Resolved => "resolved",
            AlertGroupState::Silenced => "silenced",
        }
    }

    fn color(self) -> &'static str {
        match self {
            AlertGroupState::Firing => "#FF0000",
            AlertGroupState::Acknowledged => "#FFA500",
            AlertGroupState::Resolved => "#008000",
            AlertGroupState::Silenced => "#808080",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackChannel {
    pub slack_id: String,
}

/// Which channel field of a [`SlackMessageRef`] is authoritative.
///
/// Messages carry both a legacy channel id and a reference to the channel record while the
/// channel migration is in progress. The preference is supplied by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageChannelField {
    /// The channel record (`channel.slackId`).
    #[default]
    Current,
    /// The legacy raw channel id (`legacyChannelId`).
    Legacy,
}

/// Slack message that renders an alert group. `slack_id` is the message timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackMessageRef {
    pub slack_id: String,
    #[serde(default)]
    pub legacy_channel_id: Option<String>,
    #[serde(default)]
    pub channel: Option<SlackChannel>,
}

impl SlackMessageRef {
    /// Channel id to address the message with: the preferred field when populated, the other one otherwise.
    pub fn channel_id(&self, prefer: MessageChannelField) -> Option<&str> {
        let current = self
            .channel
            .as_ref()
            .map(|c| c.slack_id.as_str())
            .filter(|s| !s.is_empty());
        let legacy = self.legacy_channel_id.as_deref().filter(|s| !s.is_empty());
        match prefer {
            MessageChannelField::Current => current.or(legacy),
            MessageChannelField::Legacy => legacy.or(current),
        }
    }

    fn is_in_channel(&self, channel_id: &str) -> bool {
        self.legacy_channel_id.as_deref() == Some(channel_id)
            || self.channel.as_ref().map(|c| c.slack_id.as_str()) == Some(channel_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertGroup {
    pub pk: AlertGroupPk,
    pub public_primary_key: String,
    pub organization_id: OrganizationId,
    pub title: String,
    #[serde(default)]
    pub state: AlertGroupState,
    pub integration: Integration,
    #[serde(default)]
    pub slack_message: Option<SlackMessageRef>,
}

/// Read access to alert groups and organizations.
#[async_trait]
pub trait AlertGroupRepository: Send + Sync {
    async fn alert_group(&self, pk: AlertGroupPk) -> Option<AlertGroup>;

    async fn alert_group_by_public_key(&self, public_primary_key: &str) -> Option<AlertGroup>;

    /// Alert group whose Slack message is `message_ts` in `channel_id` (either channel field).
    async fn alert_group_by_message(&self, channel_id: &str, message_ts: &str) -> Option<AlertGroup>;

    /// Organization connected to a Slack workspace.
    async fn organization_for_team(&self, slack_team_id: &str) -> Option<Organization>;
}

/// Renders alert group content for a Slack message. Output is passed through to Slack untouched.
pub trait MessageRenderer: Send + Sync {
    fn attachments(&self, group: &AlertGroup) -> Value;
    fn blocks(&self, group: &AlertGroup) -> Value;
}

/// Plain renderer: title and state, plus a button that opens the template dialog.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicRenderer;

impl MessageRenderer for BasicRenderer {
    fn attachments(&self, group: &AlertGroup) -> Value {
        json!([{
            "color": group.state.color(),
            "fallback": format!("{} ({})", group.title, group.state.as_str()),
            "footer": group.integration.name,
        }])
    }

    fn blocks(&self, group: &AlertGroup) -> Value {
        let action_value = json!({
            "organization_id": group.organization_id,
            "alert_group_pk": group.pk,
        });
        json!([
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*{}*", group.title) },
            },
            {
                "type": "context",
                "elements": [{
                    "type": "mrkdwn",
                    "text": format!(
                        "{} via {} | {}",
                        group.public_primary_key,
                        group.integration.name,
                        group.state.as_str()
                    ),
                }],
            },
            {
                "type": "actions",
                "elements": [{
                    "type": "button",
                    "text": { "type": "plain_text", "text": ":mag: Alert group template" },
                    "action_id": OPEN_APPEARANCE_DIALOG,
                    "value": action_value.to_string(),
                }],
            },
        ])
    }
}

/// Serialized form of a [`MemoryDirectory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub alert_groups: Vec<AlertGroup>,
}

/// In-memory alert group and organization store.
pub struct MemoryDirectory {
    organizations: RwLock<Vec<Organization>>,
    alert_groups: RwLock<HashMap<AlertGroupPk, AlertGroup>>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::from_snapshot(DirectorySnapshot::default())
    }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let alert_groups = snapshot
            .alert_groups
            .into_iter()
            .map(|g| (g.pk, g))
            .collect();
        Self {
            organizations: RwLock::new(snapshot.organizations),
            alert_groups: RwLock::new(alert_groups),
        }
    }

    /// Load a snapshot from a JSON file. A missing file yields an empty directory; an unreadable
    /// or malformed one is an error.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("directory file not found, starting empty: {}", path.display());
            return Ok(Self::new());
        }
        let s = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading directory from {}", path.display()))?;
        let snapshot: DirectorySnapshot = serde_json::from_str(&s)
            .with_context(|| format!("parsing directory from {}", path.display()))?;
        log::info!(
            "loaded {} organization(s) and {} alert group(s) from {}",
            snapshot.organizations.len(),
            snapshot.alert_groups.len(),
            path.display()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Insert or replace an alert group (keyed by pk).
    pub async fn upsert_alert_group(&self, group: AlertGroup) {
        self.alert_groups.write().await.insert(group.pk, group);
    }
}

#[async_trait]
impl AlertGroupRepository for MemoryDirectory {
    async fn alert_group(&self, pk: AlertGroupPk) -> Option<AlertGroup> {
        self.alert_groups.read().await.get(&pk).cloned()
    }

    async fn alert_group_by_public_key(&self, public_primary_key: &str) -> Option<AlertGroup> {
        self.alert_groups
            .read()
            .await
            .values()
            .find(|g| g.public_primary_key == public_primary_key)
            .cloned()
    }

    async fn alert_group_by_message(&self, channel_id: &str, message_ts: &str) -> Option<AlertGroup> {
        self.alert_groups
            .read()
            .await
            .values()
            .find(|g| {
                g.slack_message
                    .as_ref()
                    .map(|m| m.slack_id == message_ts && m.is_in_channel(channel_id))
                    .unwrap_or(false)
            })
            .cloned()
    }

    async fn organization_for_team(&self, slack_team_id: &str) -> Option<Organization> {
        self.organizations
            .read()
            .await
            .iter()
            .find(|o| o.slack_team_id == slack_team_id)
            .cloned()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn message(legacy: Option<&str>, current: Option<&str>) -> SlackMessageRef {
        SlackMessageRef {
            slack_id: "1.0".to_string(),
            legacy_channel_id: legacy.map(str::to_string),
            channel: current.map(|id| SlackChannel {
                slack_id: id.to_string(),
            }),
        }
    }

    #[test]
    fn channel_id_prefers_configured_field() {
        let m = message(Some("C_OLD"), Some("C_NEW"));
        assert_eq!(m.channel_id(MessageChannelField::Current), Some("C_NEW"));
        assert_eq!(m.channel_id(MessageChannelField::Legacy), Some("C_OLD"));
    }

    #[test]
    fn channel_id_falls_back_to_other_field() {
        assert_eq!(
            message(Some("C_OLD"), None).channel_id(MessageChannelField::Current),
            Some("C_OLD")
        );
        assert_eq!(
            message(None, Some("C_NEW")).channel_id(MessageChannelField::Legacy),
            Some("C_NEW")
        );
        assert_eq!(message(None, None).channel_id(MessageChannelField::Current), None);
    }

    #[tokio::test]
    async fn lookup_by_message_matches_either_channel_field() {
        let dir = directory();
        let mut moved = alert_group();
        moved.pk = 43;
        moved.slack_message = Some(message(Some("C_OLD"), Some("C_NEW")));
        dir.upsert_alert_group(moved).await;

        assert_eq!(dir.alert_group_by_message("C100", "100.1").await.map(|g| g.pk), Some(42));
        assert_eq!(dir.alert_group_by_message("C_OLD", "1.0").await.map(|g| g.pk), Some(43));
        assert_eq!(dir.alert_group_by_message("C_NEW", "1.0").await.map(|g| g.pk), Some(43));
        assert!(dir.alert_group_by_message("C100", "9.9").await.is_none());
    }

    #[tokio::test]
    async fn organization_for_team_and_public_key() {
        let dir = directory();
        assert_eq!(dir.organization_for_team("T001").await, Some(organization()));
        assert!(dir.organization_for_team("T999").await.is_none());
        assert_eq!(dir.alert_group_by_public_key("I42").await.map(|g| g.pk), Some(42));
    }

    #[test]
    fn snapshot_parses_camel_case_json() {
        let s = r#"{
            "organizations": [{ "id": 1, "stackId": 2, "slackTeamId": "T1" }],
            "alertGroups": [{
                "pk": 5, "publicPrimaryKey": "I5", "organizationId": 1, "title": "disk",
                "state": "acknowledged",
                "integration": { "name": "Grafana", "webLink": "https://x" },
                "slackMessage": { "slackId": "1.2", "legacyChannelId": "C1" }
            }]
        }"#;
        let snapshot: DirectorySnapshot = serde_json::from_str(s).unwrap();
        let group = &snapshot.alert_groups[0];
        assert_eq!(group.state, AlertGroupState::Acknowledged);
        let message = group.slack_message.as_ref().unwrap();
        assert_eq!(message.channel, None);
        assert_eq!(message.channel_id(MessageChannelField::Current), Some("C1"));
    }

    #[test]
    fn basic_renderer_includes_template_button() {
        let blocks = BasicRenderer.blocks(&alert_group());
        let button = &blocks[2]["elements"][0];
        assert_eq!(button["action_id"], OPEN_APPEARANCE_DIALOG);
        let value: Value = serde_json::from_str(button["value"].as_str().unwrap()).unwrap();
        assert_eq!(value["alert_group_pk"], 42);
        assert_eq!(BasicRenderer.attachments(&alert_group())[0]["color"], "#FF0000");
    }
}
