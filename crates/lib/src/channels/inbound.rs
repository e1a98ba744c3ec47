//! Inbound interaction events: Slack's interaction payload parsed into a typed shape.
//!
//! Slack POSTs interactions as a form with a single `payload` field holding JSON. The payload
//! `type` decides which keys identify the interaction; [`EventShape`] captures exactly those
//! keys so routing can match on them.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("interaction payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported interaction payload type `{0}`")]
    UnsupportedType(String),
    #[error("interaction payload is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    InteractiveMessage,
    BlockActions,
    ViewSubmission,
    ViewClosed,
    MessageAction,
}

impl PayloadType {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadType::InteractiveMessage => "interactive_message",
            PayloadType::BlockActions => "block_actions",
            PayloadType::ViewSubmission => "view_submission",
            PayloadType::ViewClosed => "view_closed",
            PayloadType::MessageAction => "message_action",
        }
    }

    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "interactive_message" => Some(PayloadType::InteractiveMessage),
            "block_actions" => Some(PayloadType::BlockActions),
            "view_submission" => Some(PayloadType::ViewSubmission),
            "view_closed" => Some(PayloadType::ViewClosed),
            "message_action" => Some(PayloadType::MessageAction),
            _ => None,
        }
    }
}

/// Action type of a legacy (attachment) interactive message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveMessageActionType {
    Button,
    Select,
    Other(String),
}

impl InteractiveMessageActionType {
    fn from_wire(s: &str) -> Self {
        match s {
            "button" => InteractiveMessageActionType::Button,
            "select" => InteractiveMessageActionType::Select,
            other => InteractiveMessageActionType::Other(other.to_string()),
        }
    }
}

/// Element type of a Block Kit action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockActionType {
    Button,
    StaticSelect,
    UsersSelect,
    Overflow,
    Other(String),
}

impl BlockActionType {
    fn from_wire(s: &str) -> Self {
        match s {
            "button" => BlockActionType::Button,
            "static_select" => BlockActionType::StaticSelect,
            "users_select" => BlockActionType::UsersSelect,
            "overflow" => BlockActionType::Overflow,
            other => BlockActionType::Other(other.to_string()),
        }
    }
}

/// The routing-relevant identity of an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventShape {
    InteractiveMessage {
        action_type: InteractiveMessageActionType,
        action_name: String,
    },
    BlockAction {
        action_type: BlockActionType,
        action_id: String,
    },
    ViewSubmission {
        callback_id: String,
    },
    ViewClosed {
        callback_id: String,
    },
    MessageAction {
        callback_id: String,
    },
}

impl EventShape {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            EventShape::InteractiveMessage { .. } => PayloadType::InteractiveMessage,
            EventShape::BlockAction { .. } => PayloadType::BlockActions,
            EventShape::ViewSubmission { .. } => PayloadType::ViewSubmission,
            EventShape::ViewClosed { .. } => PayloadType::ViewClosed,
            EventShape::MessageAction { .. } => PayloadType::MessageAction,
        }
    }
}

impl fmt::Display for EventShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventShape::InteractiveMessage {
                action_type,
                action_name,
            } => write!(f, "interactive_message {:?} action_name=`{}`", action_type, action_name),
            EventShape::BlockAction {
                action_type,
                action_id,
            } => write!(f, "block_actions {:?} action_id=`{}`", action_type, action_id),
            EventShape::ViewSubmission { callback_id }
            | EventShape::ViewClosed { callback_id }
            | EventShape::MessageAction { callback_id } => write!(
                f,
                "{} callback_id=`{}`",
                self.payload_type().as_str(),
                callback_id
            ),
        }
    }
}

/// A parsed interaction. Immutable once built; consumed by exactly one step.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub shape: EventShape,
    pub user_id: String,
    pub team_id: Option<String>,
    pub trigger_id: Option<String>,
    /// Timestamp of the message the interaction happened on.
    pub message_ts: Option<String>,
    pub channel_id: Option<String>,
    /// `value` of the triggering action, when there is one.
    pub action_value: Option<String>,
    /// `view.private_metadata` for view payloads.
    pub private_metadata: Option<String>,
    /// Legacy verification token Slack includes in every payload.
    pub verification_token: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Default, Deserialize)]
struct RawId {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAction {
    #[serde(default, rename = "type")]
    typ: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    action_id: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContainer {
    #[serde(default)]
    message_ts: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawView {
    #[serde(default)]
    callback_id: Option<String>,
    #[serde(default)]
    private_metadata: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(rename = "type")]
    payload_type: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    trigger_id: Option<String>,
    #[serde(default)]
    user: Option<RawId>,
    #[serde(default)]
    team: Option<RawId>,
    #[serde(default)]
    channel: Option<RawId>,
    #[serde(default)]
    actions: Vec<RawAction>,
    #[serde(default)]
    callback_id: Option<String>,
    #[serde(default)]
    message_ts: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    container: Option<RawContainer>,
    #[serde(default)]
    view: Option<RawView>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl InboundEvent {
    pub fn payload_type(&self) -> PayloadType {
        self.shape.payload_type()
    }

    /// Parse the JSON string found in the interaction form's `payload` field.
    pub fn from_payload_str(payload: &str) -> Result<Self, InboundError> {
        let raw: Value = serde_json::from_str(payload)?;
        Self::from_payload(raw)
    }

    pub fn from_payload(raw: Value) -> Result<Self, InboundError> {
        let p: RawPayload = serde_json::from_value(raw.clone())?;
        let payload_type = PayloadType::from_wire(&p.payload_type)
            .ok_or_else(|| InboundError::UnsupportedType(p.payload_type.clone()))?;
        let first_action = p.actions.into_iter().next();
        let view = p.view.unwrap_or_default();
        let container = p.container.unwrap_or_default();

        let shape = match payload_type {
            PayloadType::InteractiveMessage => {
                let action = first_action.as_ref().ok_or(InboundError::MissingField("actions"))?;
                EventShape::InteractiveMessage {
                    action_type: InteractiveMessageActionType::from_wire(
                        action.typ.as_deref().unwrap_or_default(),
                    ),
                    action_name: non_empty(action.name.clone())
                        .ok_or(InboundError::MissingField("actions[0].name"))?,
                }
            }
            PayloadType::BlockActions => {
                let action = first_action.as_ref().ok_or(InboundError::MissingField("actions"))?;
                EventShape::BlockAction {
                    action_type: BlockActionType::from_wire(action.typ.as_deref().unwrap_or_default()),
                    action_id: non_empty(action.action_id.clone())
                        .ok_or(InboundError::MissingField("actions[0].action_id"))?,
                }
            }
            PayloadType::ViewSubmission => EventShape::ViewSubmission {
                callback_id: non_empty(view.callback_id.clone())
                    .ok_or(InboundError::MissingField("view.callback_id"))?,
            },
            PayloadType::ViewClosed => EventShape::ViewClosed {
                callback_id: non_empty(view.callback_id.clone())
                    .ok_or(InboundError::MissingField("view.callback_id"))?,
            },
            PayloadType::MessageAction => EventShape::MessageAction {
                callback_id: non_empty(p.callback_id.clone())
                    .ok_or(InboundError::MissingField("callback_id"))?,
            },
        };

        let user_id = non_empty(p.user.and_then(|u| u.id))
            .ok_or(InboundError::MissingField("user.id"))?;
        let message_ts = non_empty(p.message_ts)
            .or_else(|| non_empty(container.message_ts))
            .or_else(|| non_empty(p.message.and_then(|m| m.ts)));
        let channel_id = non_empty(p.channel.and_then(|c| c.id)).or_else(|| non_empty(container.channel_id));

        Ok(Self {
            shape,
            user_id,
            team_id: non_empty(p.team.and_then(|t| t.id)),
            trigger_id: non_empty(p.trigger_id),
            message_ts,
            channel_id,
            action_value: non_empty(first_action.and_then(|a| a.value)),
            private_metadata: view.private_metadata,
            verification_token: non_empty(p.token),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_legacy_interactive_message_button() {
        let event = InboundEvent::from_payload(json!({
            "type": "interactive_message",
            "token": "vt",
            "callback_id": "alert",
            "trigger_id": "trig",
            "message_ts": "100.1",
            "user": { "id": "U1" },
            "team": { "id": "T1" },
            "channel": { "id": "C1" },
            "actions": [{ "name": "OpenStep", "type": "button", "value": "{\"alert_group_pk\":42}" }],
        }))
        .unwrap();
        assert_eq!(
            event.shape,
            EventShape::InteractiveMessage {
                action_type: InteractiveMessageActionType::Button,
                action_name: "OpenStep".to_string(),
            }
        );
        assert_eq!(event.message_ts.as_deref(), Some("100.1"));
        assert_eq!(event.channel_id.as_deref(), Some("C1"));
        assert_eq!(event.team_id.as_deref(), Some("T1"));
        assert_eq!(event.action_value.as_deref(), Some("{\"alert_group_pk\":42}"));
        assert_eq!(event.verification_token.as_deref(), Some("vt"));
    }

    #[test]
    fn parses_block_action_with_container() {
        let event = InboundEvent::from_payload(json!({
            "type": "block_actions",
            "trigger_id": "trig",
            "user": { "id": "U1" },
            "team": { "id": "T1" },
            "container": { "type": "message", "message_ts": "100.1", "channel_id": "C1" },
            "actions": [{ "action_id": "OpenStep", "type": "button" }],
        }))
        .unwrap();
        assert_eq!(
            event.shape,
            EventShape::BlockAction {
                action_type: BlockActionType::Button,
                action_id: "OpenStep".to_string(),
            }
        );
        assert_eq!(event.payload_type(), PayloadType::BlockActions);
        assert_eq!(event.message_ts.as_deref(), Some("100.1"));
        assert_eq!(event.channel_id.as_deref(), Some("C1"));
        assert_eq!(event.action_value, None);
    }

    #[test]
    fn parses_view_submission() {
        let event = InboundEvent::from_payload_str(
            r#"{"type":"view_submission","user":{"id":"U1"},"view":{"callback_id":"CloseStep","private_metadata":"{\"v\":1}"}}"#,
        )
        .unwrap();
        assert_eq!(
            event.shape,
            EventShape::ViewSubmission {
                callback_id: "CloseStep".to_string()
            }
        );
        assert_eq!(event.private_metadata.as_deref(), Some("{\"v\":1}"));
        assert_eq!(event.channel_id, None);
    }

    #[test]
    fn rejects_unknown_type_and_missing_keys() {
        assert!(matches!(
            InboundEvent::from_payload(json!({ "type": "block_suggestion", "user": { "id": "U1" } })),
            Err(InboundError::UnsupportedType(t)) if t == "block_suggestion"
        ));
        assert!(matches!(
            InboundEvent::from_payload(json!({ "type": "block_actions", "user": { "id": "U1" }, "actions": [] })),
            Err(InboundError::MissingField("actions"))
        ));
        assert!(matches!(
            InboundEvent::from_payload(json!({ "type": "view_submission", "view": { "callback_id": "X" } })),
            Err(InboundError::MissingField("user.id"))
        ));
        assert!(matches!(
            InboundEvent::from_payload_str("{"),
            Err(InboundError::Json(_))
        ));
    }

    #[test]
    fn shape_display_names_payload_type() {
        let shape = EventShape::ViewSubmission {
            callback_id: "X".to_string(),
        };
        assert_eq!(shape.to_string(), "view_submission callback_id=`X`");
    }
}
