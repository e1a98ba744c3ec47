//! Resolve the alert group an interaction refers to.
//!
//! Buttons rendered by the engine carry the alert group in their `value` as JSON. Older
//! messages have no value, so the group is found through the message the button sits on.

use serde::Deserialize;

use super::StepError;
use crate::channels::InboundEvent;
use crate::domain::{AlertGroup, AlertGroupRepository};

#[derive(Debug, Default, Deserialize)]
struct ActionValue {
    #[serde(default)]
    alert_group_pk: Option<i64>,
    #[serde(default)]
    alert_group_ppk: Option<String>,
}

/// Alert group for `event`: from the action value (pk, then public key), else by channel and
/// message timestamp.
pub async fn locate_alert_group(
    repository: &dyn AlertGroupRepository,
    event: &InboundEvent,
) -> Result<AlertGroup, StepError> {
    let value = event
        .action_value
        .as_deref()
        .and_then(|v| serde_json::from_str::<ActionValue>(v).ok())
        .unwrap_or_default();

    if let Some(pk) = value.alert_group_pk {
        return repository
            .alert_group(pk)
            .await
            .ok_or_else(|| StepError::EntityNotFound(format!("alert group {}", pk)));
    }
    if let Some(ppk) = value.alert_group_ppk.as_deref() {
        return repository
            .alert_group_by_public_key(ppk)
            .await
            .ok_or_else(|| StepError::EntityNotFound(format!("alert group {}", ppk)));
    }

    let channel_id = event
        .channel_id
        .as_deref()
        .ok_or(StepError::MissingField("channel.id"))?;
    let message_ts = event
        .message_ts
        .as_deref()
        .ok_or(StepError::MissingField("message_ts"))?;
    repository
        .alert_group_by_message(channel_id, message_ts)
        .await
        .ok_or_else(|| {
            StepError::EntityNotFound(format!("alert group for message {} in {}", message_ts, channel_id))
        })
}
