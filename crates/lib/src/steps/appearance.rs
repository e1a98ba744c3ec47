//! Alert group appearance: show where the Slack templates are edited, then re-render the
//! alert group message once the user comes back and submits the modal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{locate_alert_group, owning_organization, Step, StepContext, StepError};
use crate::auth::{Capability, CapabilitySet};
use crate::channels::{
    BlockActionType, InboundEvent, InteractiveMessageActionType, MessageUpdate, ModalView,
};
use crate::domain::{AlertGroupPk, OrganizationId};
use crate::metadata::{self, DecodeError};
use crate::routing::{RouteMatch, RoutingEntry};

pub const OPEN_APPEARANCE_DIALOG: &str = "OpenAlertAppearanceDialogStep";
pub const UPDATE_APPEARANCE: &str = "UpdateAppearanceStep";

/// Private metadata carried from the dialog to its submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppearanceState {
    pub organization_id: OrganizationId,
    pub alert_group_pk: AlertGroupPk,
    pub message_ts: String,
}

fn dialog_blocks(web_link: &str) -> Vec<Value> {
    vec![
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(
                    ":point_right: Click <{}|here> to open Integrations settings, edit Slack templates and return here",
                    web_link
                ),
            },
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": "Once changed Refresh the alert group" },
        }),
    ]
}

/// Opener: shows a modal linking to the integration's template settings.
#[derive(Debug, Default)]
pub struct OpenAlertAppearanceDialogStep;

#[async_trait]
impl Step for OpenAlertAppearanceDialogStep {
    fn routing_uid(&self) -> &'static str {
        OPEN_APPEARANCE_DIALOG
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::from([Capability::ChatopsWrite])
    }

    async fn process(&self, ctx: &StepContext, event: &InboundEvent) -> Result<(), StepError> {
        let group = locate_alert_group(ctx.repository.as_ref(), event).await?;
        let Some(organization) = owning_organization(ctx, event, &group).await else {
            log::info!(
                "user {} is not in the organization of alert group {}",
                event.user_id,
                group.pk
            );
            return Err(StepError::Unauthorized);
        };
        let trigger_id = event
            .trigger_id
            .as_deref()
            .ok_or(StepError::MissingField("trigger_id"))?;
        let message_ts = event
            .message_ts
            .clone()
            .ok_or(StepError::MissingField("message_ts"))?;

        let state = AppearanceState {
            organization_id: organization.id,
            alert_group_pk: group.pk,
            message_ts,
        };
        let private_metadata =
            metadata::encode(&state, ctx.metadata_router.as_ref(), &organization)?;
        let view = ModalView::new(
            UPDATE_APPEARANCE,
            "Alert group template",
            dialog_blocks(&group.integration.web_link),
            private_metadata,
        )
        .with_submit("Refresh alert group");

        ctx.chat.open_view(trigger_id, &view).await?;
        log::debug!("opened appearance dialog for alert group {}", group.pk);
        Ok(())
    }
}

/// Closer: re-renders the alert group message wherever it currently lives.
#[derive(Debug, Default)]
pub struct UpdateAppearanceStep;

#[async_trait]
impl Step for UpdateAppearanceStep {
    fn routing_uid(&self) -> &'static str {
        UPDATE_APPEARANCE
    }

    async fn process(&self, ctx: &StepContext, event: &InboundEvent) -> Result<(), StepError> {
        let blob = event
            .private_metadata
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(DecodeError::Missing)?;
        let state: AppearanceState = metadata::decode(blob)?;

        // Re-read: the message may have moved since the dialog was opened.
        let group = ctx
            .repository
            .alert_group(state.alert_group_pk)
            .await
            .ok_or_else(|| StepError::EntityNotFound(format!("alert group {}", state.alert_group_pk)))?;
        let message = group.slack_message.as_ref().ok_or_else(|| {
            StepError::EntityNotFound(format!("slack message of alert group {}", group.pk))
        })?;
        let channel = message.channel_id(ctx.channel_field).ok_or_else(|| {
            StepError::EntityNotFound(format!("slack channel of alert group {}", group.pk))
        })?;

        let update = MessageUpdate {
            channel: channel.to_string(),
            ts: message.slack_id.clone(),
            attachments: ctx.renderer.attachments(&group),
            blocks: ctx.renderer.blocks(&group),
        };
        ctx.chat.update_message(&update).await?;
        log::debug!(
            "refreshed alert group {} message {} in {}",
            group.pk,
            update.ts,
            update.channel
        );
        Ok(())
    }
}

/// Routes for the appearance steps. The dialog opens from both legacy attachment buttons and
/// Block Kit buttons.
pub fn routes() -> Vec<RoutingEntry> {
    let open: Arc<dyn Step> = Arc::new(OpenAlertAppearanceDialogStep);
    let update: Arc<dyn Step> = Arc::new(UpdateAppearanceStep);
    vec![
        RoutingEntry::new(
            RouteMatch::InteractiveMessage {
                action_type: Some(InteractiveMessageActionType::Button),
                action_name: Some(OPEN_APPEARANCE_DIALOG.to_string()),
            },
            open.clone(),
        ),
        RoutingEntry::new(
            RouteMatch::BlockAction {
                action_type: Some(BlockActionType::Button),
                action_id: Some(OPEN_APPEARANCE_DIALOG.to_string()),
            },
            open,
        ),
        RoutingEntry::new(
            RouteMatch::ViewSubmission {
                callback_id: Some(UPDATE_APPEARANCE.to_string()),
            },
            update,
        ),
    ]
}
