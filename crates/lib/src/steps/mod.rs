//! Steps: the units of behavior an interaction is routed to.
//!
//! A step declares the capabilities it requires and processes one [`InboundEvent`] against the
//! collaborators in [`StepContext`]. Steps come in opener/closer pairs: the opener shows a modal
//! carrying private metadata, the closer decodes that metadata when the modal is submitted.

pub mod appearance;
mod locator;

pub use locator::locate_alert_group;

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::{CapabilitySet, PermissionSource};
use crate::channels::{ChatClient, InboundEvent, TransportError};
use crate::domain::{AlertGroup, AlertGroupRepository, MessageChannelField, MessageRenderer, Organization};
use crate::metadata::{DecodeError, EncodeError, MetadataRouter};

/// Collaborators shared by every step. Cheap to clone; read-only.
#[derive(Clone)]
pub struct StepContext {
    pub repository: Arc<dyn AlertGroupRepository>,
    pub renderer: Arc<dyn MessageRenderer>,
    pub chat: Arc<dyn ChatClient>,
    pub permissions: Arc<dyn PermissionSource>,
    pub metadata_router: Arc<dyn MetadataRouter>,
    /// Which message channel field addresses `chat.update`.
    pub channel_field: MessageChannelField,
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("interaction is missing `{0}`")]
    MissingField(&'static str),
    #[error("actor is not authorized for this action")]
    Unauthorized,
    #[error("{0} not found")]
    EntityNotFound(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("step timed out")]
    Timeout,
}

/// Coarse classification of a failed step, used for the user notice and the dispatch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Decode,
    Unauthorized,
    NotFound,
    Transport,
    Timeout,
}

impl StepError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StepError::Decode(_) | StepError::Encode(_) | StepError::MissingField(_) => {
                FailureKind::Decode
            }
            StepError::Unauthorized => FailureKind::Unauthorized,
            StepError::EntityNotFound(_) => FailureKind::NotFound,
            StepError::Transport(_) => FailureKind::Transport,
            StepError::Timeout => FailureKind::Timeout,
        }
    }
}

impl FailureKind {
    /// Ephemeral text shown to the actor.
    pub fn notice(self) -> &'static str {
        match self {
            FailureKind::Unauthorized => {
                ":warning: You do not have permission to perform this action. Ask an admin to grant you the required role."
            }
            FailureKind::NotFound => ":warning: The alert group for this message could not be found.",
            FailureKind::Decode | FailureKind::Transport | FailureKind::Timeout => {
                ":warning: Something went wrong while processing this action. Please try again."
            }
        }
    }
}

#[async_trait]
pub trait Step: Send + Sync {
    /// Stable identifier used as action name, action id or view callback id.
    fn routing_uid(&self) -> &'static str;

    /// Capabilities the actor must hold; empty means always permitted.
    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::new()
    }

    async fn process(&self, ctx: &StepContext, event: &InboundEvent) -> Result<(), StepError>;
}

/// Organization of the actor's Slack workspace, if it owns `group`.
pub(crate) async fn owning_organization(
    ctx: &StepContext,
    event: &InboundEvent,
    group: &AlertGroup,
) -> Option<Organization> {
    let team_id = event.team_id.as_deref()?;
    ctx.repository
        .organization_for_team(team_id)
        .await
        .filter(|org| org.id == group.organization_id)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording chat client and context builder shared by step and routing tests.

    use super::*;
    use crate::auth::{Capability, ConfiguredPermissions};
    use crate::channels::{MessageUpdate, ModalView};
    use crate::config::PermissionsConfig;
    use crate::domain::{fixtures, BasicRenderer, MemoryDirectory};
    use crate::metadata::ProxyRouting;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        OpenView { trigger_id: String, view: ModalView },
        UpdateMessage(MessageUpdate),
        Ephemeral { channel_id: String, user_id: String, text: String },
        Direct { user_id: String, text: String },
    }

    #[derive(Default)]
    pub struct RecordingChat {
        pub calls: Mutex<Vec<Call>>,
        pub fail_with: Mutex<Option<String>>,
    }

    impl RecordingChat {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn opened_views(&self) -> Vec<ModalView> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::OpenView { view, .. } => Some(view),
                    _ => None,
                })
                .collect()
        }

        pub fn updates(&self) -> Vec<MessageUpdate> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::UpdateMessage(u) => Some(u),
                    _ => None,
                })
                .collect()
        }

        /// Text of every notice shown to a user, ephemeral or direct.
        pub fn notices(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Ephemeral { text, .. } | Call::Direct { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, method: &'static str, call: Call) -> Result<(), TransportError> {
            self.calls.lock().unwrap().push(call);
            match self.fail_with.lock().unwrap().clone() {
                Some(error) => Err(TransportError::Api { method, error }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ChatClient for RecordingChat {
        async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), TransportError> {
            self.record(
                "views.open",
                Call::OpenView {
                    trigger_id: trigger_id.to_string(),
                    view: view.clone(),
                },
            )
        }

        async fn update_message(&self, update: &MessageUpdate) -> Result<(), TransportError> {
            self.record("chat.update", Call::UpdateMessage(update.clone()))
        }

        async fn post_ephemeral(
            &self,
            channel_id: &str,
            user_id: &str,
            text: &str,
        ) -> Result<(), TransportError> {
            self.record(
                "chat.postEphemeral",
                Call::Ephemeral {
                    channel_id: channel_id.to_string(),
                    user_id: user_id.to_string(),
                    text: text.to_string(),
                },
            )
        }

        async fn post_direct(&self, user_id: &str, text: &str) -> Result<(), TransportError> {
            self.record(
                "chat.postMessage",
                Call::Direct {
                    user_id: user_id.to_string(),
                    text: text.to_string(),
                },
            )
        }
    }

    /// Context over the fixture directory; user `U_WRITER` holds chatops:write, everyone else
    /// only chatops:read.
    pub fn context() -> (StepContext, Arc<RecordingChat>, Arc<MemoryDirectory>) {
        let chat = Arc::new(RecordingChat::default());
        let directory = Arc::new(fixtures::directory());
        let mut permissions = PermissionsConfig::default();
        permissions.default = vec![Capability::ChatopsRead];
        permissions.grants.insert(
            "U_WRITER".to_string(),
            vec![Capability::ChatopsRead, Capability::ChatopsWrite],
        );
        let ctx = StepContext {
            repository: directory.clone(),
            renderer: Arc::new(BasicRenderer),
            chat: chat.clone(),
            permissions: Arc::new(ConfiguredPermissions::from_config(&permissions)),
            metadata_router: Arc::new(ProxyRouting),
            channel_field: MessageChannelField::Current,
        };
        (ctx, chat, directory)
    }
}
