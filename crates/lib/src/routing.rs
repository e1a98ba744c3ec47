//! Routing: an ordered table mapping interaction shapes to steps, and the dispatcher that runs
//! the matched step behind the authorization gate.
//!
//! The table is built once at startup and shared read-only. Matching is first-match: an entry
//! matches when the event has the same payload type and every populated criteria field equals
//! the event's field. Unpopulated fields match anything.

use std::sync::Arc;
use std::time::Duration;

use crate::auth;
use crate::channels::{BlockActionType, EventShape, InboundEvent, InteractiveMessageActionType};
use crate::steps::{self, FailureKind, Step, StepContext, StepError};

/// Partial [`EventShape`]: the variant must match, `None` fields are wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch {
    InteractiveMessage {
        action_type: Option<InteractiveMessageActionType>,
        action_name: Option<String>,
    },
    BlockAction {
        action_type: Option<BlockActionType>,
        action_id: Option<String>,
    },
    ViewSubmission {
        callback_id: Option<String>,
    },
    ViewClosed {
        callback_id: Option<String>,
    },
    MessageAction {
        callback_id: Option<String>,
    },
}

fn field_matches<T: PartialEq>(criteria: &Option<T>, actual: &T) -> bool {
    criteria.as_ref().map_or(true, |c| c == actual)
}

impl RouteMatch {
    pub fn matches(&self, shape: &EventShape) -> bool {
        match (self, shape) {
            (
                RouteMatch::InteractiveMessage {
                    action_type,
                    action_name,
                },
                EventShape::InteractiveMessage {
                    action_type: t,
                    action_name: n,
                },
            ) => field_matches(action_type, t) && field_matches(action_name, n),
            (
                RouteMatch::BlockAction {
                    action_type,
                    action_id,
                },
                EventShape::BlockAction {
                    action_type: t,
                    action_id: id,
                },
            ) => field_matches(action_type, t) && field_matches(action_id, id),
            (
                RouteMatch::ViewSubmission { callback_id },
                EventShape::ViewSubmission { callback_id: c },
            )
            | (RouteMatch::ViewClosed { callback_id }, EventShape::ViewClosed { callback_id: c })
            | (
                RouteMatch::MessageAction { callback_id },
                EventShape::MessageAction { callback_id: c },
            ) => field_matches(callback_id, c),
            _ => false,
        }
    }
}

pub struct RoutingEntry {
    pub criteria: RouteMatch,
    pub step: Arc<dyn Step>,
}

impl RoutingEntry {
    pub fn new(criteria: RouteMatch, step: Arc<dyn Step>) -> Self {
        Self { criteria, step }
    }
}

impl std::fmt::Debug for RoutingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEntry")
            .field("criteria", &self.criteria)
            .field("step", &self.step.routing_uid())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("no route for {shape}")]
pub struct NoRouteError {
    pub shape: EventShape,
}

/// Ordered, immutable routing table.
#[derive(Debug, Default)]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    pub fn new(entries: Vec<RoutingEntry>) -> Self {
        Self { entries }
    }

    /// Routes for every step shipped with the engine.
    pub fn builtin() -> Self {
        Self::new(steps::appearance::routes())
    }

    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose criteria match the event.
    pub fn dispatch(&self, event: &InboundEvent) -> Result<&RoutingEntry, NoRouteError> {
        self.entries
            .iter()
            .find(|e| e.criteria.matches(&event.shape))
            .ok_or_else(|| NoRouteError {
                shape: event.shape.clone(),
            })
    }
}

/// What happened to one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    NoRoute,
    Failed(FailureKind),
}

/// Runs events through the routing table. Every failure ends here: it is logged and reported to
/// the actor.
pub struct Dispatcher {
    table: Arc<RoutingTable>,
    ctx: StepContext,
    step_timeout: Duration,
}

impl Dispatcher {
    pub fn new(table: Arc<RoutingTable>, ctx: StepContext, step_timeout: Duration) -> Self {
        Self {
            table,
            ctx,
            step_timeout,
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub async fn handle(&self, event: &InboundEvent) -> Outcome {
        let entry = match self.table.dispatch(event) {
            Ok(entry) => entry,
            Err(e) => {
                log::info!("{}; ignoring interaction from {}", e, event.user_id);
                return Outcome::NoRoute;
            }
        };
        let step = entry.step.as_ref();
        log::debug!("routing {} to {}", event.shape, step.routing_uid());
        match self.run(step, event).await {
            Ok(()) => Outcome::Completed,
            Err(err) => {
                let kind = err.kind();
                match kind {
                    FailureKind::Unauthorized | FailureKind::NotFound => {
                        log::info!("{} rejected for {}: {}", step.routing_uid(), event.user_id, err)
                    }
                    _ => log::warn!("{} failed for {}: {}", step.routing_uid(), event.user_id, err),
                }
                self.notify(event, kind).await;
                Outcome::Failed(kind)
            }
        }
    }

    /// Static gate, then the step itself under the step timeout.
    async fn run(&self, step: &dyn Step, event: &InboundEvent) -> Result<(), StepError> {
        let required = step.required_capabilities();
        if !required.is_empty() {
            let granted = self
                .ctx
                .permissions
                .actor_capabilities(event.team_id.as_deref(), &event.user_id)
                .await;
            if !auth::authorize(&required, &granted) {
                return Err(StepError::Unauthorized);
            }
        }
        tokio::time::timeout(self.step_timeout, step.process(&self.ctx, event))
            .await
            .map_err(|_| StepError::Timeout)?
    }

    /// Ephemeral notice in the event's channel, or a direct message when the event names none
    /// (view submissions and closes).
    async fn notify(&self, event: &InboundEvent, kind: FailureKind) {
        let chat = &self.ctx.chat;
        let text = kind.notice();
        let sent = match event.channel_id.as_deref() {
            Some(channel_id) => chat.post_ephemeral(channel_id, &event.user_id, text).await,
            None => chat.post_direct(&event.user_id, text).await,
        };
        if let Err(e) = sent {
            log::warn!("failed to notify {} of {:?}: {}", event.user_id, kind, e);
        }
    }
}
