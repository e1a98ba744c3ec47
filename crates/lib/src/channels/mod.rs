//! Chat platform boundary (Slack).
//!
//! Inbound interaction payloads are parsed into [`InboundEvent`]s; steps talk back to the
//! platform through the [`ChatClient`] trait, implemented for the Slack Web API by [`SlackClient`].

mod client;
mod inbound;
mod slack;

pub use client::{ChatClient, MessageUpdate, ModalView, PlainText, TransportError};
pub use inbound::{
    BlockActionType, EventShape, InboundError, InboundEvent, InteractiveMessageActionType,
    PayloadType,
};
pub use slack::{SlackClient, SLACK_API_BASE};
