//! Outbound chat client: the fixed set of calls steps make against the chat platform.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("slack bot token not configured")]
    MissingToken,
    #[error("building slack http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("slack request {method} failed: {source}")]
    Request {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack {method} returned http {status}: {body}")]
    Status {
        method: &'static str,
        status: u16,
        body: String,
    },
    #[error("slack {method} responded with error `{error}`")]
    Api { method: &'static str, error: String },
}

/// `{ "type": "plain_text", "text": ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlainText {
    #[serde(rename = "type")]
    pub typ: &'static str,
    pub text: String,
}

impl PlainText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            typ: "plain_text",
            text: text.into(),
        }
    }
}

/// Modal view body for `views.open`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub typ: &'static str,
    pub callback_id: String,
    pub title: PlainText,
    pub blocks: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<PlainText>,
    pub private_metadata: String,
}

impl ModalView {
    pub fn new(
        callback_id: impl Into<String>,
        title: impl Into<String>,
        blocks: Vec<Value>,
        private_metadata: String,
    ) -> Self {
        Self {
            typ: "modal",
            callback_id: callback_id.into(),
            title: PlainText::new(title),
            blocks,
            submit: None,
            private_metadata,
        }
    }

    pub fn with_submit(mut self, label: impl Into<String>) -> Self {
        self.submit = Some(PlainText::new(label));
        self
    }
}

/// Body for `chat.update`: replace a message's attachments and blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageUpdate {
    pub channel: String,
    pub ts: String,
    pub attachments: Value,
    pub blocks: Value,
}

/// Calls the engine makes against the chat platform. Implementations own transport, auth and
/// any retry policy; the engine never retries.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Open a modal in response to the interaction identified by `trigger_id`.
    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), TransportError>;

    /// Replace the content of an existing message.
    async fn update_message(&self, update: &MessageUpdate) -> Result<(), TransportError>;

    /// Show a message only `user_id` can see in `channel_id`.
    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Send `text` to `user_id` as a direct message from the bot. Used when the interaction
    /// names no channel, e.g. a view submission.
    async fn post_direct(&self, user_id: &str, text: &str) -> Result<(), TransportError>;
}
