//! Slack Web API client: views.open, chat.update, chat.postEphemeral and chat.postMessage.

use crate::channels::client::{ChatClient, MessageUpdate, ModalView, TransportError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API client authenticated with a bot token.
#[derive(Clone)]
pub struct SlackClient {
    api_base: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(
        token: Option<String>,
        api_base: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let api_base = api_base
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| SLACK_API_BASE.to_string());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            api_base,
            token,
            client,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// POST a JSON body to a Web API method and check the `ok` envelope.
    async fn call(&self, method: &'static str, body: &Value) -> Result<(), TransportError> {
        let token = self.token.as_ref().ok_or(TransportError::MissingToken)?;
        let url = format!("{}/{}", self.api_base, method);
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|source| TransportError::Request { method, source })?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                method,
                status,
                body,
            });
        }
        let envelope: SlackEnvelope = res
            .json()
            .await
            .map_err(|source| TransportError::Request { method, source })?;
        if !envelope.ok {
            return Err(TransportError::Api {
                method,
                error: envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
            });
        }
        log::debug!("slack {} ok", method);
        Ok(())
    }
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), TransportError> {
        let body = json!({ "trigger_id": trigger_id, "view": view });
        self.call("views.open", &body).await
    }

    async fn update_message(&self, update: &MessageUpdate) -> Result<(), TransportError> {
        let body = json!(update);
        self.call("chat.update", &body).await
    }

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        let body = json!({ "channel": channel_id, "user": user_id, "text": text });
        self.call("chat.postEphemeral", &body).await
    }

    async fn post_direct(&self, user_id: &str, text: &str) -> Result<(), TransportError> {
        // A user id as the channel opens (or reuses) the bot's DM with that user.
        let body = json!({ "channel": user_id, "text": text });
        self.call("chat.postMessage", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_base: Option<&str>) -> SlackClient {
        SlackClient::new(None, api_base.map(str::to_string), Duration::from_secs(1))
            .expect("build slack client")
    }

    #[test]
    fn api_base_defaults_and_trims() {
        assert_eq!(client(None).api_base(), SLACK_API_BASE);
        assert_eq!(client(Some("  ")).api_base(), SLACK_API_BASE);
        assert_eq!(
            client(Some("http://127.0.0.1:9/api/")).api_base(),
            "http://127.0.0.1:9/api"
        );
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let client = client(None);
        let err = client.post_ephemeral("C1", "U1", "hi").await.unwrap_err();
        assert!(matches!(err, TransportError::MissingToken));
        let err = client.post_direct("U1", "hi").await.unwrap_err();
        assert!(matches!(err, TransportError::MissingToken));
    }
}
