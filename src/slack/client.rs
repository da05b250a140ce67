//! Slack API client module
//!
//! Encapsulates the Slack Web API calls the bot makes: channel join, thread
//! replies, message posting/updating, `response_url` replies and modal views.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use slack_morphism::hyper_tokio::{SlackClientHyperConnector, SlackHyperClient};
use slack_morphism::{SlackApiToken, SlackApiTokenValue};
use std::time::Duration;
use tracing::{debug, warn};

use super::thread::{ConversationApi, RepliesPage, RepliesRequest, REPLIES_PAGE_LIMIT};
use crate::core::models::{Reaction, ThreadMessage};
use crate::errors::BotError;

const SLACK_API_BASE: &str = "https://slack.com/api";

// Build the Slack client connector safely without panicking.
// If connector construction fails, store None and surface a BotError at call sites.
static SLACK_CLIENT: std::sync::LazyLock<Option<SlackHyperClient>> =
    std::sync::LazyLock::new(|| match SlackClientHyperConnector::new() {
        Ok(connector) => Some(SlackHyperClient::new(connector)),
        Err(e) => {
            warn!("Failed to create Slack HTTP connector: {}", e);
            None
        }
    });

static HTTP_CLIENT: std::sync::LazyLock<Client> = std::sync::LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
});

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<WireMessage>,
    #[serde(default)]
    has_more: bool,
    response_metadata: Option<ResponseMetadata>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    ts: String,
    thread_ts: Option<String>,
    user: Option<String>,
    bot_id: Option<String>,
    text: Option<String>,
    #[serde(default)]
    reactions: Vec<WireReaction>,
}

#[derive(Debug, Deserialize)]
struct WireReaction {
    name: String,
    #[serde(default)]
    count: u32,
}

impl From<WireMessage> for ThreadMessage {
    fn from(msg: WireMessage) -> Self {
        let author_id = msg
            .user
            .or(msg.bot_id)
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            ts: msg.ts,
            thread_ts: msg.thread_ts,
            author_id,
            text: msg.text.unwrap_or_default(),
            reactions: msg
                .reactions
                .into_iter()
                .map(|r| Reaction {
                    name: r.name,
                    count: r.count,
                })
                .collect(),
        }
    }
}

impl From<RepliesResponse> for RepliesPage {
    fn from(resp: RepliesResponse) -> Self {
        Self {
            ok: resp.ok,
            messages: resp.messages.into_iter().map(ThreadMessage::from).collect(),
            has_more: resp.has_more,
            next_cursor: resp
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty()),
            error: resp.error,
        }
    }
}

/// Parses a raw `conversations.replies` body into a page.
///
/// # Errors
///
/// Returns `BotError::ParseError` if the body is not a replies response.
pub fn parse_replies_body(body: &str) -> Result<RepliesPage, BotError> {
    let resp: RepliesResponse = serde_json::from_str(body)
        .map_err(|e| BotError::ParseError(format!("conversations.replies parse: {e}")))?;
    Ok(resp.into())
}

/// Slack API client
pub struct SlackClient {
    token: SlackApiToken,
}

impl SlackClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token: SlackApiToken::new(SlackApiTokenValue::new(token)),
        }
    }

    /// Posts `payload` to a Web API method and returns the body when `ok` is true.
    async fn call_api(&self, method: &str, payload: &Value) -> Result<Value, BotError> {
        let resp = HTTP_CLIENT
            .post(format!("{SLACK_API_BASE}/{method}"))
            .bearer_auth(&self.token.token_value.0)
            .json(payload)
            .send()
            .await
            .map_err(|e| BotError::HttpError(format!("{method} request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(BotError::ApiError(format!("{method} HTTP {}", resp.status())));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| BotError::ParseError(format!("{method} JSON parse error: {e}")))?;

        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            return Err(BotError::ApiError(format!(
                "{method} error: {}",
                body.get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            )));
        }

        Ok(body)
    }

    /// # Errors
    ///
    /// Returns an error if the connector is unavailable or `auth.test` fails.
    pub async fn get_bot_user_id(&self) -> Result<String, BotError> {
        let session = SLACK_CLIENT
            .as_ref()
            .ok_or_else(|| BotError::GeneralError("Slack HTTP connector not initialized".to_string()))?
            .open_session(&self.token);

        let test_resp = session.auth_test().await?;
        Ok(test_resp.user_id.0)
    }

    /// Posts a reply into a thread and returns the new message's `ts`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or Slack returns an error.
    pub async fn post_message_in_thread(
        &self,
        channel_id: &str,
        thread_ts: &str,
        message: &str,
    ) -> Result<String, BotError> {
        let payload = json!({
            "channel": channel_id,
            "text": message,
            "thread_ts": thread_ts,
        });

        let body = self.call_api("chat.postMessage", &payload).await?;
        body.get("ts")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BotError::ApiError("chat.postMessage: no ts in response".to_string()))
    }

    /// Replaces the text of an existing message via `chat.update`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Slack API request or response parsing fails.
    pub async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), BotError> {
        let payload = json!({
            "channel": channel_id,
            "ts": ts,
            "text": text,
        });

        self.call_api("chat.update", &payload).await.map(|_| ())
    }

    /// Sends a message through an interaction's `response_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or Slack rejects the payload.
    pub async fn post_response_url(&self, response_url: &str, payload: &Value) -> Result<(), BotError> {
        let resp = HTTP_CLIENT
            .post(response_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| BotError::HttpError(format!("response_url POST failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(BotError::ApiError(format!(
                "response_url POST failed: status={status} body={body_text}"
            )));
        }

        Ok(())
    }

    /// Opens a modal and returns its view id.
    ///
    /// # Errors
    ///
    /// Returns an error if the Slack API request or response parsing fails.
    pub async fn open_view(&self, trigger_id: &str, view: &Value) -> Result<String, BotError> {
        let payload = json!({
            "trigger_id": trigger_id,
            "view": view
        });

        let body = self.call_api("views.open", &payload).await?;
        body.get("view")
            .and_then(|v| v.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BotError::ApiError("views.open: no view id in response".to_string()))
    }

    /// # Errors
    ///
    /// Returns an error if the Slack API request or response parsing fails.
    pub async fn update_view(&self, view_id: &str, view: &Value) -> Result<(), BotError> {
        let payload = json!({
            "view_id": view_id,
            "view": view
        });

        self.call_api("views.update", &payload).await.map(|_| ())
    }
}

#[async_trait]
impl ConversationApi for SlackClient {
    async fn join_channel(&self, channel_id: &str) -> Result<(), BotError> {
        let payload = json!({ "channel": channel_id });
        let body = self.call_api("conversations.join", &payload).await?;

        if let Some(warning) = body.get("warning").and_then(Value::as_str) {
            debug!(channel = channel_id, warning, "conversations.join warning");
        }
        Ok(())
    }

    async fn replies(&self, request: &RepliesRequest) -> Result<RepliesPage, BotError> {
        let limit = request.limit.min(REPLIES_PAGE_LIMIT).to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("channel", request.channel.as_str()),
            ("ts", request.ts.as_str()),
            ("limit", limit.as_str()),
        ];
        if let Some(cursor) = request.cursor.as_deref() {
            query.push(("cursor", cursor));
        }

        let resp = HTTP_CLIENT
            .get(format!("{SLACK_API_BASE}/conversations.replies"))
            .bearer_auth(&self.token.token_value.0)
            .query(&query)
            .send()
            .await
            .map_err(|e| BotError::HttpError(format!("conversations.replies request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(BotError::ApiError(format!(
                "conversations.replies HTTP {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| BotError::HttpError(format!("conversations.replies body: {e}")))?;

        parse_replies_body(&body)
    }
}
