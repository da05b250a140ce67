//! LLM (`OpenAI`-compatible) API client module
//!
//! Talks to any `chat/completions` endpoint, in blocking or streaming mode.

use async_trait::async_trait;
use futures::StreamExt;
use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::sse::{ParseResult, SseParser, StreamEvent};
use super::{CompletionService, DeltaStream};
use crate::errors::BotError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4 + 1
}

/// LLM API client for generating summaries
pub struct LlmClient {
    api_key: String,
    org_id: Option<String>,
    model_name: String,
    base_url: Url,
    http: Client,
}

impl LlmClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        api_key: String,
        org_id: Option<String>,
        model_name: String,
        base_url: Url,
    ) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BotError::HttpError(format!("Failed to build OpenAI HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            org_id,
            model_name,
            base_url,
            http,
        })
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    #[must_use]
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    fn headers(&self, streaming: bool) -> Result<HeaderMap, BotError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.api_key)
            .parse::<HeaderValue>()
            .map_err(|e| BotError::HttpError(format!("Invalid Authorization header: {e}")))?;
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if streaming {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }

        if let Some(org) = &self.org_id {
            let org_value = org.parse::<HeaderValue>().map_err(|e| {
                BotError::HttpError(format!("Invalid OpenAI-Organization header: {e}"))
            })?;
            headers.insert("OpenAI-Organization", org_value);
        }

        Ok(headers)
    }

    fn log_prompt(&self, prompt: &[ChatCompletionMessage], streaming: bool) {
        #[cfg(feature = "debug-logs")]
        info!(streaming, "Using chat prompt:\n{:?}", prompt);

        let estimated_input_tokens = prompt
            .iter()
            .map(|msg| match &msg.content {
                Content::Text(t) => estimate_tokens(t),
                Content::ImageUrl(_) => 0,
            })
            .sum::<usize>();

        info!(
            model = %self.model_name,
            streaming,
            messages = prompt.len(),
            estimated_input_tokens,
            "Requesting chat completion"
        );
    }

    /// Sends one blocking completion request and returns the first choice's text.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the provider answers with a
    /// non-success status, or the response body is not JSON.
    pub async fn generate_summary(
        &self,
        prompt: &[ChatCompletionMessage],
    ) -> Result<Option<String>, BotError> {
        self.log_prompt(prompt, false);

        let request_body = json!({
            "model": self.model_name,
            "messages": build_chat_messages_payload(prompt),
            "stream": false
        });

        let response = self
            .http
            .post(self.chat_completions_url())
            .headers(self.headers(false)?)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| BotError::HttpError(format!("OpenAI API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|e| {
                format!("Failed to read error response body (status {status}): {e}")
            });
            return Err(BotError::OpenAIError(format!(
                "OpenAI API error (status {status}): {error_text}"
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| BotError::OpenAIError(format!("Failed to parse OpenAI response: {e}")))?;

        Ok(extract_first_choice_text(&response_json))
    }

    /// Opens a streaming completion request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the provider answers with a
    /// non-success status before streaming starts.
    pub async fn generate_summary_stream(
        &self,
        prompt: &[ChatCompletionMessage],
    ) -> Result<ActiveStreamingResponse, BotError> {
        self.log_prompt(prompt, true);

        let request_body = json!({
            "model": self.model_name,
            "messages": build_chat_messages_payload(prompt),
            "stream": true
        });

        let response = self
            .http
            .post(self.chat_completions_url())
            .headers(self.headers(true)?)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| BotError::HttpError(format!("OpenAI streaming request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|e| {
                format!("Failed to read error response body (status {status}): {e}")
            });
            return Err(BotError::OpenAIError(format!(
                "OpenAI streaming API error (status {status}): {error_text}"
            )));
        }

        Ok(ActiveStreamingResponse::new(Box::pin(response.bytes_stream())))
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(&self, prompt: &[ChatCompletionMessage]) -> Result<Option<String>, BotError> {
        self.generate_summary(prompt).await
    }

    async fn stream(&self, prompt: &[ChatCompletionMessage]) -> Result<DeltaStream, BotError> {
        let active = self.generate_summary_stream(prompt).await?;
        Ok(active.into_delta_stream())
    }
}

/// Extracts `choices[0].message.content`, treating an empty string as absent.
#[must_use]
pub fn extract_first_choice_text(response: &Value) -> Option<String> {
    response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Type alias for the boxed byte stream.
type ByteStream = Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

/// An active streaming response from the completion endpoint.
pub struct ActiveStreamingResponse {
    byte_stream: ByteStream,
    parser: SseParser,
    pending_results: VecDeque<ParseResult>,
    utf8_buffer: Vec<u8>,
    saw_finish: bool,
    saw_any_text: bool,
    completed: bool,
}

impl std::fmt::Debug for ActiveStreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveStreamingResponse")
            .field("completed", &self.completed)
            .field("saw_finish", &self.saw_finish)
            .field("saw_any_text", &self.saw_any_text)
            .field("pending_results_len", &self.pending_results.len())
            .field("utf8_buffer_len", &self.utf8_buffer.len())
            .finish_non_exhaustive()
    }
}

impl ActiveStreamingResponse {
    fn new(byte_stream: ByteStream) -> Self {
        Self {
            byte_stream,
            parser: SseParser::new(),
            pending_results: VecDeque::new(),
            utf8_buffer: Vec::new(),
            saw_finish: false,
            saw_any_text: false,
            completed: false,
        }
    }

    fn drain_pending_results(&mut self) -> Result<Option<StreamEvent>, BotError> {
        while let Some(result) = self.pending_results.pop_front() {
            match result {
                ParseResult::Event(event) => match event {
                    StreamEvent::TextDelta(ref delta) => {
                        if !delta.is_empty() {
                            self.saw_any_text = true;
                        }
                        return Ok(Some(event));
                    }
                    StreamEvent::Finished(_) => {
                        self.saw_finish = true;
                        return Ok(Some(event));
                    }
                    StreamEvent::Error(_) => {
                        self.completed = true;
                        return Ok(Some(event));
                    }
                },
                ParseResult::Done => {
                    self.completed = true;
                    if self.saw_finish {
                        return Ok(None);
                    }
                    if self.saw_any_text {
                        warn!("OpenAI stream ended with [DONE] before finish_reason; treating as finished");
                        self.saw_finish = true;
                        return Ok(Some(StreamEvent::Finished(None)));
                    }
                    return Err(BotError::OpenAIError(
                        "OpenAI stream ended before any output".to_string(),
                    ));
                }
                ParseResult::Ignored => {
                    debug!("Ignoring OpenAI stream chunk without content");
                }
            }
        }

        Ok(None)
    }

    /// Returns the next stream event, or `None` once the stream is complete.
    ///
    /// # Errors
    ///
    /// Returns an error if there's an HTTP, UTF-8, or premature-end issue.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, BotError> {
        if self.completed {
            return Ok(None);
        }

        loop {
            // Several frames can arrive in one HTTP chunk; never drop parsed results.
            if let Some(event) = self.drain_pending_results()? {
                return Ok(Some(event));
            }
            if self.completed {
                return Ok(None);
            }

            match self.byte_stream.next().await {
                Some(Ok(bytes)) => {
                    // Keep an incomplete trailing UTF-8 sequence buffered until the next chunk.
                    self.utf8_buffer.extend_from_slice(&bytes);

                    match std::str::from_utf8(&self.utf8_buffer) {
                        Ok(valid_str) => {
                            self.pending_results.extend(self.parser.feed(valid_str));
                            self.utf8_buffer.clear();
                        }
                        Err(e) => {
                            let valid_up_to = e.valid_up_to();
                            if valid_up_to > 0 {
                                let prefix = String::from_utf8_lossy(&self.utf8_buffer[..valid_up_to])
                                    .into_owned();
                                self.pending_results.extend(self.parser.feed(&prefix));
                                self.utf8_buffer.drain(..valid_up_to);
                            }

                            if e.error_len().is_some() {
                                self.completed = true;
                                return Err(BotError::OpenAIError(
                                    "Invalid UTF-8 in OpenAI streaming response".to_string(),
                                ));
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    self.completed = true;
                    return Err(BotError::HttpError(format!(
                        "Error reading streaming response: {e}"
                    )));
                }
                None => {
                    self.completed = true;
                    if self.saw_finish {
                        return Ok(None);
                    }
                    if self.saw_any_text {
                        warn!("OpenAI stream closed without [DONE]; treating as finished");
                        self.saw_finish = true;
                        return Ok(Some(StreamEvent::Finished(None)));
                    }
                    return Err(BotError::OpenAIError(
                        "OpenAI stream ended without any output".to_string(),
                    ));
                }
            }
        }
    }

    /// Returns the next non-empty text fragment, or `None` when the model is done.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures and provider error events.
    pub async fn next_text(&mut self) -> Result<Option<String>, BotError> {
        while let Some(event) = self.next_event().await? {
            match event {
                StreamEvent::TextDelta(delta) if delta.is_empty() => {}
                StreamEvent::TextDelta(delta) => return Ok(Some(delta)),
                StreamEvent::Finished(reason) => {
                    debug!(finish_reason = ?reason, "OpenAI stream finished");
                }
                StreamEvent::Error(msg) => {
                    return Err(BotError::OpenAIError(format!(
                        "OpenAI streaming error: {msg}"
                    )));
                }
            }
        }
        Ok(None)
    }

    /// Converts the response into a stream of text fragments.
    #[must_use]
    pub fn into_delta_stream(self) -> DeltaStream {
        futures::stream::unfold(self, |mut active| async move {
            match active.next_text().await {
                Ok(Some(delta)) => Some((Ok(delta), active)),
                Ok(None) => None,
                Err(e) => {
                    active.completed = true;
                    Some((Err(e), active))
                }
            }
        })
        .boxed()
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }
}

/// Build the `messages` array of a chat-completions request.
pub(crate) fn build_chat_messages_payload(prompt: &[ChatCompletionMessage]) -> Vec<Value> {
    prompt
        .iter()
        .filter_map(|m| {
            let role_str = match m.role {
                MessageRole::system => "system",
                MessageRole::user | MessageRole::function | MessageRole::tool => "user",
                MessageRole::assistant => "assistant",
            };

            match &m.content {
                Content::Text(t) => Some(json!({
                    "role": role_str,
                    "content": t
                })),
                Content::ImageUrl(_) => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_from(chunks: Vec<Result<bytes::Bytes, reqwest::Error>>) -> ActiveStreamingResponse {
        ActiveStreamingResponse::new(Box::pin(futures::stream::iter(chunks)))
    }

    fn sse(text: &str) -> Result<bytes::Bytes, reqwest::Error> {
        Ok(bytes::Bytes::from(text.to_string()))
    }

    fn message(role: MessageRole, text: &str) -> ChatCompletionMessage {
        ChatCompletionMessage {
            role,
            content: Content::Text(text.to_string()),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[test]
    fn test_build_chat_messages_payload_maps_roles() {
        let prompt = vec![
            message(MessageRole::system, "policy"),
            message(MessageRole::user, "thread"),
        ];

        let payload = build_chat_messages_payload(&prompt);

        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0]["role"], "system");
        assert_eq!(payload[0]["content"], "policy");
        assert_eq!(payload[1]["role"], "user");
        assert_eq!(payload[1]["content"], "thread");
    }

    #[test]
    fn test_extract_first_choice_text() {
        let response = json!({
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "- point" } },
                { "index": 1, "message": { "role": "assistant", "content": "ignored" } }
            ]
        });
        assert_eq!(
            extract_first_choice_text(&response),
            Some("- point".to_string())
        );
    }

    #[test]
    fn test_extract_first_choice_text_absent_or_empty() {
        assert_eq!(extract_first_choice_text(&json!({ "choices": [] })), None);
        assert_eq!(
            extract_first_choice_text(&json!({ "choices": [{ "message": { "content": "" } }] })),
            None
        );
        assert_eq!(
            extract_first_choice_text(&json!({ "choices": [{ "message": { "content": null } }] })),
            None
        );
    }

    #[test]
    fn test_chat_completions_url_handles_trailing_slash() {
        let with_slash = LlmClient::new(
            "k".to_string(),
            None,
            "m".to_string(),
            Url::parse("https://llm.example.com/v1/").unwrap(),
        )
        .unwrap();
        let without_slash = LlmClient::new(
            "k".to_string(),
            None,
            "m".to_string(),
            Url::parse("https://llm.example.com/v1").unwrap(),
        )
        .unwrap();

        assert_eq!(
            with_slash.chat_completions_url(),
            "https://llm.example.com/v1/chat/completions"
        );
        assert_eq!(
            without_slash.chat_completions_url(),
            "https://llm.example.com/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_next_event_does_not_drop_multiple_events_in_single_chunk() {
        let mut resp = active_from(vec![sse(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" World\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n"
        ))]);

        assert_eq!(
            resp.next_event().await.unwrap(),
            Some(StreamEvent::TextDelta("Hello".to_string()))
        );
        assert_eq!(
            resp.next_event().await.unwrap(),
            Some(StreamEvent::TextDelta(" World".to_string()))
        );
        assert_eq!(
            resp.next_event().await.unwrap(),
            Some(StreamEvent::Finished(Some("stop".to_string())))
        );
        assert_eq!(resp.next_event().await.unwrap(), None);
        assert!(resp.is_completed());
    }

    #[tokio::test]
    async fn test_next_event_handles_utf8_split_across_byte_chunks() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello 世界\"}}]}\n\n";
        let event_bytes = event.as_bytes();
        let split_at = event_bytes
            .iter()
            .position(|b| *b == 0xE4)
            .expect("expected UTF-8 multi-byte sequence in test input");

        let mut resp = active_from(vec![
            Ok(bytes::Bytes::copy_from_slice(&event_bytes[..=split_at])),
            Ok(bytes::Bytes::copy_from_slice(&event_bytes[split_at + 1..])),
        ]);

        assert_eq!(
            resp.next_event().await.unwrap(),
            Some(StreamEvent::TextDelta("Hello 世界".to_string()))
        );
    }

    #[tokio::test]
    async fn test_delta_stream_concatenates_in_arrival_order() {
        let resp = active_from(vec![
            sse("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n"),
            sse("data: {\"choices\":[{\"delta\":{\"content\":\"- a\"}}]}\n\n"),
            sse("data: {\"choices\":[{\"delta\":{\"content\":\"\\n- b\"}}]}\n\ndata: [DONE]\n\n"),
        ]);

        let deltas: Vec<String> = resp
            .into_delta_stream()
            .map(|d| d.unwrap())
            .collect()
            .await;

        assert_eq!(deltas, vec!["- a".to_string(), "\n- b".to_string()]);
    }

    #[tokio::test]
    async fn test_delta_stream_surfaces_error_event_then_ends() {
        let resp = active_from(vec![sse(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"boom\"}}\n\n"
        ))]);

        let items: Vec<Result<String, BotError>> = resp.into_delta_stream().collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        let err = items[1].as_ref().unwrap_err().to_string();
        assert!(err.contains("OpenAI streaming error"));
        assert!(err.contains("boom"));
    }

    #[tokio::test]
    async fn test_done_without_output_is_an_error() {
        let mut resp = active_from(vec![sse("data: [DONE]\n\n")]);

        let err = resp.next_event().await.unwrap_err();
        assert!(err.to_string().contains("ended before any output"));
    }

    #[tokio::test]
    async fn test_premature_close_after_text_is_treated_as_finished() {
        let mut resp = active_from(vec![sse(
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
        )]);

        assert_eq!(resp.next_text().await.unwrap(), Some("partial".to_string()));
        assert_eq!(resp.next_text().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_next_event_errors_on_network_error() {
        let req_err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let mut resp = active_from(vec![Err(req_err)]);

        let err = resp.next_event().await.unwrap_err();
        assert!(err.to_string().contains("Error reading streaming response"));
    }

    #[tokio::test]
    async fn test_next_event_errors_on_invalid_utf8() {
        let mut resp = active_from(vec![Ok(bytes::Bytes::from(vec![0xFF]))]);

        let err = resp.next_event().await.unwrap_err();
        assert!(err.to_string().contains("Invalid UTF-8"));
    }
}
