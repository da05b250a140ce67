//! All AI/LLM functionality

pub mod client;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;
use openai_api_rs::v1::chat_completion::ChatCompletionMessage;

use crate::errors::BotError;

// Re-export main types for convenience
pub use client::{ActiveStreamingResponse, LlmClient, estimate_tokens};
pub use sse::{ParseResult, SseParser, StreamEvent};

/// Text fragments of a streamed completion, in arrival order.
pub type DeltaStream = BoxStream<'static, Result<String, BotError>>;

/// A language-model completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// One request, one response: the first choice's text, if any.
    async fn complete(&self, prompt: &[ChatCompletionMessage]) -> Result<Option<String>, BotError>;

    /// Opens an incremental response.
    async fn stream(&self, prompt: &[ChatCompletionMessage]) -> Result<DeltaStream, BotError>;
}
