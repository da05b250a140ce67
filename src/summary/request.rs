//! Calls the completion service in blocking or streaming mode.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use openai_api_rs::v1::chat_completion::ChatCompletionMessage;
use tokio::time::Instant;
use tracing::{debug, info};

use super::present::NO_SUMMARY_PLACEHOLDER;
use crate::ai::CompletionService;
use crate::core::models::SummaryResult;
use crate::errors::BotError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryMode {
    /// One request, one response.
    #[default]
    Blocking,
    /// Incremental deltas, shown as they arrive.
    Streaming,
}

impl FromStr for SummaryMode {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" | "block" => Ok(Self::Blocking),
            "streaming" | "stream" => Ok(Self::Streaming),
            other => Err(BotError::ConfigError(format!(
                "SUMMARY_MODE: unknown value '{other}' (expected blocking|streaming)"
            ))),
        }
    }
}

/// Receives streaming progress.
#[async_trait]
pub trait PartialSink: Send {
    /// Called once, before the first non-empty fragment is accumulated.
    async fn first_fragment(&mut self);

    /// Called with the whole accumulated text so far.
    async fn partial(&mut self, accumulated: &str);
}

/// Single-shot completion; an absent or empty answer becomes the placeholder.
///
/// # Errors
///
/// Returns the completion service's error unchanged.
pub async fn request_blocking(
    service: &dyn CompletionService,
    prompt: &[ChatCompletionMessage],
) -> Result<SummaryResult, BotError> {
    let text = service
        .complete(prompt)
        .await?
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| NO_SUMMARY_PLACEHOLDER.to_string());
    info!(chars = text.len(), "Received blocking completion");
    Ok(SummaryResult::Completed(text))
}

/// Streams a completion, pushing the accumulated text to `sink` after each
/// fragment. With a non-zero `min_update_interval` intermediate pushes are
/// coalesced; the returned result always holds every fragment in arrival order.
///
/// # Errors
///
/// Returns the first error from opening or reading the stream.
pub async fn request_streaming(
    service: &dyn CompletionService,
    prompt: &[ChatCompletionMessage],
    min_update_interval: Duration,
    sink: &mut dyn PartialSink,
) -> Result<SummaryResult, BotError> {
    let mut stream = service.stream(prompt).await?;
    let mut accumulated = String::new();
    let mut started = false;
    let mut last_push: Option<Instant> = None;
    let mut fragments = 0usize;

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        if fragment.is_empty() {
            continue;
        }
        if !started {
            started = true;
            sink.first_fragment().await;
        }
        accumulated.push_str(&fragment);
        fragments += 1;

        let due = min_update_interval.is_zero()
            || last_push.is_none_or(|at| at.elapsed() >= min_update_interval);
        if due {
            sink.partial(&accumulated).await;
            last_push = Some(Instant::now());
        }
    }

    debug!(fragments, chars = accumulated.len(), "Completion stream ended");

    if accumulated.trim().is_empty() {
        return Ok(SummaryResult::Streamed(NO_SUMMARY_PLACEHOLDER.to_string()));
    }
    Ok(SummaryResult::Streamed(accumulated))
}

/// Runs the request in `mode`. In blocking mode `sink` is never called.
///
/// # Errors
///
/// Returns the completion service's error.
pub async fn request_summary(
    service: &dyn CompletionService,
    prompt: &[ChatCompletionMessage],
    mode: SummaryMode,
    min_update_interval: Duration,
    sink: &mut dyn PartialSink,
) -> Result<SummaryResult, BotError> {
    match mode {
        SummaryMode::Blocking => request_blocking(service, prompt).await,
        SummaryMode::Streaming => {
            request_streaming(service, prompt, min_update_interval, sink).await
        }
    }
}
