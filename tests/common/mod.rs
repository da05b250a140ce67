#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content};
use threadtldr::ai::{CompletionService, DeltaStream};
use threadtldr::core::models::ThreadMessage;
use threadtldr::errors::BotError;
use threadtldr::slack::surface::{OutputSurface, SurfaceHandle};
use threadtldr::slack::thread::{ConversationApi, RepliesPage, RepliesRequest};

pub const THREAD_TS: &str = "1700000000.000000";

pub fn message(ts: &str, author: &str, text: &str) -> ThreadMessage {
    ThreadMessage {
        ts: ts.to_string(),
        thread_ts: Some(THREAD_TS.to_string()),
        author_id: author.to_string(),
        text: text.to_string(),
        reactions: Vec::new(),
    }
}

/// A page of `count` messages whose timestamps start at `first_index`.
/// Index 0 is the thread root.
pub fn page(first_index: usize, count: usize, next_cursor: Option<&str>) -> RepliesPage {
    let messages = (first_index..first_index + count)
        .map(|i| {
            let ts = if i == 0 {
                THREAD_TS.to_string()
            } else {
                format!("1700000000.{i:06}")
            };
            message(&ts, &format!("U{}", i % 7), &format!("message number {i}"))
        })
        .collect();

    RepliesPage {
        ok: true,
        messages,
        has_more: next_cursor.is_some(),
        next_cursor: next_cursor.map(str::to_string),
        error: None,
    }
}

#[derive(Default)]
pub struct FakeConversations {
    pages: Mutex<VecDeque<Result<RepliesPage, String>>>,
    join_error: Option<String>,
    replies_delay: Duration,
    pub requests: Mutex<Vec<RepliesRequest>>,
    pub join_calls: AtomicUsize,
}

impl FakeConversations {
    pub fn with_pages(pages: Vec<RepliesPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    pub fn failing_join(mut self, error: &str) -> Self {
        self.join_error = Some(error.to_string());
        self
    }

    /// Each `conversations.replies` call takes `delay` before answering.
    pub fn slow_replies(mut self, delay: Duration) -> Self {
        self.replies_delay = delay;
        self
    }

    pub fn then_error(self, error: &str) -> Self {
        self.pages.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn replies_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ConversationApi for FakeConversations {
    async fn join_channel(&self, _channel_id: &str) -> Result<(), BotError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        match &self.join_error {
            Some(code) => Err(BotError::ApiError(format!("conversations.join error: {code}"))),
            None => Ok(()),
        }
    }

    async fn replies(&self, request: &RepliesRequest) -> Result<RepliesPage, BotError> {
        tokio::time::sleep(self.replies_delay).await;
        self.requests.lock().unwrap().push(request.clone());
        match self.pages.lock().unwrap().pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(error)) => Err(BotError::ApiError(error)),
            None => Err(BotError::ApiError("no more scripted pages".to_string())),
        }
    }
}

pub enum Scripted {
    Text(Option<String>),
    Fragments(Vec<String>),
    Fail(String),
}

pub struct FakeCompletion {
    script: Scripted,
    delay: Duration,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub prompts: Mutex<Vec<Vec<ChatCompletionMessage>>>,
}

impl FakeCompletion {
    pub fn new(script: Scripted) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Scripted::Text(Some(text.to_string())))
    }

    pub fn streaming(fragments: &[&str]) -> Self {
        Self::new(Scripted::Fragments(
            fragments.iter().map(|f| (*f).to_string()).collect(),
        ))
    }

    /// Blocking answers arrive after `delay`; streamed fragments each wait `delay`.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst) + self.stream_calls.load(Ordering::SeqCst)
    }

    /// Text of the last message of the last prompt.
    pub fn last_user_text(&self) -> Option<String> {
        let prompts = self.prompts.lock().unwrap();
        let last = prompts.last()?.last()?;
        match &last.content {
            Content::Text(text) => Some(text.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, prompt: &[ChatCompletionMessage]) -> Result<Option<String>, BotError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_vec());
        tokio::time::sleep(self.delay).await;
        match &self.script {
            Scripted::Text(text) => Ok(text.clone()),
            Scripted::Fragments(fragments) => Ok(Some(fragments.concat())),
            Scripted::Fail(error) => Err(BotError::OpenAIError(error.clone())),
        }
    }

    async fn stream(&self, prompt: &[ChatCompletionMessage]) -> Result<DeltaStream, BotError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_vec());
        match &self.script {
            Scripted::Fragments(fragments) => {
                let delay = self.delay;
                Ok(futures::stream::iter(fragments.clone())
                    .then(move |fragment| async move {
                        tokio::time::sleep(delay).await;
                        Ok::<_, BotError>(fragment)
                    })
                    .boxed())
            }
            Scripted::Text(text) => {
                Ok(futures::stream::iter(text.clone().into_iter().map(Ok)).boxed())
            }
            Scripted::Fail(error) => Err(BotError::OpenAIError(error.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Open(String),
    Update(String),
}

impl Write {
    pub fn text(&self) -> &str {
        match self {
            Self::Open(text) | Self::Update(text) => text,
        }
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    pub writes: Mutex<Vec<Write>>,
    pub fail_open: bool,
}

impl RecordingSurface {
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.writes()
            .iter()
            .filter(|w| matches!(w, Write::Update(_)))
            .count()
    }

    pub fn last_text(&self) -> Option<String> {
        self.writes().last().map(|w| w.text().to_string())
    }
}

#[async_trait]
impl OutputSurface for RecordingSurface {
    async fn open(&self, text: &str) -> Result<SurfaceHandle, BotError> {
        if self.fail_open {
            return Err(BotError::ApiError("response_url POST failed: status=404".to_string()));
        }
        self.writes.lock().unwrap().push(Write::Open(text.to_string()));
        Ok(SurfaceHandle::ResponseUrl)
    }

    async fn update(&self, _handle: &SurfaceHandle, text: &str) -> Result<(), BotError> {
        self.writes.lock().unwrap().push(Write::Update(text.to_string()));
        Ok(())
    }
}
