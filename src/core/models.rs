use serde::{Deserialize, Serialize};

/// One emoji reaction on a message, in the order Slack reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    pub count: u32,
}

/// A single message of a thread as returned by `conversations.replies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub ts: String,
    pub thread_ts: Option<String>,
    pub author_id: String,
    pub text: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl ThreadMessage {
    #[must_use]
    pub fn is_root_of(&self, thread_ts: &str) -> bool {
        self.ts == thread_ts
    }
}

/// The complete, server-ordered message list of one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSnapshot {
    channel_id: String,
    thread_ts: String,
    messages: Vec<ThreadMessage>,
}

impl ThreadSnapshot {
    #[must_use]
    pub fn new(channel_id: String, thread_ts: String, messages: Vec<ThreadMessage>) -> Self {
        Self {
            channel_id,
            thread_ts,
            messages,
        }
    }

    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    #[must_use]
    pub fn thread_ts(&self) -> &str {
        &self.thread_ts
    }

    #[must_use]
    pub fn messages(&self) -> &[ThreadMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Thread text handed to the language model, one line per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedThreadText(String);

impl RenderedThreadText {
    #[must_use]
    pub fn new(text: String) -> Self {
        Self(text)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.0.lines().count()
    }
}

/// Where a job writes its progress and result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceTarget {
    /// Ephemeral response through the shortcut's `response_url`.
    ResponseUrl { response_url: String },
    /// A bot reply inside the summarized thread.
    ThreadReply { channel_id: String, thread_ts: String },
    /// A modal opened with the shortcut's `trigger_id`.
    Modal { trigger_id: String },
}

/// State of one user-triggered summarization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationJob {
    pub correlation_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub thread_ts: String,
    pub target: SurfaceTarget,
}

impl SummarizationJob {
    #[must_use]
    pub fn new(user_id: String, channel_id: String, thread_ts: String, target: SurfaceTarget) -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            channel_id,
            thread_ts,
            target,
        }
    }
}

/// Raw model output before presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryResult {
    Completed(String),
    Streamed(String),
}

impl SummaryResult {
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Completed(text) | Self::Streamed(text) => text,
        }
    }
}
