//! Thread retrieval: channel join plus exhaustive `conversations.replies` pagination.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::core::models::{ThreadMessage, ThreadSnapshot};
use crate::errors::BotError;

/// Maximum page size accepted by `conversations.replies`.
pub const REPLIES_PAGE_LIMIT: u16 = 1000;

const ERROR_NOT_IN_CHANNEL: &str = "not_in_channel";
const ERROR_CHANNEL_NOT_FOUND: &str = "channel_not_found";
const ERROR_METHOD_NOT_SUPPORTED: &str = "method_not_supported_for_channel_type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepliesRequest {
    pub channel: String,
    pub ts: String,
    pub limit: u16,
    pub cursor: Option<String>,
}

/// One page of a `conversations.replies` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepliesPage {
    pub ok: bool,
    pub messages: Vec<ThreadMessage>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub error: Option<String>,
}

/// The slice of the Slack Web API the fetcher depends on.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn join_channel(&self, channel_id: &str) -> Result<(), BotError>;

    async fn replies(&self, request: &RepliesRequest) -> Result<RepliesPage, BotError>;
}

/// What to do when joining the channel before the fetch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinPolicy {
    /// A join failure ends the job with a classified error.
    #[default]
    Required,
    /// A join failure is logged and the fetch is attempted anyway.
    BestEffort,
}

impl FromStr for JoinPolicy {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "required" | "strict" => Ok(Self::Required),
            "best_effort" | "tolerant" => Ok(Self::BestEffort),
            other => Err(BotError::ConfigError(format!(
                "JOIN_POLICY: unknown value '{other}' (expected required|best_effort)"
            ))),
        }
    }
}

/// Classified reasons a thread could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The bot is not a member of the channel.
    NotInChannel,
    /// Private channel or DM the bot cannot join or read.
    ChannelInaccessible,
    /// Slack reported more pages without supplying a cursor.
    MissingCursor,
    /// Anything else, with the transport's message verbatim.
    Other(String),
}

impl FetchFailure {
    /// Classifies a transport error by the Slack error code embedded in its text.
    #[must_use]
    pub fn classify(error_text: &str) -> Self {
        if error_text.contains(ERROR_NOT_IN_CHANNEL) {
            Self::NotInChannel
        } else if error_text.contains(ERROR_CHANNEL_NOT_FOUND)
            || error_text.contains(ERROR_METHOD_NOT_SUPPORTED)
        {
            Self::ChannelInaccessible
        } else {
            Self::Other(error_text.to_string())
        }
    }

    /// Text shown to the user who triggered the job.
    #[must_use]
    pub fn user_message(&self, bot_user_id: Option<&str>) -> String {
        let bot = bot_user_id.map_or_else(|| "the bot".to_string(), |id| format!("<@{id}>"));
        match self {
            Self::NotInChannel => {
                format!(":x: Please add {bot} to the channel to summarize the thread.")
            }
            Self::ChannelInaccessible => format!(
                ":x: This looks like a private channel or DM that I can't join. Please add {bot} to the channel to summarize the thread."
            ),
            Self::MissingCursor => {
                ":x: Error fetching thread: Slack reported more messages but no pagination cursor."
                    .to_string()
            }
            Self::Other(detail) => format!(":x: Error fetching thread: {detail}"),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInChannel => f.write_str("bot is not a member of the channel"),
            Self::ChannelInaccessible => f.write_str("channel not found or unsupported type"),
            Self::MissingCursor => {
                f.write_str("Missing pagination cursor while more messages exist")
            }
            Self::Other(detail) => f.write_str(detail),
        }
    }
}

impl std::error::Error for FetchFailure {}

impl From<BotError> for FetchFailure {
    fn from(error: BotError) -> Self {
        Self::classify(&error.to_string())
    }
}

/// Pages through `conversations.replies` until Slack reports no more messages.
///
/// Messages are concatenated in the order received; nothing is re-sorted.
///
/// # Errors
///
/// Returns `FetchFailure::MissingCursor` if a page claims more data without a
/// cursor, or the classified transport error of the first failing call.
pub async fn fetch_entire_thread<A>(
    api: &A,
    channel_id: &str,
    thread_ts: &str,
) -> Result<ThreadSnapshot, FetchFailure>
where
    A: ConversationApi + ?Sized,
{
    let mut all_messages: Vec<ThreadMessage> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let request = RepliesRequest {
            channel: channel_id.to_string(),
            ts: thread_ts.to_string(),
            limit: REPLIES_PAGE_LIMIT,
            cursor: cursor.take(),
        };

        let page = api.replies(&request).await.map_err(|e| {
            error!(channel = channel_id, thread_ts, "Error fetching thread messages: {}", e);
            FetchFailure::from(e)
        })?;
        pages += 1;

        if !page.ok {
            let code = page.error.as_deref().unwrap_or("unknown");
            error!(channel = channel_id, thread_ts, "conversations.replies returned error: {}", code);
            return Err(FetchFailure::classify(&format!(
                "Failed to fetch thread: {code}"
            )));
        }

        debug!(
            channel = channel_id,
            page = pages,
            count = page.messages.len(),
            has_more = page.has_more,
            "Fetched replies page"
        );
        all_messages.extend(page.messages);

        if !page.has_more {
            break;
        }

        match page.next_cursor.filter(|c| !c.is_empty()) {
            Some(next) => cursor = Some(next),
            None => {
                error!(channel = channel_id, thread_ts, "Missing pagination cursor while more messages exist");
                return Err(FetchFailure::MissingCursor);
            }
        }
    }

    info!(
        channel = channel_id,
        thread_ts,
        pages,
        messages = all_messages.len(),
        "Fetched entire thread"
    );

    Ok(ThreadSnapshot::new(
        channel_id.to_string(),
        thread_ts.to_string(),
        all_messages,
    ))
}

/// Joins the channel (per `policy`) and fetches the whole thread.
///
/// # Errors
///
/// Returns the classified join failure under `JoinPolicy::Required`, or any
/// failure of [`fetch_entire_thread`].
pub async fn fetch_thread<A>(
    api: &A,
    channel_id: &str,
    thread_ts: &str,
    policy: JoinPolicy,
) -> Result<ThreadSnapshot, FetchFailure>
where
    A: ConversationApi + ?Sized,
{
    if let Err(e) = api.join_channel(channel_id).await {
        match policy {
            JoinPolicy::Required => {
                error!(channel = channel_id, "Failed to join channel: {}", e);
                return Err(FetchFailure::from(e));
            }
            JoinPolicy::BestEffort => {
                warn!(channel = channel_id, "Failed to join channel, fetching anyway: {}", e);
            }
        }
    }

    fetch_entire_thread(api, channel_id, thread_ts).await
}
