//! Output surfaces: the places a job writes its progress and final summary.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::client::SlackClient;
use super::modal_builder::build_summary_modal;
use super::response_builder::{create_ephemeral_payload, create_replace_payload};
use crate::core::models::SurfaceTarget;
use crate::errors::BotError;

/// Which surface new jobs write to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SurfaceKind {
    #[default]
    ResponseUrl,
    Thread,
    Modal,
}

impl FromStr for SurfaceKind {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "response_url" | "ephemeral" => Ok(Self::ResponseUrl),
            "thread" | "thread_reply" => Ok(Self::Thread),
            "modal" => Ok(Self::Modal),
            other => Err(BotError::ConfigError(format!(
                "OUTPUT_SURFACE: unknown value '{other}' (expected response_url|thread|modal)"
            ))),
        }
    }
}

/// Identifies what an [`OutputSurface`] opened, so later writes replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceHandle {
    /// Responses through a `response_url` replace the original in place.
    ResponseUrl,
    Message { channel_id: String, ts: String },
    View { view_id: String },
}

/// Slack accepts at most this many posts to one `response_url`.
pub const RESPONSE_URL_POST_LIMIT: usize = 5;

/// A place to show one job's progress and result.
///
/// `update` may be called any number of times with cumulative text; each call
/// replaces what the surface shows. `finish` is the job's single terminal write.
#[async_trait]
pub trait OutputSurface: Send + Sync {
    async fn open(&self, text: &str) -> Result<SurfaceHandle, BotError>;

    async fn update(&self, handle: &SurfaceHandle, text: &str) -> Result<(), BotError>;

    async fn finish(&self, handle: &SurfaceHandle, text: &str) -> Result<(), BotError> {
        self.update(handle, text).await
    }
}

/// Caps the writes made through `inner` at `limit`, keeping the last one for
/// `finish`. Intermediate updates past the cap are dropped.
pub struct BudgetedSurface {
    inner: Arc<dyn OutputSurface>,
    limit: usize,
    used: AtomicUsize,
}

impl BudgetedSurface {
    #[must_use]
    pub fn new(inner: Arc<dyn OutputSurface>, limit: usize) -> Self {
        Self {
            inner,
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Writes made through the inner surface so far.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    fn take_intermediate(&self) -> bool {
        let reserved = self.limit.saturating_sub(1);
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < reserved).then_some(used + 1)
            })
            .is_ok()
    }
}

#[async_trait]
impl OutputSurface for BudgetedSurface {
    async fn open(&self, text: &str) -> Result<SurfaceHandle, BotError> {
        self.used.fetch_add(1, Ordering::SeqCst);
        self.inner.open(text).await
    }

    async fn update(&self, handle: &SurfaceHandle, text: &str) -> Result<(), BotError> {
        if !self.take_intermediate() {
            debug!(limit = self.limit, "Write budget spent; skipping update");
            return Ok(());
        }
        self.inner.update(handle, text).await
    }

    async fn finish(&self, handle: &SurfaceHandle, text: &str) -> Result<(), BotError> {
        self.used.fetch_add(1, Ordering::SeqCst);
        self.inner.finish(handle, text).await
    }
}

/// Ephemeral replies through the interaction's `response_url`.
pub struct ResponseUrlSurface {
    client: Arc<SlackClient>,
    response_url: String,
}

impl ResponseUrlSurface {
    #[must_use]
    pub fn new(client: Arc<SlackClient>, response_url: String) -> Self {
        Self {
            client,
            response_url,
        }
    }
}

#[async_trait]
impl OutputSurface for ResponseUrlSurface {
    async fn open(&self, text: &str) -> Result<SurfaceHandle, BotError> {
        self.client
            .post_response_url(&self.response_url, &create_ephemeral_payload(text))
            .await?;
        Ok(SurfaceHandle::ResponseUrl)
    }

    async fn update(&self, _handle: &SurfaceHandle, text: &str) -> Result<(), BotError> {
        self.client
            .post_response_url(&self.response_url, &create_replace_payload(text))
            .await
    }
}

/// A bot reply inside the summarized thread, edited in place.
pub struct ThreadReplySurface {
    client: Arc<SlackClient>,
    channel_id: String,
    thread_ts: String,
}

impl ThreadReplySurface {
    #[must_use]
    pub fn new(client: Arc<SlackClient>, channel_id: String, thread_ts: String) -> Self {
        Self {
            client,
            channel_id,
            thread_ts,
        }
    }
}

#[async_trait]
impl OutputSurface for ThreadReplySurface {
    async fn open(&self, text: &str) -> Result<SurfaceHandle, BotError> {
        let ts = self
            .client
            .post_message_in_thread(&self.channel_id, &self.thread_ts, text)
            .await?;
        debug!(channel = %self.channel_id, ts = %ts, "Opened thread reply surface");
        Ok(SurfaceHandle::Message {
            channel_id: self.channel_id.clone(),
            ts,
        })
    }

    async fn update(&self, handle: &SurfaceHandle, text: &str) -> Result<(), BotError> {
        match handle {
            SurfaceHandle::Message { channel_id, ts } => {
                self.client.update_message(channel_id, ts, text).await
            }
            other => Err(BotError::GeneralError(format!(
                "thread reply surface cannot update {other:?}"
            ))),
        }
    }
}

/// A modal opened with the interaction's `trigger_id`.
pub struct ModalSurface {
    client: Arc<SlackClient>,
    trigger_id: String,
}

impl ModalSurface {
    #[must_use]
    pub fn new(client: Arc<SlackClient>, trigger_id: String) -> Self {
        Self { client, trigger_id }
    }
}

#[async_trait]
impl OutputSurface for ModalSurface {
    async fn open(&self, text: &str) -> Result<SurfaceHandle, BotError> {
        let view_id = self
            .client
            .open_view(&self.trigger_id, &build_summary_modal(text))
            .await?;
        Ok(SurfaceHandle::View { view_id })
    }

    async fn update(&self, handle: &SurfaceHandle, text: &str) -> Result<(), BotError> {
        match handle {
            SurfaceHandle::View { view_id } => {
                self.client
                    .update_view(view_id, &build_summary_modal(text))
                    .await
            }
            other => Err(BotError::GeneralError(format!(
                "modal surface cannot update {other:?}"
            ))),
        }
    }
}

/// Builds the surface a job's target points at.
#[must_use]
pub fn surface_for(client: Arc<SlackClient>, target: &SurfaceTarget) -> Arc<dyn OutputSurface> {
    match target {
        SurfaceTarget::ResponseUrl { response_url } => Arc::new(BudgetedSurface::new(
            Arc::new(ResponseUrlSurface::new(client, response_url.clone())),
            RESPONSE_URL_POST_LIMIT,
        )),
        SurfaceTarget::ThreadReply {
            channel_id,
            thread_ts,
        } => Arc::new(ThreadReplySurface::new(
            client,
            channel_id.clone(),
            thread_ts.clone(),
        )),
        SurfaceTarget::Modal { trigger_id } => {
            Arc::new(ModalSurface::new(client, trigger_id.clone()))
        }
    }
}
