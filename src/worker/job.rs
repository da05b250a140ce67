//! The summarization job: one sequential procedure from fetch to final write.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::ai::CompletionService;
use crate::core::config::AppConfig;
use crate::core::models::SummarizationJob;
use crate::errors::BotError;
use crate::prompt::PromptTemplate;
use crate::slack::surface::{OutputSurface, SurfaceHandle};
use crate::slack::thread::{ConversationApi, FetchFailure, JoinPolicy, fetch_thread};
use crate::summary::heartbeat::{Heartbeat, HeartbeatSettings};
use crate::summary::present::Presenter;
use crate::summary::render::render_thread;
use crate::summary::request::{PartialSink, SummaryMode, request_summary};

pub const AI_PROVIDER_FAILURE_MESSAGE: &str = ":x: Error whilst calling AI provider (probably because of rate limiting). Please try again in 2-3 minutes.";

#[must_use]
pub fn progress_text(message_count: usize) -> String {
    format!(":safari-loading: Summarizing {message_count} messages...")
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("thread fetch failed: {0}")]
    Fetch(#[from] FetchFailure),

    #[error("completion failed: {0}")]
    Completion(#[source] BotError),
}

impl JobError {
    /// Text written to the surface when the job ends with this error.
    #[must_use]
    pub fn user_message(&self, bot_user_id: Option<&str>) -> String {
        match self {
            Self::Fetch(failure) => failure.user_message(bot_user_id),
            Self::Completion(_) => AI_PROVIDER_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Summarized {
        text: String,
        message_count: usize,
        rendered_lines: usize,
    },
    Failed(JobError),
    /// The surface could not be opened, so nothing was shown to the user.
    SurfaceUnavailable(BotError),
}

#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    pub mode: SummaryMode,
    pub join_policy: JoinPolicy,
    pub heartbeat: HeartbeatSettings,
    pub stream_min_update_interval: Duration,
    pub bot_user_id: Option<String>,
}

impl SummarizerSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig, bot_user_id: Option<String>) -> Self {
        Self {
            mode: config.summary_mode,
            join_policy: config.join_policy,
            heartbeat: HeartbeatSettings::with_interval(config.heartbeat_interval),
            stream_min_update_interval: config.stream_min_update_interval,
            bot_user_id,
        }
    }
}

/// Everything a job needs, built once at startup and shared by all jobs.
pub struct Summarizer {
    conversations: Arc<dyn ConversationApi>,
    completions: Arc<dyn CompletionService>,
    prompt: Arc<PromptTemplate>,
    settings: SummarizerSettings,
}

struct Summary {
    raw: String,
    message_count: usize,
    rendered_lines: usize,
}

/// Stops the heartbeat at the first streamed fragment and shows partial text.
struct StreamProgress<'a> {
    heartbeat: &'a mut Heartbeat,
    presenter: &'a Presenter,
    correlation_id: &'a str,
}

#[async_trait]
impl PartialSink for StreamProgress<'_> {
    async fn first_fragment(&mut self) {
        self.heartbeat.stop().await;
    }

    async fn partial(&mut self, accumulated: &str) {
        if let Err(e) = self.presenter.show_partial(accumulated).await {
            warn!(
                correlation_id = self.correlation_id,
                "Failed to show partial summary: {}", e
            );
        }
    }
}

impl Summarizer {
    #[must_use]
    pub fn new(
        conversations: Arc<dyn ConversationApi>,
        completions: Arc<dyn CompletionService>,
        prompt: Arc<PromptTemplate>,
        settings: SummarizerSettings,
    ) -> Self {
        Self {
            conversations,
            completions,
            prompt,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SummarizerSettings {
        &self.settings
    }

    /// Runs `job` to a terminal outcome, writing progress and the result to `surface`.
    ///
    /// The heartbeat is stopped before the terminal write on every path.
    pub async fn run_job(
        &self,
        job: &SummarizationJob,
        surface: Arc<dyn OutputSurface>,
    ) -> JobOutcome {
        let correlation_id = job.correlation_id.as_str();
        info!(
            correlation_id,
            user = %job.user_id,
            channel = %job.channel_id,
            thread_ts = %job.thread_ts,
            "Starting summarization job"
        );

        let (mut heartbeat, handle) =
            match Heartbeat::open(Arc::clone(&surface), self.settings.heartbeat.clone()).await {
                Ok(opened) => opened,
                Err(e) => {
                    error!(correlation_id, "Failed to open output surface: {}", e);
                    return JobOutcome::SurfaceUnavailable(e);
                }
            };

        let presenter = Presenter::new(Arc::clone(&surface), handle.clone(), job.user_id.clone());
        let result = self
            .summarize(job, surface.as_ref(), &handle, &mut heartbeat, &presenter)
            .await;

        heartbeat.stop().await;

        match result {
            Ok(summary) => match presenter.finish(&summary.raw).await {
                Ok(text) => {
                    info!(
                        correlation_id,
                        messages = summary.message_count,
                        "Summary delivered"
                    );
                    JobOutcome::Summarized {
                        text,
                        message_count: summary.message_count,
                        rendered_lines: summary.rendered_lines,
                    }
                }
                Err(e) => {
                    error!(correlation_id, "Failed to write summary: {}", e);
                    JobOutcome::SurfaceUnavailable(e)
                }
            },
            Err(job_error) => {
                let message = job_error.user_message(self.settings.bot_user_id.as_deref());
                if let Err(e) = presenter.fail(&message).await {
                    error!(correlation_id, "Failed to write error message: {}", e);
                }
                JobOutcome::Failed(job_error)
            }
        }
    }

    async fn summarize(
        &self,
        job: &SummarizationJob,
        surface: &dyn OutputSurface,
        handle: &SurfaceHandle,
        heartbeat: &mut Heartbeat,
        presenter: &Presenter,
    ) -> Result<Summary, JobError> {
        let correlation_id = job.correlation_id.as_str();

        let snapshot = fetch_thread(
            self.conversations.as_ref(),
            &job.channel_id,
            &job.thread_ts,
            self.settings.join_policy,
        )
        .await
        .map_err(|failure| {
            error!(correlation_id, "Error fetching thread: {}", failure);
            JobError::Fetch(failure)
        })?;

        let rendered = render_thread(&snapshot);
        let message_count = snapshot.len();
        let rendered_lines = rendered.line_count();
        drop(snapshot);

        if let Err(e) = surface.update(handle, &progress_text(message_count)).await {
            warn!(correlation_id, "Failed to post progress message: {}", e);
        }

        let prompt = self.prompt.build_messages(&rendered);

        let mut sink = StreamProgress {
            heartbeat,
            presenter,
            correlation_id,
        };
        let result = request_summary(
            self.completions.as_ref(),
            &prompt,
            self.settings.mode,
            self.settings.stream_min_update_interval,
            &mut sink,
        )
        .await
        .map_err(|e| {
            error!(correlation_id, "Error calling AI provider: {}", e);
            JobError::Completion(e)
        })?;

        Ok(Summary {
            raw: result.into_text(),
            message_count,
            rendered_lines,
        })
    }
}
