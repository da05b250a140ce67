//! Socket Mode entry point: turns message shortcuts into spawned summarization jobs.

use std::sync::Arc;

use serde_json::Value;
use slack_morphism::hyper_tokio::{SlackClientHyperConnector, SlackHyperClient};
use slack_morphism::prelude::{
    HttpStatusCode, SlackClientEventsListenerEnvironment, SlackClientEventsUserState,
    SlackClientSocketModeConfig, SlackClientSocketModeListener, SlackInteractionEvent,
    SlackSocketModeListenerCallbacks, UserCallbackResult,
};
use slack_morphism::{SlackApiToken, SlackApiTokenValue};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::job::{JobOutcome, Summarizer};
use crate::errors::BotError;
use crate::slack::client::SlackClient;
use crate::slack::parsing::parse_message_action;
use crate::slack::surface::{SurfaceKind, surface_for};

/// Shared, read-only state handed to every interaction callback.
pub struct ListenerState {
    pub summarizer: Arc<Summarizer>,
    pub slack: Arc<SlackClient>,
    pub surface_kind: SurfaceKind,
    pub callback_id: String,
}

/// Starts a job for a matching `message_action` payload.
///
/// Returns the handle of the spawned job task, or `None` when the payload is
/// ignored or unusable. Job errors never escape the task.
pub fn handle_interaction(
    state: &ListenerState,
    payload: &Value,
) -> Option<JoinHandle<JobOutcome>> {
    let request = match parse_message_action(payload, &state.callback_id) {
        Ok(Some(request)) => request,
        Ok(None) => {
            let kind = payload
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            debug!(kind, "Ignoring interaction");
            return None;
        }
        Err(e) => {
            warn!("Unusable message shortcut payload: {}", e);
            return None;
        }
    };

    let job = match request.into_job(state.surface_kind) {
        Ok(job) => job,
        Err(e) => {
            warn!("Cannot create job for shortcut: {}", e);
            return None;
        }
    };

    let surface = surface_for(Arc::clone(&state.slack), &job.target);
    let summarizer = Arc::clone(&state.summarizer);
    let span = info_span!("summarize_job", correlation_id = %job.correlation_id);

    Some(tokio::spawn(
        async move { summarizer.run_job(&job, surface).await }.instrument(span),
    ))
}

/// Logs how a spawned job ended, including panics.
async fn watch_job(handle: JoinHandle<JobOutcome>) {
    match handle.await {
        Ok(JobOutcome::Summarized { message_count, .. }) => {
            info!(messages = message_count, "Job finished");
        }
        Ok(JobOutcome::Failed(e)) => info!("Job ended with error: {}", e),
        Ok(JobOutcome::SurfaceUnavailable(e)) => warn!("Job could not write output: {}", e),
        Err(e) if e.is_panic() => error!("Summarization job panicked: {}", e),
        Err(e) => warn!("Summarization job cancelled: {}", e),
    }
}

async fn on_interaction(
    event: SlackInteractionEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    let payload = serde_json::to_value(&event)?;

    let state = {
        let storage = states.read().await;
        storage.get_user_state::<Arc<ListenerState>>().cloned()
    };
    let Some(state) = state else {
        error!("Listener state missing; dropping interaction");
        return Ok(());
    };

    // The callback returns right away so Socket Mode acknowledges the shortcut.
    if let Some(handle) = handle_interaction(&state, &payload) {
        tokio::spawn(watch_job(handle));
    }
    Ok(())
}

fn on_listener_error(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    error!("Socket Mode listener error: {:#?}", err);
    HttpStatusCode::OK
}

/// Connects to Slack with the app-level token and serves until shutdown.
///
/// # Errors
///
/// Returns an error if the HTTP connector cannot be built or the Socket Mode
/// connection cannot be established.
pub async fn run_socket_mode(state: Arc<ListenerState>, app_token: &str) -> Result<(), BotError> {
    let connector = SlackClientHyperConnector::new()
        .map_err(|e| BotError::GeneralError(format!("Failed to create Slack HTTP connector: {e}")))?;
    let client = Arc::new(SlackHyperClient::new(connector));

    let callbacks = SlackSocketModeListenerCallbacks::new().with_interaction_events(on_interaction);

    let environment = Arc::new(
        SlackClientEventsListenerEnvironment::new(client)
            .with_error_handler(on_listener_error)
            .with_user_state(state),
    );

    let listener = SlackClientSocketModeListener::new(
        &SlackClientSocketModeConfig::new(),
        environment,
        callbacks,
    );

    let token = SlackApiToken::new(SlackApiTokenValue::new(app_token.to_string()));
    listener.listen_for(&token).await?;

    info!("Slack bot is running in Socket Mode");
    listener.serve().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ai::LlmClient;
    use crate::prompt::{PromptStrategy, PromptTemplate};
    use crate::slack::thread::JoinPolicy;
    use crate::summary::heartbeat::HeartbeatSettings;
    use crate::summary::request::SummaryMode;
    use crate::worker::job::SummarizerSettings;

    fn state() -> ListenerState {
        let slack = Arc::new(SlackClient::new("xoxb-test".to_string()));
        let llm = LlmClient::new(
            "sk-test".to_string(),
            None,
            "gpt-test".to_string(),
            url::Url::parse("https://llm.invalid/v1").unwrap(),
        )
        .unwrap();
        let summarizer = Summarizer::new(
            slack.clone(),
            Arc::new(llm),
            Arc::new(PromptTemplate::builtin(PromptStrategy::Append)),
            SummarizerSettings {
                mode: SummaryMode::Blocking,
                join_policy: JoinPolicy::Required,
                heartbeat: HeartbeatSettings::with_interval(std::time::Duration::from_secs(5)),
                stream_min_update_interval: std::time::Duration::ZERO,
                bot_user_id: None,
            },
        );
        ListenerState {
            summarizer: Arc::new(summarizer),
            slack,
            surface_kind: SurfaceKind::ResponseUrl,
            callback_id: "summarize_thread".to_string(),
        }
    }

    #[test]
    fn ignores_other_interaction_types() {
        let payload = json!({ "type": "block_actions", "actions": [] });
        assert!(handle_interaction(&state(), &payload).is_none());
    }

    #[test]
    fn ignores_other_shortcuts() {
        let payload = json!({ "type": "message_action", "callback_id": "something_else" });
        assert!(handle_interaction(&state(), &payload).is_none());
    }
}
