/// threadtldr - A Slack bot that summarizes an entire message thread on request.
///
/// A user runs the "Summarize thread" message shortcut; the bot joins the
/// channel, pages through every reply, renders the thread as text, asks an
/// OpenAI-compatible model for a bullet-point summary and writes the result
/// back while a rotating status message shows it is still working.
///
/// # Architecture
///
/// - `slack`: Web API client, thread fetcher, output surfaces, payload parsing
/// - `summary`: renderer, heartbeat, request modes and presenter
/// - `ai`: chat-completions client and SSE parser
/// - `worker`: the job procedure and the Socket Mode listener
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use threadtldr::ai::LlmClient;
/// use threadtldr::core::config::AppConfig;
/// use threadtldr::prompt::PromptTemplate;
/// use threadtldr::slack::SlackClient;
/// use threadtldr::worker::{ListenerState, Summarizer, SummarizerSettings, run_socket_mode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     threadtldr::setup_logging();
///
///     let config = AppConfig::from_env()?;
///     let slack = Arc::new(SlackClient::new(config.slack_bot_token.clone()));
///     let llm = LlmClient::new(
///         config.openai_api_key.clone(),
///         config.openai_org_id.clone(),
///         config.openai_model.clone(),
///         config.openai_api_url.clone(),
///     )?;
///     let prompt = PromptTemplate::load(None, config.prompt_strategy)?;
///
///     let summarizer = Summarizer::new(
///         slack.clone(),
///         Arc::new(llm),
///         Arc::new(prompt),
///         SummarizerSettings::from_config(&config, None),
///     );
///     let state = Arc::new(ListenerState {
///         summarizer: Arc::new(summarizer),
///         slack,
///         surface_kind: config.output_surface,
///         callback_id: config.shortcut_callback_id.clone(),
///     });
///     run_socket_mode(state, &config.slack_app_token).await?;
///     Ok(())
/// }
/// ```
// Module declarations
pub mod ai;
pub mod core;
pub mod errors;
pub mod prompt;
pub mod slack;
pub mod summary;
pub mod worker;

pub use errors::BotError;

/// Configure structured logging with JSON format.
///
/// The level comes from `RUST_LOG` and defaults to `info`. Calling it more
/// than once is harmless.
///
/// # Example
///
/// ```
/// threadtldr::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
