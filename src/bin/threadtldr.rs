use std::sync::Arc;

use anyhow::Context;
use threadtldr::ai::LlmClient;
use threadtldr::core::config::AppConfig;
use threadtldr::prompt::PromptTemplate;
use threadtldr::slack::SlackClient;
use threadtldr::worker::{ListenerState, Summarizer, SummarizerSettings, run_socket_mode};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    threadtldr::setup_logging();

    let config = AppConfig::from_env().context("Environment variables validation failed")?;

    let prompt = PromptTemplate::load(config.prompt_template_path.as_deref(), config.prompt_strategy)
        .context("Failed to load prompt template")?;
    info!(
        strategy = %prompt.strategy(),
        custom = config.prompt_template_path.is_some(),
        "Loaded prompt template"
    );

    let slack = Arc::new(SlackClient::new(config.slack_bot_token.clone()));
    let bot_user_id = match slack.get_bot_user_id().await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Could not resolve bot user id: {}", e);
            None
        }
    };

    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_org_id.clone(),
        config.openai_model.clone(),
        config.openai_api_url.clone(),
    )
    .context("Failed to build completion client")?;
    info!(model = llm.model_name(), mode = ?config.summary_mode, "Completion client ready");

    let summarizer = Summarizer::new(
        slack.clone(),
        Arc::new(llm),
        Arc::new(prompt),
        SummarizerSettings::from_config(&config, bot_user_id),
    );

    let state = Arc::new(ListenerState {
        summarizer: Arc::new(summarizer),
        slack,
        surface_kind: config.output_surface,
        callback_id: config.shortcut_callback_id.clone(),
    });

    run_socket_mode(state, &config.slack_app_token)
        .await
        .context("Socket Mode listener failed")?;
    Ok(())
}
