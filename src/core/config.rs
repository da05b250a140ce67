use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::BotError;
use crate::prompt::PromptStrategy;
use crate::slack::surface::SurfaceKind;
use crate::slack::thread::JoinPolicy;
use crate::summary::request::SummaryMode;

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_STREAM_MIN_UPDATE_MS: u64 = 1000;
pub const DEFAULT_SHORTCUT_CALLBACK_ID: &str = "summarize_thread";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub slack_bot_token: String,
    pub slack_app_token: String,
    pub openai_api_key: String,
    pub openai_api_url: Url,
    pub openai_model: String,
    pub openai_org_id: Option<String>,
    pub prompt_template_path: Option<PathBuf>,
    pub prompt_strategy: PromptStrategy,
    pub summary_mode: SummaryMode,
    pub join_policy: JoinPolicy,
    pub output_surface: SurfaceKind,
    pub heartbeat_interval: Duration,
    pub stream_min_update_interval: Duration,
    pub shortcut_callback_id: String,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `BotError::ConfigError` naming the first missing or malformed variable.
    pub fn from_env() -> Result<Self, BotError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup (used by tests).
    ///
    /// # Errors
    ///
    /// Returns `BotError::ConfigError` naming the first missing or malformed variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| BotError::ConfigError(format!("{key}: environment variable not set")))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url_raw = required("OPENAI_API_URL")?;
        let openai_api_url = Url::parse(&api_url_raw)
            .map_err(|e| BotError::ConfigError(format!("OPENAI_API_URL: {e}")))?;

        let heartbeat_secs = match optional("HEARTBEAT_INTERVAL_SECS") {
            Some(raw) => parse_u64("HEARTBEAT_INTERVAL_SECS", &raw)?,
            None => DEFAULT_HEARTBEAT_INTERVAL_SECS,
        };
        if heartbeat_secs == 0 {
            return Err(BotError::ConfigError(
                "HEARTBEAT_INTERVAL_SECS: must be greater than zero".to_string(),
            ));
        }

        let stream_min_update_ms = match optional("STREAM_MIN_UPDATE_INTERVAL_MS") {
            Some(raw) => parse_u64("STREAM_MIN_UPDATE_INTERVAL_MS", &raw)?,
            None => DEFAULT_STREAM_MIN_UPDATE_MS,
        };

        Ok(Self {
            slack_bot_token: required("SLACK_BOT_TOKEN")?,
            slack_app_token: required("SLACK_APP_TOKEN")?,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_api_url,
            openai_model: required("OPENAI_MODEL")?,
            openai_org_id: optional("OPENAI_ORG_ID"),
            prompt_template_path: optional("PROMPT_TEMPLATE_PATH").map(PathBuf::from),
            prompt_strategy: optional("PROMPT_STRATEGY")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            summary_mode: optional("SUMMARY_MODE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            join_policy: optional("JOIN_POLICY")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            output_surface: optional("OUTPUT_SURFACE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            stream_min_update_interval: Duration::from_millis(stream_min_update_ms),
            shortcut_callback_id: optional("SHORTCUT_CALLBACK_ID")
                .unwrap_or_else(|| DEFAULT_SHORTCUT_CALLBACK_ID.to_string()),
        })
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, BotError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| BotError::ConfigError(format!("{key}: {e}")))
}
