//! Reading message-shortcut interaction payloads.

use serde_json::Value;

use super::surface::SurfaceKind;
use crate::core::models::{SummarizationJob, SurfaceTarget};
use crate::errors::BotError;

pub fn v_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

pub fn v_str<'a>(root: &'a Value, path: &[&str]) -> Option<&'a str> {
    v_path(root, path)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// The fields of a `message_action` interaction the bot acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutRequest {
    pub user_id: String,
    pub channel_id: String,
    /// Root of the thread: the message's `thread_ts`, or its own `ts` when it has none.
    pub thread_ts: String,
    pub response_url: Option<String>,
    pub trigger_id: Option<String>,
}

impl ShortcutRequest {
    /// Creates the job for this request, writing to a surface of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `BotError::ParseError` if the payload lacked the field the
    /// surface needs (`response_url` or `trigger_id`).
    pub fn into_job(self, kind: SurfaceKind) -> Result<SummarizationJob, BotError> {
        let target = match kind {
            SurfaceKind::ResponseUrl => SurfaceTarget::ResponseUrl {
                response_url: self.response_url.ok_or_else(|| {
                    BotError::ParseError("message_action payload has no response_url".to_string())
                })?,
            },
            SurfaceKind::Thread => SurfaceTarget::ThreadReply {
                channel_id: self.channel_id.clone(),
                thread_ts: self.thread_ts.clone(),
            },
            SurfaceKind::Modal => SurfaceTarget::Modal {
                trigger_id: self.trigger_id.ok_or_else(|| {
                    BotError::ParseError("message_action payload has no trigger_id".to_string())
                })?,
            },
        };

        Ok(SummarizationJob::new(
            self.user_id,
            self.channel_id,
            self.thread_ts,
            target,
        ))
    }
}

/// Extracts a [`ShortcutRequest`] from an interaction payload.
///
/// Returns `Ok(None)` for interactions that are not a `message_action` with
/// the given `callback_id`.
///
/// # Errors
///
/// Returns `BotError::ParseError` naming the first missing required field.
pub fn parse_message_action(
    payload: &Value,
    callback_id: &str,
) -> Result<Option<ShortcutRequest>, BotError> {
    if v_str(payload, &["type"]) != Some("message_action")
        || v_str(payload, &["callback_id"]) != Some(callback_id)
    {
        return Ok(None);
    }

    let required = |path: &[&str]| {
        v_str(payload, path)
            .map(str::to_string)
            .ok_or_else(|| {
                BotError::ParseError(format!("message_action payload missing {}", path.join(".")))
            })
    };

    let user_id = required(&["user", "id"])?;
    let channel_id = required(&["channel", "id"])?;
    let message_ts = required(&["message", "ts"])?;
    let thread_ts = v_str(payload, &["message", "thread_ts"])
        .map_or(message_ts, str::to_string);

    Ok(Some(ShortcutRequest {
        user_id,
        channel_id,
        thread_ts,
        response_url: v_str(payload, &["response_url"]).map(str::to_string),
        trigger_id: v_str(payload, &["trigger_id"]).map(str::to_string),
    }))
}
