//! Cleans model output and writes it to the job's surface.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::BotError;
use crate::slack::surface::{OutputSurface, SurfaceHandle};

pub const SCRATCHPAD_OPEN: &str = "<think>";

/// Shown when the model returned nothing displayable.
pub const NO_SUMMARY_PLACEHOLDER: &str = "_No summary found_";

static SCRATCHPAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex compile"));

/// Removes `<think>...</think>` regions and the blank lines they leave behind.
///
/// An unterminated `<think>` hides everything after it, so reasoning that is
/// still streaming never shows up.
#[must_use]
pub fn strip_scratchpad(text: &str) -> String {
    let closed_removed = SCRATCHPAD_RE.replace_all(text, "");
    let visible = match closed_removed.find(SCRATCHPAD_OPEN) {
        Some(pos) => &closed_removed[..pos],
        None => &closed_removed[..],
    };

    visible
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn format_summary(user_id: &str, summary: &str) -> String {
    format!(":white_check_mark: *Here's your summary, <@{user_id}>:*\n\n{summary}")
}

#[must_use]
pub fn format_partial(summary: &str) -> String {
    format!(":safari-loading: *Summary in progress...*\n\n{summary}")
}

/// Writes summary states for one job.
pub struct Presenter {
    surface: Arc<dyn OutputSurface>,
    handle: SurfaceHandle,
    user_id: String,
}

impl Presenter {
    #[must_use]
    pub fn new(surface: Arc<dyn OutputSurface>, handle: SurfaceHandle, user_id: String) -> Self {
        Self {
            surface,
            handle,
            user_id,
        }
    }

    /// Shows an intermediate streaming state. Returns `Ok(false)` when nothing
    /// visible remains after cleaning and no write was made.
    ///
    /// # Errors
    ///
    /// Returns the surface's error.
    pub async fn show_partial(&self, accumulated: &str) -> Result<bool, BotError> {
        let cleaned = strip_scratchpad(accumulated);
        if cleaned.is_empty() {
            return Ok(false);
        }
        self.surface
            .update(&self.handle, &format_partial(&cleaned))
            .await?;
        Ok(true)
    }

    /// Writes the final summary and returns the text shown.
    ///
    /// # Errors
    ///
    /// Returns the surface's error.
    pub async fn finish(&self, raw: &str) -> Result<String, BotError> {
        let cleaned = strip_scratchpad(raw);
        let summary = if cleaned.is_empty() {
            NO_SUMMARY_PLACEHOLDER
        } else {
            cleaned.as_str()
        };
        let text = format_summary(&self.user_id, summary);
        self.surface.finish(&self.handle, &text).await?;
        Ok(text)
    }

    /// Writes a terminal error message.
    ///
    /// # Errors
    ///
    /// Returns the surface's error.
    pub async fn fail(&self, message: &str) -> Result<(), BotError> {
        self.surface.finish(&self.handle, message).await
    }
}
