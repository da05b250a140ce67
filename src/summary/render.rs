//! Serializes a thread snapshot into the text the model reads.

use crate::core::models::{Reaction, RenderedThreadText, ThreadMessage, ThreadSnapshot};

/// Rendered text for a thread with no messages.
pub const EMPTY_THREAD_SENTINEL: &str = "(no messages in thread)";

pub const PARENT_MARKER: &str = "[parent message] ";

/// `(:name: count)` tokens joined by a single space; empty when there are none.
#[must_use]
pub fn render_reactions(reactions: &[Reaction]) -> String {
    reactions
        .iter()
        .map(|r| format!("(:{}: {})", r.name, r.count))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_line(message: &ThreadMessage, thread_ts: &str) -> String {
    let marker = if message.is_root_of(thread_ts) {
        PARENT_MARKER
    } else {
        ""
    };
    format!(
        "{marker}{}{}{}",
        message.author_id,
        render_reactions(&message.reactions),
        message.text
    )
}

/// One line per message, in snapshot order, joined with `\n`.
#[must_use]
pub fn render_thread(snapshot: &ThreadSnapshot) -> RenderedThreadText {
    if snapshot.is_empty() {
        return RenderedThreadText::new(EMPTY_THREAD_SENTINEL.to_string());
    }

    let text = snapshot
        .messages()
        .iter()
        .map(|m| render_line(m, snapshot.thread_ts()))
        .collect::<Vec<_>>()
        .join("\n");
    RenderedThreadText::new(text)
}
