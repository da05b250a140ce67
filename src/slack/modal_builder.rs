use serde_json::{Value, json};

/// Slack's limit for the text of a single section block.
pub const SECTION_TEXT_LIMIT: usize = 3000;

const MODAL_TITLE: &str = "Thread summary";

/// Splits `text` into chunks of at most `SECTION_TEXT_LIMIT` characters,
/// preferring line boundaries.
#[must_use]
pub fn split_section_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > SECTION_TEXT_LIMIT && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > SECTION_TEXT_LIMIT {
            // A single oversized line is hard-split on char boundaries.
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(SECTION_TEXT_LIMIT) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Build the read-only modal that shows progress and, later, the summary.
#[must_use]
pub fn build_summary_modal(text: &str) -> Value {
    let blocks: Vec<Value> = split_section_text(text)
        .into_iter()
        .map(|chunk| {
            // Slack rejects empty section text.
            let chunk = if chunk.trim().is_empty() { " ".to_string() } else { chunk };
            json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": chunk }
            })
        })
        .collect();

    json!({
        "type": "modal",
        "callback_id": "thread_summary_view",
        "title": { "type": "plain_text", "text": MODAL_TITLE },
        "close": { "type": "plain_text", "text": "Close" },
        "blocks": blocks
    })
}
