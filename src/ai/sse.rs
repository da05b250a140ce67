//! Server-Sent Events (SSE) parser for streamed chat completions.
//!
//! Handles frames split across TCP chunks, several frames in one read, and
//! chunks that carry no text (role announcements, usage reports).

use serde_json::Value;

/// Events emitted by an OpenAI-compatible `chat/completions` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text from `choices[0].delta.content`.
    TextDelta(String),
    /// The first choice reported a `finish_reason`.
    Finished(Option<String>),
    /// The provider reported an error inside the stream.
    Error(String),
}

/// Result of parsing one SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Event(StreamEvent),
    /// A well-formed chunk with nothing for us (e.g. a role-only delta).
    Ignored,
    /// End of stream signal (`[DONE]`).
    Done,
}

/// Stateful SSE parser that buffers incomplete frames across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Feeds a chunk of data to the parser and returns every complete result.
    pub fn feed(&mut self, chunk: &str) -> Vec<ParseResult> {
        self.buffer.push_str(chunk);
        let mut results = Vec::new();

        while let Some(event_end) = self.find_event_boundary() {
            let event_text = self.buffer[..event_end].to_string();
            self.buffer = self.buffer[event_end..]
                .trim_start_matches(['\r', '\n'])
                .to_string();

            results.extend(Self::parse_event(&event_text));
        }

        results
    }

    fn find_event_boundary(&self) -> Option<usize> {
        let lf = self.buffer.find("\n\n").map(|pos| pos + 2);
        let crlf = self.buffer.find("\r\n\r\n").map(|pos| pos + 4);
        match (lf, crlf) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn parse_event(event_text: &str) -> Vec<ParseResult> {
        let data_lines: Vec<&str> = event_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(':'))
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
            .filter(|data| !data.is_empty())
            .collect();

        if data_lines.is_empty() {
            return Vec::new();
        }

        let data = data_lines.join("\n");
        if data == "[DONE]" {
            return vec![ParseResult::Done];
        }

        Self::parse_json_chunk(&data)
    }

    fn parse_json_chunk(data: &str) -> Vec<ParseResult> {
        let json: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                return vec![ParseResult::Event(StreamEvent::Error(format!(
                    "Failed to parse OpenAI SSE JSON payload: {e}"
                )))];
            }
        };

        if let Some(message) = extract_error_message(&json) {
            return vec![ParseResult::Event(StreamEvent::Error(message))];
        }

        let Some(choice) = json
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        else {
            return vec![ParseResult::Ignored];
        };

        let mut results = Vec::new();
        if let Some(delta) = choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
        {
            results.push(ParseResult::Event(StreamEvent::TextDelta(delta.to_string())));
        }

        if let Some(reason) = choice.get("finish_reason").filter(|r| !r.is_null()) {
            results.push(ParseResult::Event(StreamEvent::Finished(
                reason.as_str().map(str::to_string),
            )));
        }

        if results.is_empty() {
            results.push(ParseResult::Ignored);
        }
        results
    }

    #[must_use]
    pub fn remaining_buffer(&self) -> &str {
        &self.buffer
    }
}

fn extract_error_message(json: &Value) -> Option<String> {
    let error = json.get("error")?;
    if error.is_null() {
        return None;
    }
    if let Some(msg) = error.get("message").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    if let Some(msg) = error.as_str() {
        return Some(msg.to_string());
    }
    Some("Unknown error".to_string())
}
