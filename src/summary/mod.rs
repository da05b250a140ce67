//! The summarization pipeline stages between fetch and display.

pub mod heartbeat;
pub mod present;
pub mod render;
pub mod request;

pub use heartbeat::{Heartbeat, HeartbeatSettings, pick_status};
pub use present::{Presenter, format_summary, strip_scratchpad};
pub use render::{EMPTY_THREAD_SENTINEL, render_thread};
pub use request::{PartialSink, SummaryMode, request_summary};
