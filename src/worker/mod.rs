//! Job execution and the Socket Mode listener that starts jobs

pub mod job;
pub mod socket;

// Re-export the main types for convenience
pub use job::{JobError, JobOutcome, Summarizer, SummarizerSettings};
pub use socket::{ListenerState, handle_interaction, run_socket_mode};
