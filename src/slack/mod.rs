//! All Slack-specific functionality

pub mod client;
pub mod modal_builder;
pub mod parsing;
pub mod response_builder;
pub mod surface;
pub mod thread;

// Re-export main types for convenience
pub use client::SlackClient;
pub use surface::{OutputSurface, SurfaceHandle, SurfaceKind};
pub use thread::{ConversationApi, FetchFailure, JoinPolicy};
