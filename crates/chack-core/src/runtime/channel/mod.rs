//! Channel runtime: turns inbound chat messages into agent replies.

mod commands;
mod handler;
mod orchestrator;
mod retry;
mod typing;

pub use commands::{Command, HELP_TEXT, RESET_REPLY, parse_command};
pub use handler::start_message_handler;
pub use orchestrator::{ConversationOrchestrator, TurnOutcome, format_reply};
pub use retry::{
    AcceptedRun, DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_TOOLS, DEFAULT_TOOL_USAGE_HINT,
    MIN_TOOLS_PLACEHOLDER, RetryController, ToolUsagePolicy,
};
pub use typing::{TYPING_REFRESH_INTERVAL, TypingIndicator};
