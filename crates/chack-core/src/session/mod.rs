//! Conversation sessions and their settings.

mod registry;
mod settings;

pub use registry::{
    ChatSession, LONG_TERM_MEMORY_HEADING, SessionHandle, SessionRegistry, build_system_prompt,
};
pub use settings::{DEFAULT_MAX_TURNS, DEFAULT_RESET_MINUTES, LongTermSettings, SessionSettings};
