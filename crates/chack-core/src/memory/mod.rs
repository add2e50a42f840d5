//! Conversation memory.
//!
//! - [`ShortTermMemoryWindow`]: per-session message window with a running summary
//! - [`LongTermMemoryStore`]: per-chat text record that survives restarts

mod long_term;
mod window;

pub use long_term::{
    DEFAULT_LONG_TERM_DIR, DEFAULT_LONG_TERM_MAX_CHARS, DEFAULT_LONG_TERM_PROMPT,
    LongTermMemoryStore,
};
pub use window::{
    DEFAULT_MAX_MESSAGES, DEFAULT_SUMMARY_MAX_CHARS, DEFAULT_SUMMARY_PROMPT,
    ShortTermMemoryWindow, WindowConfig, format_messages, truncate_chars,
};
