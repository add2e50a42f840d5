//! Per-platform session settings.

use crate::memory::{LongTermMemoryStore, WindowConfig};

/// Default number of agent turns per request.
pub const DEFAULT_MAX_TURNS: usize = 75;

/// Default idle timeout in minutes.
pub const DEFAULT_RESET_MINUTES: u64 = 30;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub system_prompt: String,
    pub max_turns: usize,
    pub window: WindowConfig,
    /// Idle minutes before a session is finalized and rebuilt. Zero disables.
    pub reset_minutes: u64,
    /// `None` when long-term memory is disabled for the platform.
    pub long_term: Option<LongTermSettings>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_turns: DEFAULT_MAX_TURNS,
            window: WindowConfig::default(),
            reset_minutes: DEFAULT_RESET_MINUTES,
            long_term: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LongTermSettings {
    pub store: LongTermMemoryStore,
    pub max_chars: usize,
}
