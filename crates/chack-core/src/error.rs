//! Error types for conversation processing.

use chack_ai::AiError;
use thiserror::Error;

/// Generic reply for failed turns.
pub const GENERIC_FAILURE_REPLY: &str = "Sorry, I ran into an error while processing that.";

/// Error types for chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Sender or chat is not on the allow-list.
    #[error("Authorization denied for {0}")]
    AuthorizationDenied(String),
    /// Every attempt finished with fewer tool calls than required.
    #[error(
        "Minimum tool usage not met: required {required}, observed {observed} after {attempts} attempts"
    )]
    MinimumToolUsageNotMet {
        required: usize,
        observed: usize,
        attempts: usize,
    },
    /// Executor, network or send failure.
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("Summarization failed: {0}")]
    Summarization(String),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ChatError {
    /// Text shown to the user, if any. Denied messages get no reply.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::AuthorizationDenied(_) => None,
            Self::MinimumToolUsageNotMet { .. }
            | Self::Upstream(_)
            | Self::Summarization(_)
            | Self::Storage(_) => Some(GENERIC_FAILURE_REPLY),
        }
    }
}

impl From<AiError> for ChatError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Summarization(msg) => Self::Summarization(msg),
            other => Self::Upstream(other.to_string()),
        }
    }
}
