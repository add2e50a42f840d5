//! Error types for the AI module

use std::time::Duration;

use thiserror::Error;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{provider} API error ({status}): {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
        /// Wait requested by the provider through `Retry-After`.
        retry_after: Option<Duration>,
    },

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Max turns reached: {0}")]
    MaxTurns(usize),

    #[error("Summarization error: {0}")]
    Summarization(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    /// Whether a provider call that failed this way is worth repeating.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::LlmHttp { status, .. } => *status == 429 || *status >= 500,
            AiError::Http(e) => e.is_timeout() || e.is_connect(),
            AiError::Llm(message) => {
                let lower = message.to_lowercase();
                lower.contains("rate limit") || lower.contains("timeout")
            }
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AiError::LlmHttp { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;
