//! LLM module - provider-neutral client abstraction

mod client;
#[cfg(any(test, feature = "test-utils"))]
mod mock_client;
mod openai;
mod retry;

pub use client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, Role, TokenUsage,
    ToolCall,
};
#[cfg(any(test, feature = "test-utils"))]
pub use mock_client::{MockLlmClient, MockStep};
pub use openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAIClient};
pub use retry::TransportRetry;
