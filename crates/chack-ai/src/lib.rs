//! chack AI - model access for the chat gateway
//!
//! This crate provides:
//! - Provider-neutral LLM client trait with an OpenAI-compatible implementation
//! - Tool registry and a tool-calling agent loop
//! - The executor and summarizer boundaries the gateway depends on

pub mod agent;
pub mod error;
pub mod llm;
pub mod summarizer;
pub mod tools;

// Re-export commonly used types
pub use agent::{
    AgentExecutor, AgentRequest, AgentResponse, AgentSpec, ExecutorFactory, ReactExecutor,
    ReactExecutorFactory, RunItem, ToolCallRaw, ToolStep,
};
pub use error::{AiError, Result};
pub use llm::{LlmClient, Message, OpenAIClient, Role, TokenUsage, TransportRetry};
pub use summarizer::{LlmSummarizer, Summarizer, SummaryRequest};
pub use tools::{Tool, ToolOutput, ToolRegistry, ToolSchema};
