//! Agent boundary: the executor trait, its request/response types, and the
//! tool-calling loop that backs it.

mod executor;
mod types;

pub use executor::{ReactExecutor, ReactExecutorFactory};
pub use types::{
    AgentExecutor, AgentRequest, AgentResponse, AgentSpec, ExecutorFactory, RunItem,
    ToolCallRaw, ToolStep, UNKNOWN_TOOL_NAME, format_tool_steps,
};
