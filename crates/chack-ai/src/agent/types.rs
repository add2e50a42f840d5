//! Data crossing the agent-executor boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::{Message, TokenUsage};

/// Tool name recorded when a run item carries no recognizable name.
pub const UNKNOWN_TOOL_NAME: &str = "tool";

/// Immutable configuration an executor is built with.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub system_prompt: String,
    pub max_turns: usize,
}

impl AgentSpec {
    pub fn new(system_prompt: impl Into<String>, max_turns: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_turns,
        }
    }

    /// System instructions for one run, with the running summary appended when present.
    pub fn instructions_with_summary(&self, summary: Option<&str>) -> String {
        match summary.map(str::trim) {
            Some(summary) if !summary.is_empty() => {
                format!("{}\n\n### MEMORY SUMMARY\n{}", self.system_prompt, summary)
            }
            _ => self.system_prompt.clone(),
        }
    }
}

/// One invocation: prior context plus the new user text.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub summary: Option<String>,
    pub history: Vec<Message>,
    pub input: String,
}

impl AgentRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// Raw tool invocation as reported by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallRaw {
    Structured { name: String, arguments: Value },
    Unknown,
}

impl ToolCallRaw {
    pub fn to_step(&self) -> ToolStep {
        match self {
            ToolCallRaw::Structured { name, arguments } if !name.trim().is_empty() => ToolStep {
                name: name.clone(),
                input: arguments.clone(),
            },
            ToolCallRaw::Structured { arguments, .. } => ToolStep {
                name: UNKNOWN_TOOL_NAME.to_string(),
                input: arguments.clone(),
            },
            ToolCallRaw::Unknown => ToolStep {
                name: UNKNOWN_TOOL_NAME.to_string(),
                input: Value::Null,
            },
        }
    }
}

/// Items produced while the executor worked on a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RunItem {
    Message(Message),
    ToolCall(ToolCallRaw),
    ToolOutput { name: String, output: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStep {
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    pub output: String,
    pub items: Vec<RunItem>,
    pub usage: TokenUsage,
}

impl AgentResponse {
    /// One step per tool invocation, in the order the executor made them.
    pub fn tool_steps(&self) -> Vec<ToolStep> {
        self.items
            .iter()
            .filter_map(|item| match item {
                RunItem::ToolCall(raw) => Some(raw.to_step()),
                _ => None,
            })
            .collect()
    }
}

/// Human-readable audit line per tool step.
pub fn format_tool_steps(steps: &[ToolStep]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let input = match &step.input {
                Value::Null => String::new(),
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            format!("{}. {} {}", i + 1, step.name, input).trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs one agent turn against a fixed system prompt.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    fn spec(&self) -> &AgentSpec;

    async fn run(&self, request: AgentRequest) -> Result<AgentResponse>;
}

/// Builds a fresh executor per conversation session.
pub trait ExecutorFactory: Send + Sync {
    fn build(&self, spec: AgentSpec) -> Arc<dyn AgentExecutor>;
}
