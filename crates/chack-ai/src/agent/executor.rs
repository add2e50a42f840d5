//! Agent executor with a tool-calling loop

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::agent::types::{
    AgentExecutor, AgentRequest, AgentResponse, AgentSpec, ExecutorFactory, RunItem, ToolCallRaw,
};
use crate::error::{AiError, Result};
use crate::llm::{CompletionRequest, FinishReason, LlmClient, Message, TokenUsage};
use crate::tools::ToolRegistry;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOOL_RESULT_CHARS: usize = 8000;

/// Runs the model, executes requested tools, and feeds results back until
/// the model answers without tool calls or `max_turns` is reached.
pub struct ReactExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    spec: AgentSpec,
    temperature: Option<f32>,
    tool_timeout: Duration,
}

impl ReactExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, spec: AgentSpec) -> Self {
        Self {
            llm,
            tools,
            spec,
            temperature: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set tool timeout
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> String {
        let result = tokio::time::timeout(self.tool_timeout, self.tools.execute(name, arguments))
            .await
            .unwrap_or_else(|_| Err(AiError::Tool(format!("Tool {name} timed out"))));

        let rendered = match result {
            Ok(output) => output.render(),
            Err(e) => format!("Error: {e}"),
        };

        if rendered.chars().count() > MAX_TOOL_RESULT_CHARS {
            let head: String = rendered.chars().take(MAX_TOOL_RESULT_CHARS).collect();
            format!("{head}...[truncated]")
        } else {
            rendered
        }
    }
}

#[async_trait]
impl AgentExecutor for ReactExecutor {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    async fn run(&self, request: AgentRequest) -> Result<AgentResponse> {
        let instructions = self
            .spec
            .instructions_with_summary(request.summary.as_deref());

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(Message::system(instructions));
        messages.extend(request.history);
        if !request.input.is_empty() {
            messages.push(Message::user(request.input));
        }

        let mut items = Vec::new();
        let mut usage = TokenUsage::default();
        let max_turns = self.spec.max_turns.max(1);

        for turn in 0..max_turns {
            let mut completion =
                CompletionRequest::new(messages.clone()).with_tools(self.tools.schemas());
            if let Some(temperature) = self.temperature {
                completion = completion.with_temperature(temperature);
            }

            let response = self.llm.complete(completion).await?;
            if let Some(turn_usage) = &response.usage {
                usage.accumulate(turn_usage);
            }

            if response.tool_calls.is_empty() {
                let output = response.content.unwrap_or_default();
                match response.finish_reason {
                    FinishReason::MaxTokens => {
                        return Err(AiError::Agent(
                            "Response truncated due to max token limit".to_string(),
                        ));
                    }
                    FinishReason::Error => {
                        return Err(AiError::Agent("LLM returned an error".to_string()));
                    }
                    _ => {}
                }
                items.push(RunItem::Message(Message::assistant(output.clone())));
                debug!(turn, tools = items.len(), "Agent produced final output");
                return Ok(AgentResponse {
                    output,
                    items,
                    usage,
                });
            }

            // Assistant message must carry the tool calls so results correlate.
            messages.push(Message::assistant_with_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in response.tool_calls {
                items.push(RunItem::ToolCall(ToolCallRaw::Structured {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                }));
                let output = self.call_tool(&call.name, call.arguments).await;
                debug!(tool = %call.name, "Tool call completed");
                messages.push(Message::tool_result(call.id, output.clone()));
                items.push(RunItem::ToolOutput {
                    name: call.name,
                    output,
                });
            }
        }

        Err(AiError::MaxTurns(max_turns))
    }
}

/// Builds [`ReactExecutor`]s sharing one client and tool set.
pub struct ReactExecutorFactory {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    temperature: Option<f32>,
}

impl ReactExecutorFactory {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            tools,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

impl ExecutorFactory for ReactExecutorFactory {
    fn build(&self, spec: AgentSpec) -> Arc<dyn AgentExecutor> {
        Arc::new(
            ReactExecutor::new(self.llm.clone(), self.tools.clone(), spec)
                .with_temperature(self.temperature),
        )
    }
}
