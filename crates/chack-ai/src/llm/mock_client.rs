//! Scripted model for agent and summarizer tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AiError, Result};

use super::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Role, TokenUsage, ToolCall,
};

/// One scripted completion.
#[derive(Debug, Clone)]
pub enum MockStep {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    Error(String),
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    fn into_response(self) -> Result<CompletionResponse> {
        match self {
            Self::Text(content) => Ok(text_response(content)),
            Self::ToolCall {
                id,
                name,
                arguments,
            } => Ok(CompletionResponse {
                content: None,
                tool_calls: vec![ToolCall {
                    id,
                    name,
                    arguments,
                }],
                finish_reason: FinishReason::ToolCalls,
                usage: Some(usage(0)),
            }),
            Self::Error(message) => Err(AiError::Llm(message)),
        }
    }
}

/// Plays back [`MockStep`]s in order and records every request. Once the
/// script runs out it echoes the last user message.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<MockStep>,
    requests: Vec<CompletionRequest>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::from_steps(model, Vec::new())
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            state: Arc::new(Mutex::new(MockState {
                script: steps.into(),
                requests: Vec::new(),
            })),
        }
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.state().requests.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let step = {
            let mut state = self.state();
            state.requests.push(request.clone());
            state.script.pop_front()
        };

        match step {
            Some(step) => step.into_response(),
            None => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map_or("", |m| m.content.as_str());
                Ok(text_response(format!("echo: {last_user}")))
            }
        }
    }
}

fn text_response(content: String) -> CompletionResponse {
    CompletionResponse {
        usage: Some(usage(content.chars().count())),
        content: Some(content),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
    }
}

/// One prompt token plus one completion token per output character.
fn usage(chars: usize) -> TokenUsage {
    let completion_tokens = u32::try_from(chars).unwrap_or(u32::MAX);
    TokenUsage {
        prompt_tokens: 1,
        completion_tokens,
        total_tokens: completion_tokens.saturating_add(1),
        cached_prompt_tokens: 0,
    }
}
