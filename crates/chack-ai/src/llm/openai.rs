//! Chat completions client for OpenAI and compatible endpoints.
//!
//! Requests borrow from the caller's messages and tool schemas; only tool
//! call arguments are re-encoded, since the wire format carries them as a
//! JSON string.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AiError, Result};
use crate::llm::client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, TokenUsage, ToolCall,
};
use crate::llm::retry::{TransportRetry, error_from_response};
use crate::tools::ToolSchema;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1";

const PROVIDER: &str = "openai";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct OpenAIClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: TransportRetry,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: TransportRetry::default(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a compatible server; a trailing slash is ignored.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: TransportRetry) -> Self {
        self.retry = retry;
        self
    }

    async fn send(&self, body: &ChatBody<'_>) -> Result<CompletionResponse> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, PROVIDER).await);
        }
        response.json::<ChatReply>().await?.into_completion()
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatBody::new(&self.model, &request);
        self.retry
            .run("chat completion", || self.send(&body))
            .await
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatBody<'a> {
    fn new(model: &'a str, request: &'a CompletionRequest) -> Self {
        Self {
            model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: request
                .tools
                .iter()
                .map(|function| WireTool {
                    kind: "function",
                    function,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    /// Null only for assistant turns that carry nothing but tool calls.
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<Value>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let tool_calls: Vec<Value> = message
            .tool_calls
            .iter()
            .flatten()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {"name": call.name, "arguments": call.arguments.to_string()},
                })
            })
            .collect();

        let content = if !tool_calls.is_empty() && message.content.is_empty() {
            None
        } else {
            Some(message.content.as_str())
        };

        Self {
            role: message.role.as_str(),
            content,
            tool_call_id: message.tool_call_id.as_deref(),
            tool_calls,
        }
    }
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSchema,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ReplyChoice>,
    usage: Option<ReplyUsage>,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ReplyToolCall>>,
}

#[derive(Deserialize)]
struct ReplyToolCall {
    id: String,
    function: ReplyFunction,
}

#[derive(Deserialize)]
struct ReplyFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ReplyUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

impl From<ReplyUsage> for TokenUsage {
    fn from(usage: ReplyUsage) -> Self {
        let total_tokens = match usage.total_tokens {
            0 => usage.prompt_tokens + usage.completion_tokens,
            total => total,
        };
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens,
            cached_prompt_tokens: usage.prompt_tokens_details.map_or(0, |d| d.cached_tokens),
        }
    }
}

impl ReplyToolCall {
    /// Blank arguments become an empty object; text that is not JSON is
    /// passed through as a string so the tool can report it.
    fn into_call(self) -> ToolCall {
        let raw = self.function.arguments;
        let arguments = if raw.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&raw).unwrap_or(Value::String(raw))
        };
        ToolCall {
            id: self.id,
            name: self.function.name,
            arguments,
        }
    }
}

impl ChatReply {
    fn into_completion(self) -> Result<CompletionResponse> {
        let usage = self.usage.map(TokenUsage::from);
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Llm(format!("{PROVIDER} returned no choices")))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(ReplyToolCall::into_call)
            .collect();

        // Some compatible servers report "stop" alongside tool calls.
        let finish_reason = match choice.finish_reason.as_deref() {
            _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
            Some("stop") | None => FinishReason::Stop,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::MaxTokens,
            Some(_) => FinishReason::Error,
        };

        Ok(CompletionResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}
