//! Summarization boundary used by short- and long-term memory.
//!
//! Two prompt shapes are supported. A template that carries both `{summary}`
//! and `{new_lines}` placeholders is rendered into the user message and sent
//! under a fixed system instruction (running-summary style). Any other text is
//! used as the system instruction, and the user message lists the previous
//! memory followed by the full conversation (long-term style).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AiError, Result};
use crate::llm::{CompletionRequest, LlmClient, Message};

pub const SUMMARY_PLACEHOLDER: &str = "{summary}";
pub const NEW_LINES_PLACEHOLDER: &str = "{new_lines}";
pub const MAX_CHARS_PLACEHOLDER: &str = "{max_chars}";

const RUNNING_SUMMARY_INSTRUCTION: &str =
    "Update the running summary. Return only the updated summary.";

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    /// Prompt template with `{max_chars}` already substituted.
    pub instructions: String,
    pub previous: String,
    pub transcript: String,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Returns the updated summary text, trimmed. Empty output is an error.
    async fn summarize(&self, request: SummaryRequest) -> Result<String>;
}

/// Substitute `{max_chars}` in a configured prompt.
pub fn render_max_chars(template: &str, max_chars: usize) -> String {
    template
        .trim()
        .replace(MAX_CHARS_PLACEHOLDER, &max_chars.to_string())
}

fn previous_or_none(previous: &str) -> &str {
    if previous.trim().is_empty() {
        "None"
    } else {
        previous
    }
}

/// Build the (system, user) message pair for a summary request.
pub fn build_summary_messages(request: &SummaryRequest) -> (String, String) {
    let previous = previous_or_none(&request.previous);
    if request.instructions.contains(SUMMARY_PLACEHOLDER)
        && request.instructions.contains(NEW_LINES_PLACEHOLDER)
    {
        let human = request
            .instructions
            .replace(SUMMARY_PLACEHOLDER, previous)
            .replace(NEW_LINES_PLACEHOLDER, &request.transcript);
        return (RUNNING_SUMMARY_INSTRUCTION.to_string(), human);
    }

    let human = format!(
        "### Previous memory (if any):\n{}\n\n### Full conversation:\n{}\n\n### Write the updated long-term memory now.",
        previous, request.transcript
    );
    (request.instructions.clone(), human)
}

/// Summarizer backed by a single tool-less completion.
pub struct LlmSummarizer {
    llm: Arc<dyn LlmClient>,
    temperature: Option<f32>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, request: SummaryRequest) -> Result<String> {
        let (system, human) = build_summary_messages(&request);
        let mut completion =
            CompletionRequest::new(vec![Message::system(system), Message::user(human)]);
        if let Some(temperature) = self.temperature {
            completion = completion.with_temperature(temperature);
        }

        let response = self.llm.complete(completion).await?;
        let text = response.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(AiError::Summarization(
                "summarizer returned empty text".to_string(),
            ));
        }
        Ok(text)
    }
}
