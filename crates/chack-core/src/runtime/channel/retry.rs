//! Minimum tool-usage enforcement around one agent invocation.
//!
//! Each attempt is a full replay of the request. Attempts after the first get
//! the configured hint appended to the user text. Nothing from a rejected
//! attempt is returned, so the caller only ever records the accepted run.

use chack_ai::{AgentExecutor, AgentRequest, TokenUsage, ToolStep};
use tracing::{debug, warn};

use crate::error::ChatError;

/// Placeholder replaced by the configured minimum in the hint.
pub const MIN_TOOLS_PLACEHOLDER: &str = "{min_tools}";

pub const DEFAULT_MIN_TOOLS: usize = 10;
pub const DEFAULT_MAX_ATTEMPTS: usize = 20;

pub const DEFAULT_TOOL_USAGE_HINT: &str = "\n\nIMPORTANT: Use at least {min_tools} tools before \
your final answer. Always use tools to check for more data, confirm actions were performed, or \
verify assumptions by searching the internet.";

#[derive(Debug, Clone, PartialEq)]
pub struct ToolUsagePolicy {
    /// Tool calls required before an answer is accepted. Zero accepts any answer.
    pub min_tools: usize,
    /// Upper bound on attempts; zero is treated as one.
    pub max_attempts: usize,
    /// Appended to the user text on retries; `None` replays the text unchanged.
    pub hint: Option<String>,
}

impl Default for ToolUsagePolicy {
    fn default() -> Self {
        Self {
            min_tools: DEFAULT_MIN_TOOLS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            hint: Some(DEFAULT_TOOL_USAGE_HINT.to_string()),
        }
    }
}

impl ToolUsagePolicy {
    pub fn disabled() -> Self {
        Self {
            min_tools: 0,
            max_attempts: 1,
            hint: None,
        }
    }

    /// Drop the tool minimum when the agent has no tools to call.
    ///
    /// A registry with at least one tool keeps the minimum, since one tool can
    /// be called repeatedly.
    pub fn for_available_tools(mut self, available: usize) -> Self {
        if available == 0 && self.min_tools > 0 {
            warn!(
                min_tools = self.min_tools,
                "No tools are registered, accepting answers without tool calls"
            );
            self.min_tools = 0;
        }
        self
    }

    /// User text for attempt `attempt` (zero-based).
    pub fn input_for_attempt(&self, user_text: &str, attempt: usize) -> String {
        match &self.hint {
            Some(hint) if attempt > 0 && self.min_tools > 0 => format!(
                "{user_text}{}",
                hint.replace(MIN_TOOLS_PLACEHOLDER, &self.min_tools.to_string())
            ),
            _ => user_text.to_string(),
        }
    }

    fn accepts(&self, observed: usize) -> bool {
        self.min_tools == 0 || observed >= self.min_tools
    }
}

/// Result of the attempt that satisfied the policy.
#[derive(Debug, Clone)]
pub struct AcceptedRun {
    pub output: String,
    pub tool_steps: Vec<ToolStep>,
    /// Usage of the accepted attempt only.
    pub usage: TokenUsage,
    pub attempts: usize,
    /// Usage of every attempt, in order.
    pub attempt_usage: Vec<TokenUsage>,
}

#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: ToolUsagePolicy,
}

impl RetryController {
    pub fn new(policy: ToolUsagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ToolUsagePolicy {
        &self.policy
    }

    /// Run `executor` until an attempt makes enough tool calls.
    ///
    /// `context` carries the summary and history; its `input` is replaced per
    /// attempt. An executor error ends the loop as [`ChatError::Upstream`].
    pub async fn invoke(
        &self,
        executor: &dyn AgentExecutor,
        context: AgentRequest,
        user_text: &str,
    ) -> Result<AcceptedRun, ChatError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt_usage = Vec::with_capacity(max_attempts);
        let mut observed = 0;

        for attempt in 0..max_attempts {
            let request = AgentRequest {
                input: self.policy.input_for_attempt(user_text, attempt),
                ..context.clone()
            };

            let response = executor
                .run(request)
                .await
                .map_err(|e| ChatError::Upstream(e.to_string()))?;
            attempt_usage.push(response.usage);

            let tool_steps = response.tool_steps();
            observed = tool_steps.len();
            if self.policy.accepts(observed) {
                debug!(
                    attempt = attempt + 1,
                    tools = observed,
                    "Accepted agent response"
                );
                return Ok(AcceptedRun {
                    output: response.output,
                    tool_steps,
                    usage: response.usage,
                    attempts: attempt + 1,
                    attempt_usage,
                });
            }

            warn!(
                attempt = attempt + 1,
                max_attempts,
                observed,
                required = self.policy.min_tools,
                "Agent used too few tools, retrying"
            );
        }

        Err(ChatError::MinimumToolUsageNotMet {
            required: self.policy.min_tools,
            observed,
            attempts: max_attempts,
        })
    }
}
