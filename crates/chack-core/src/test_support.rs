//! Scripted collaborators shared by unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chack_ai::{
    AgentExecutor, AgentRequest, AgentResponse, AgentSpec, AiError, ExecutorFactory, Message,
    RunItem, Summarizer, SummaryRequest, TokenUsage, ToolCallRaw,
};
use serde_json::json;
use tokio::sync::Mutex;

enum SummaryScript {
    Fixed(String),
    Sequence(VecDeque<String>),
    Fail,
}

pub struct ScriptedSummarizer {
    script: Mutex<SummaryScript>,
    calls: Mutex<Vec<SummaryRequest>>,
}

impl ScriptedSummarizer {
    pub fn replying(text: &str) -> Self {
        Self::with_script(SummaryScript::Fixed(text.to_string()))
    }

    pub fn sequence(texts: Vec<&str>) -> Self {
        Self::with_script(SummaryScript::Sequence(
            texts.into_iter().map(str::to_string).collect(),
        ))
    }

    pub fn failing() -> Self {
        Self::with_script(SummaryScript::Fail)
    }

    fn with_script(script: SummaryScript) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<SummaryRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, request: SummaryRequest) -> chack_ai::Result<String> {
        self.calls.lock().await.push(request);
        match &mut *self.script.lock().await {
            SummaryScript::Fixed(text) => Ok(text.clone()),
            SummaryScript::Sequence(texts) => texts
                .pop_front()
                .ok_or_else(|| AiError::Summarization("script exhausted".to_string())),
            SummaryScript::Fail => Err(AiError::Summarization("scripted failure".to_string())),
        }
    }
}

/// One scripted executor run.
#[derive(Debug, Clone)]
pub enum Run {
    Reply {
        output: String,
        tools: usize,
        usage: TokenUsage,
    },
    Fail(String),
}

impl Run {
    pub fn reply(output: &str, tools: usize) -> Self {
        Self::Reply {
            output: output.to_string(),
            tools,
            usage: TokenUsage::default(),
        }
    }

    pub fn reply_with_usage(output: &str, tools: usize, usage: TokenUsage) -> Self {
        Self::Reply {
            output: output.to_string(),
            tools,
            usage,
        }
    }

    pub fn fail(message: &str) -> Self {
        Self::Fail(message.to_string())
    }
}

pub fn usage(prompt: u32, completion: u32, cached: u32) -> TokenUsage {
    TokenUsage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
        cached_prompt_tokens: cached,
    }
}

/// Runs and requests shared by every executor a [`ScriptedFactory`] builds.
#[derive(Default)]
struct Shared {
    runs: Mutex<VecDeque<Run>>,
    requests: Mutex<Vec<AgentRequest>>,
    specs: Mutex<Vec<AgentSpec>>,
}

pub struct ScriptedExecutor {
    spec: AgentSpec,
    shared: Arc<Shared>,
}

#[async_trait]
impl AgentExecutor for ScriptedExecutor {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    async fn run(&self, request: AgentRequest) -> chack_ai::Result<AgentResponse> {
        let input = request.input.clone();
        self.shared.requests.lock().await.push(request);
        let run = self
            .shared
            .runs
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Run::reply(&format!("echo: {input}"), 0));

        match run {
            Run::Reply {
                output,
                tools,
                usage,
            } => {
                let mut items: Vec<RunItem> = (0..tools)
                    .map(|i| {
                        RunItem::ToolCall(ToolCallRaw::Structured {
                            name: format!("tool_{i}"),
                            arguments: json!({ "step": i }),
                        })
                    })
                    .collect();
                items.push(RunItem::Message(Message::assistant(output.clone())));
                Ok(AgentResponse {
                    output,
                    items,
                    usage,
                })
            }
            Run::Fail(message) => Err(AiError::Llm(message)),
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedFactory {
    shared: Arc<Shared>,
}

impl ScriptedFactory {
    pub fn new(runs: Vec<Run>) -> Self {
        Self {
            shared: Arc::new(Shared {
                runs: Mutex::new(runs.into()),
                ..Shared::default()
            }),
        }
    }

    pub async fn requests(&self) -> Vec<AgentRequest> {
        self.shared.requests.lock().await.clone()
    }

    pub async fn specs(&self) -> Vec<AgentSpec> {
        self.shared.specs.lock().await.clone()
    }

    /// Executor bound to `spec` without going through `build`.
    pub fn executor(&self, spec: AgentSpec) -> ScriptedExecutor {
        ScriptedExecutor {
            spec,
            shared: self.shared.clone(),
        }
    }
}

impl ExecutorFactory for ScriptedFactory {
    fn build(&self, spec: AgentSpec) -> Arc<dyn AgentExecutor> {
        if let Ok(mut specs) = self.shared.specs.try_lock() {
            specs.push(spec.clone());
        }
        Arc::new(self.executor(spec))
    }
}
