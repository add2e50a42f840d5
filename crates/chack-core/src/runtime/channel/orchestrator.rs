//! Conversation Orchestrator - one inbound message to one reply.
//!
//! For every message the orchestrator:
//! 1. Checks the platform allow-list
//! 2. Resolves the conversation's session, rebuilding it after an idle timeout
//! 3. Runs the agent under the tool-usage policy while a typing indicator runs
//! 4. Records the accepted turn in short-term memory and compacts it
//! 5. Sends the reply, with a usage footer, in platform-sized fragments
//!
//! `/reset` finalizes long-term memory and evicts the session on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chack_ai::agent::format_tool_steps;
use chack_ai::{AgentRequest, Role, Summarizer};
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use super::commands::{Command, HELP_TEXT, RESET_REPLY, parse_command};
use super::retry::{AcceptedRun, RetryController};
use super::typing::{TYPING_REFRESH_INTERVAL, TypingIndicator};
use crate::channel::{AccessPolicy, ChannelRouter, ChannelType, ConversationId, InboundMessage};
use crate::error::ChatError;
use crate::pricing::{PricingTable, format_cost};
use crate::session::{ChatSession, SessionRegistry};

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Dropped by the allow-list.
    Denied,
    /// Nothing to answer (blank text).
    Ignored,
    Replied,
    Reset,
    Help,
    /// The user got the generic failure reply.
    Failed,
}

/// Usage footer appended to every reply.
pub fn format_reply(
    output: &str,
    tools_used: usize,
    max_turns: usize,
    cost: Option<f64>,
) -> String {
    let rounds = if output.is_empty() {
        tools_used
    } else {
        tools_used + 1
    };
    format!(
        "{output}\n\n🔁 {rounds}/{max_turns} | 🧰 {tools_used} | 💲 {}",
        format_cost(cost)
    )
}

pub struct ConversationOrchestrator {
    registry: Arc<SessionRegistry>,
    router: Arc<ChannelRouter>,
    summarizer: Arc<dyn Summarizer>,
    retry: RetryController,
    pricing: Arc<PricingTable>,
    /// Model name used for cost lookups.
    pricing_model: String,
    access: HashMap<ChannelType, AccessPolicy>,
    typing_interval: Duration,
}

impl ConversationOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        router: Arc<ChannelRouter>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            registry,
            router,
            summarizer,
            retry: RetryController::default(),
            pricing: Arc::new(PricingTable::default()),
            pricing_model: String::new(),
            access: HashMap::new(),
            typing_interval: TYPING_REFRESH_INTERVAL,
        }
    }

    pub fn with_retry(mut self, retry: RetryController) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pricing(mut self, pricing: Arc<PricingTable>, model: impl Into<String>) -> Self {
        self.pricing = pricing;
        self.pricing_model = model.into();
        self
    }

    /// Allow-list for one platform. Platforms without one are open.
    pub fn with_access(mut self, channel: ChannelType, policy: AccessPolicy) -> Self {
        self.access.insert(channel, policy);
        self
    }

    pub fn with_typing_interval(mut self, interval: Duration) -> Self {
        self.typing_interval = interval;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    fn policy(&self, channel: ChannelType) -> Option<&AccessPolicy> {
        self.access.get(&channel)
    }

    /// Process one inbound message end to end.
    ///
    /// Returns an error only when a reply could not be delivered.
    pub async fn handle(&self, message: &InboundMessage) -> Result<TurnOutcome> {
        let id = message.conversation();
        let policy = self.policy(message.channel_type);

        if let Some(command) = parse_command(&message.content) {
            if policy.is_some_and(|p| !p.authorized(message)) {
                debug!("{}", ChatError::AuthorizationDenied(id.to_string()));
                return Ok(TurnOutcome::Denied);
            }
            return self.handle_command(command, message, &id).await;
        }

        if policy.is_some_and(|p| !p.allowed(message)) {
            debug!("{}", ChatError::AuthorizationDenied(id.to_string()));
            return Ok(TurnOutcome::Denied);
        }

        if message.content.trim().is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let mut session = self.acquire_session(&id).await;
        info!(
            conversation = %id,
            sender = %message.sender_id,
            "Processing chat message"
        );

        let typing = TypingIndicator::start_with_interval(
            self.router.clone(),
            message.channel_type,
            message.conversation_id.clone(),
            self.typing_interval,
        );
        let context = AgentRequest::default()
            .with_summary(session.window.summary().map(str::to_string))
            .with_history(session.window.snapshot());
        let result = self
            .retry
            .invoke(session.executor.as_ref(), context, &message.content)
            .await;
        drop(typing);

        let run = match result {
            Ok(run) => run,
            Err(e) => {
                error!(conversation = %id, error = %e, "Failed to process message");
                self.send_failure(message, &e).await?;
                return Ok(TurnOutcome::Failed);
            }
        };

        let reply = self.record_turn(&mut session, &message.content, &run).await;

        if let Err(e) = self
            .router
            .send_chunked(message.channel_type, &message.conversation_id, &reply)
            .await
        {
            error!(conversation = %id, error = %e, "Failed to deliver reply");
            let failure = ChatError::Upstream(e.to_string());
            self.send_failure(message, &failure).await?;
            return Ok(TurnOutcome::Failed);
        }

        session.touch();
        info!(
            conversation = %id,
            attempts = run.attempts,
            tools = run.tool_steps.len(),
            output_chars = run.output.chars().count(),
            "Chat response sent"
        );
        Ok(TurnOutcome::Replied)
    }

    /// Lock the live session for `id`, finalizing and replacing it when idle.
    async fn acquire_session(&self, id: &ConversationId) -> OwnedMutexGuard<ChatSession> {
        let reset_minutes = self.registry.settings(id.channel).reset_minutes;
        loop {
            let handle = self.registry.get_or_create(id).await;
            let session = handle.clone().lock_owned().await;

            // Evicted by /reset or an idle rebuild while we waited.
            if !self.registry.is_current(id, &handle).await {
                continue;
            }

            if session.is_idle(reset_minutes, Utc::now().timestamp_millis()) {
                info!(conversation = %id, reset_minutes, "Session idle, starting fresh");
                self.finalize(&session).await;
                self.registry.evict(id).await;
                continue;
            }

            return session;
        }
    }

    /// Append the accepted turn, compact, and build the reply text.
    async fn record_turn(
        &self,
        session: &mut ChatSession,
        input: &str,
        run: &AcceptedRun,
    ) -> String {
        session.window.append(Role::User, input);
        session.window.append(Role::Assistant, run.output.clone());
        if let Err(e) = session.window.maybe_compact(self.summarizer.as_ref()).await {
            warn!(
                conversation = %session.id,
                error = %e,
                "Failed to compact short-term memory, keeping messages"
            );
        }

        if !run.tool_steps.is_empty() {
            debug!(
                conversation = %session.id,
                "Tool steps:\n{}",
                format_tool_steps(&run.tool_steps)
            );
        }

        let usage = &run.usage;
        let cost = self.pricing.estimate(
            &self.pricing_model,
            u64::from(usage.prompt_tokens),
            u64::from(usage.completion_tokens),
            u64::from(usage.cached_prompt_tokens),
        );
        format_reply(
            &run.output,
            run.tool_steps.len(),
            session.executor.spec().max_turns,
            cost,
        )
    }

    async fn handle_command(
        &self,
        command: Command,
        message: &InboundMessage,
        id: &ConversationId,
    ) -> Result<TurnOutcome> {
        debug!("Handling command {:?} from {}", command, message.sender_id);
        match command {
            Command::Reset => {
                self.reset(id).await;
                self.router
                    .send_chunked(message.channel_type, &message.conversation_id, RESET_REPLY)
                    .await?;
                Ok(TurnOutcome::Reset)
            }
            Command::Help => {
                self.router
                    .send_chunked(message.channel_type, &message.conversation_id, HELP_TEXT)
                    .await?;
                Ok(TurnOutcome::Help)
            }
        }
    }

    /// Finalize long-term memory and evict the session, if one exists.
    pub async fn reset(&self, id: &ConversationId) {
        let Some(handle) = self.registry.get(id).await else {
            return;
        };
        let session = handle.lock().await;
        if !self.registry.is_current(id, &handle).await {
            return;
        }
        self.finalize(&session).await;
        self.registry.evict(id).await;
    }

    /// Fold the session's transcript into its long-term record.
    ///
    /// Failures are logged; the previous record stays in place.
    async fn finalize(&self, session: &ChatSession) {
        let settings = self.registry.settings(session.id.channel);
        let Some(long_term) = &settings.long_term else {
            return;
        };

        let previous = match long_term.store.load(&session.id) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(conversation = %session.id, error = %e, "Failed to read long-term memory");
                return;
            }
        };

        let transcript = session.window.render_transcript();
        let updated = match long_term
            .store
            .finalize(
                self.summarizer.as_ref(),
                &transcript,
                &previous,
                long_term.max_chars,
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                warn!(conversation = %session.id, error = %e, "Failed to build long-term memory");
                return;
            }
        };

        if updated.is_empty() || updated == previous {
            return;
        }
        match long_term.store.save(&session.id, &updated, long_term.max_chars) {
            Ok(path) => info!(
                conversation = %session.id,
                "Long-term memory updated at {}",
                path.display()
            ),
            Err(e) => warn!(conversation = %session.id, error = %e, "Failed to save long-term memory"),
        }
    }

    async fn send_failure(&self, message: &InboundMessage, error: &ChatError) -> Result<()> {
        let Some(text) = error.user_message() else {
            return Ok(());
        };
        self.router
            .send_chunked(message.channel_type, &message.conversation_id, text)
            .await
            .map(|_| ())
    }
}
