//! Short-term memory - bounded conversation window with a running summary
//!
//! Messages are appended at the tail. Once the window holds more than
//! `max_messages`, the oldest messages are folded into a running summary by an
//! external [`Summarizer`] and removed as one batch, leaving `reset_to`
//! messages. Messages are never dropped without the summary being updated.
//!
//! # Example
//!
//! ```
//! use chack_core::memory::{ShortTermMemoryWindow, WindowConfig};
//! use chack_ai::Role;
//!
//! let mut window = ShortTermMemoryWindow::new(WindowConfig::with_limit(4));
//! window.append(Role::User, "Hello");
//! window.append(Role::Assistant, "Hi there!");
//!
//! assert_eq!(window.len(), 2);
//! assert!(!window.needs_compaction());
//! ```

use std::collections::VecDeque;

use chack_ai::summarizer::render_max_chars;
use chack_ai::{AiError, Message, Role, Summarizer, SummaryRequest};

/// Default trigger threshold
pub const DEFAULT_MAX_MESSAGES: usize = 16;

/// Default character budget for summaries
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 1500;

/// Running-summary prompt used when none is configured.
pub const DEFAULT_SUMMARY_PROMPT: &str = "Progressively summarize the conversation below, \
adding onto the previous summary and returning a new summary of at most {max_chars} \
characters. Keep names, decisions, open tasks and facts the user asked to remember.\n\n\
Current summary:\n{summary}\n\nNew lines of conversation:\n{new_lines}\n\nNew summary:";

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// Compaction triggers when the window holds more than this many messages.
    /// Values below one are raised to one.
    pub max_messages: usize,
    /// Messages kept after compaction. Zero means `max_messages`.
    pub reset_to: usize,
    /// Summary budget in characters. Zero means unbounded.
    pub summary_max_chars: usize,
    pub summary_prompt: String,
}

impl WindowConfig {
    pub fn with_limit(max_messages: usize) -> Self {
        Self {
            max_messages,
            ..Self::default()
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            reset_to: 0,
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            summary_prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShortTermMemoryWindow {
    /// Messages stored in order (oldest first)
    messages: VecDeque<Message>,
    summary: String,
    trigger: usize,
    target: usize,
    summary_max_chars: usize,
    summary_prompt: String,
}

impl Default for ShortTermMemoryWindow {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

impl ShortTermMemoryWindow {
    pub fn new(config: WindowConfig) -> Self {
        let trigger = config.max_messages.max(1);
        let target = match config.reset_to {
            0 => trigger,
            n => n.min(trigger),
        };

        Self {
            messages: VecDeque::with_capacity(trigger.saturating_add(2)),
            summary: String::new(),
            trigger,
            target,
            summary_max_chars: config.summary_max_chars,
            summary_prompt: config.summary_prompt,
        }
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push_back(Message::new(role, content));
    }

    /// Messages in order from oldest to newest.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// Running summary, if any compaction has happened.
    pub fn summary(&self) -> Option<&str> {
        if self.summary.is_empty() {
            None
        } else {
            Some(&self.summary)
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn trigger(&self) -> usize {
        self.trigger
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn needs_compaction(&self) -> bool {
        self.messages.len() > self.trigger
    }

    /// Fold the oldest messages into the running summary when over the trigger.
    ///
    /// Returns the new summary when compaction happened. On summarizer failure,
    /// including blank output, the window is left untouched and the error is
    /// returned; the next call retries with the (larger) excess.
    pub async fn maybe_compact(
        &mut self,
        summarizer: &dyn Summarizer,
    ) -> chack_ai::Result<Option<String>> {
        if !self.needs_compaction() {
            return Ok(None);
        }

        let excess = self.messages.len() - self.target;
        let transcript = format_messages(self.messages.iter().take(excess));
        if transcript.is_empty() {
            self.messages.drain(..excess);
            return Ok(None);
        }

        let request = SummaryRequest {
            instructions: render_max_chars(&self.summary_prompt, self.summary_max_chars),
            previous: self.summary.clone(),
            transcript,
        };
        let updated = summarizer.summarize(request).await?;
        if updated.trim().is_empty() {
            return Err(AiError::Summarization(
                "summarizer returned empty text".to_string(),
            ));
        }

        self.summary = truncate_chars(&updated, self.summary_max_chars);
        self.messages.drain(..excess);
        Ok(Some(self.summary.clone()))
    }

    /// Summary plus remaining messages, as text for long-term finalization.
    pub fn render_transcript(&self) -> String {
        let messages = format_messages(self.messages.iter());
        match (self.summary.is_empty(), messages.is_empty()) {
            (true, _) => messages,
            (false, true) => format!("summary: {}", self.summary),
            (false, false) => format!("summary: {}\n{}", self.summary, messages),
        }
    }
}

/// One `role: content` line per non-blank message, surrounding whitespace trimmed.
pub fn format_messages<'a>(messages: impl IntoIterator<Item = &'a Message>) -> String {
    messages
        .into_iter()
        .filter(|msg| !msg.content.trim().is_empty())
        .map(|msg| format!("{}: {}", msg.role, msg.content))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Keep the first `max_chars` characters and trim trailing whitespace.
/// Zero means no limit.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    head.trim_end().to_string()
}
