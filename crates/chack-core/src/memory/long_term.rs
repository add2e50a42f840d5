//! Durable per-conversation memory.
//!
//! One UTF-8 text file per chat at `<base dir>/<chat id>.txt`, fully replaced
//! on every save. Writes go through a temporary file in the same directory and
//! a rename, so readers never observe a partial record.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chack_ai::summarizer::render_max_chars;
use chack_ai::{Summarizer, SummaryRequest};
use tempfile::NamedTempFile;
use tracing::debug;

use super::window::truncate_chars;
use crate::channel::ConversationId;
use crate::error::ChatError;

/// Default directory name, relative to the config file.
pub const DEFAULT_LONG_TERM_DIR: &str = "longterm";

/// Default character budget for a stored record.
pub const DEFAULT_LONG_TERM_MAX_CHARS: usize = 1500;

pub const DEFAULT_LONG_TERM_PROMPT: &str = "You maintain the long-term memory of a chat assistant. \
Merge the previous memory with the new conversation into an updated memory of at most \
{max_chars} characters. Keep durable facts about the users, their preferences, ongoing work \
and decisions. Drop small talk and anything already resolved. Return only the memory text.";

#[derive(Debug, Clone)]
pub struct LongTermMemoryStore {
    base_dir: PathBuf,
    summary_prompt: String,
}

impl LongTermMemoryStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            summary_prompt: DEFAULT_LONG_TERM_PROMPT.to_string(),
        }
    }

    pub fn with_summary_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.trim().is_empty() {
            self.summary_prompt = prompt;
        }
        self
    }

    /// Resolve a configured directory; relative paths are taken from the
    /// directory holding the config file.
    pub fn resolve_dir(config_dir: &Path, dir: &str) -> PathBuf {
        let dir = Path::new(dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            config_dir.join(dir)
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_for(&self, id: &ConversationId) -> PathBuf {
        self.base_dir
            .join(format!("{}.txt", sanitize_file_stem(&id.chat_id)))
    }

    /// Stored record with surrounding whitespace trimmed; empty when absent.
    pub fn load(&self, id: &ConversationId) -> Result<String, ChatError> {
        match fs::read_to_string(self.path_for(id)) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the record with `text` cut to `max_chars` characters.
    pub fn save(&self, id: &ConversationId, text: &str, max_chars: usize) -> Result<PathBuf, ChatError> {
        let content = truncate_chars(text, max_chars);
        fs::create_dir_all(&self.base_dir)?;

        let path = self.path_for(id);
        let mut temp = NamedTempFile::new_in(&self.base_dir)?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(&path).map_err(|e| e.error)?;

        debug!(
            conversation = %id,
            chars = content.chars().count(),
            "Saved long-term memory to {}",
            path.display()
        );
        Ok(path)
    }

    /// Merge `transcript` into `previous` through the summarizer.
    ///
    /// An empty transcript returns `previous` without a summarizer call.
    pub async fn finalize(
        &self,
        summarizer: &dyn Summarizer,
        transcript: &str,
        previous: &str,
        max_chars: usize,
    ) -> Result<String, ChatError> {
        if transcript.trim().is_empty() {
            return Ok(previous.to_string());
        }

        let request = SummaryRequest {
            instructions: render_max_chars(&self.summary_prompt, max_chars),
            previous: previous.to_string(),
            transcript: transcript.to_string(),
        };
        let updated = summarizer.summarize(request).await?;
        Ok(truncate_chars(&updated, max_chars))
    }
}

/// Map a chat id onto a safe file stem.
fn sanitize_file_stem(chat_id: &str) -> String {
    let stem: String = chat_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}
