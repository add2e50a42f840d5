//! Inbound message authorization.
//!
//! A message passes when its sender or chat is on the platform allow-list
//! (`authorized`) and its text passes the content gate. Management commands
//! such as `/reset` only need the first check.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::types::{ConversationKind, InboundMessage};

/// Allow-list settings for one platform, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub allow_dms: bool,
    #[serde(deserialize_with = "deserialize_id_list")]
    pub dm_allowlist_ids: Vec<String>,
    pub dm_allowlist_usernames: Vec<String>,
    pub dm_allowlist_usernames_regex: Vec<String>,
    pub dm_require_regex: Vec<String>,
    pub allow_groups: bool,
    #[serde(alias = "channel_ids", deserialize_with = "deserialize_id_list")]
    pub group_allowlist_ids: Vec<String>,
    pub group_allowlist_title_regex: Vec<String>,
    pub group_require_regex: Vec<String>,
    /// Case-insensitive substrings; when set, one must appear in the text.
    pub trigger_words: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allow_dms: true,
            dm_allowlist_ids: Vec::new(),
            dm_allowlist_usernames: Vec::new(),
            dm_allowlist_usernames_regex: Vec::new(),
            dm_require_regex: Vec::new(),
            allow_groups: true,
            group_allowlist_ids: Vec::new(),
            group_allowlist_title_regex: Vec::new(),
            group_require_regex: Vec::new(),
            trigger_words: Vec::new(),
        }
    }
}

impl AccessConfig {
    pub fn dm_allowlist_is_empty(&self) -> bool {
        self.dm_allowlist_ids.is_empty()
            && self.dm_allowlist_usernames.is_empty()
            && self.dm_allowlist_usernames_regex.is_empty()
    }

    pub fn group_allowlist_is_empty(&self) -> bool {
        self.group_allowlist_ids.is_empty() && self.group_allowlist_title_regex.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Int(i64),
    Str(String),
}

/// Accept ids written as numbers or strings; blank entries are dropped.
fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<IdValue>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|value| match value {
            IdValue::Int(id) => id.to_string(),
            IdValue::Str(id) => id.trim().to_string(),
        })
        .filter(|id| !id.is_empty())
        .collect())
}

/// Compile case-insensitive patterns, skipping invalid ones.
pub fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Skipping invalid access pattern");
                    None
                }
            }
        })
        .collect()
}

/// An empty pattern set matches everything.
fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p.is_match(text))
}

/// Compiled allow-list for one platform.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allow_dms: bool,
    dm_ids: HashSet<String>,
    dm_usernames: HashSet<String>,
    dm_username_patterns: Vec<Regex>,
    dm_require: Vec<Regex>,
    allow_groups: bool,
    group_ids: HashSet<String>,
    group_title_patterns: Vec<Regex>,
    group_require: Vec<Regex>,
    trigger_words: Vec<String>,
}

impl AccessPolicy {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            allow_dms: config.allow_dms,
            dm_ids: config.dm_allowlist_ids.iter().cloned().collect(),
            dm_usernames: config
                .dm_allowlist_usernames
                .iter()
                .map(|u| normalize_username(u))
                .filter(|u| !u.is_empty())
                .collect(),
            dm_username_patterns: compile_patterns(&config.dm_allowlist_usernames_regex),
            dm_require: compile_patterns(&config.dm_require_regex),
            allow_groups: config.allow_groups,
            group_ids: config.group_allowlist_ids.iter().cloned().collect(),
            group_title_patterns: compile_patterns(&config.group_allowlist_title_regex),
            group_require: compile_patterns(&config.group_require_regex),
            trigger_words: config
                .trigger_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Policy that lets every conversation through.
    pub fn open() -> Self {
        Self::from_config(&AccessConfig::default())
    }

    /// Whether the sender (direct) or chat (group) is on the allow-list.
    pub fn authorized(&self, message: &InboundMessage) -> bool {
        match message.kind {
            ConversationKind::Direct => {
                self.allow_dms
                    && self.user_allowed(&message.sender_id, message.sender_name.as_deref())
            }
            ConversationKind::Group => {
                self.allow_groups
                    && self.group_allowed(&message.conversation_id, message.chat_title.as_deref())
            }
        }
    }

    /// Authorization plus the content gate.
    pub fn allowed(&self, message: &InboundMessage) -> bool {
        self.authorized(message) && self.content_allowed(message.kind, &message.content)
    }

    fn user_allowed(&self, sender_id: &str, username: Option<&str>) -> bool {
        if self.dm_ids.is_empty()
            && self.dm_usernames.is_empty()
            && self.dm_username_patterns.is_empty()
        {
            return true;
        }
        if self.dm_ids.contains(sender_id) {
            return true;
        }
        let Some(username) = username.map(normalize_username).filter(|u| !u.is_empty()) else {
            return false;
        };
        self.dm_usernames.contains(&username)
            || self
                .dm_username_patterns
                .iter()
                .any(|p| p.is_match(&username))
    }

    fn group_allowed(&self, chat_id: &str, title: Option<&str>) -> bool {
        if self.group_ids.is_empty() && self.group_title_patterns.is_empty() {
            return true;
        }
        if self.group_ids.contains(chat_id) {
            return true;
        }
        title.is_some_and(|title| self.group_title_patterns.iter().any(|p| p.is_match(title)))
    }

    fn content_allowed(&self, kind: ConversationKind, text: &str) -> bool {
        let patterns = match kind {
            ConversationKind::Direct => &self.dm_require,
            ConversationKind::Group => &self.group_require,
        };
        if !matches_any(patterns, text) {
            return false;
        }
        if self.trigger_words.is_empty() {
            return true;
        }
        let lower = text.to_lowercase();
        self.trigger_words.iter().any(|w| lower.contains(w.as_str()))
    }
}

fn normalize_username(name: &str) -> String {
    name.trim().trim_start_matches('@').to_lowercase()
}
