//! Gateway configuration
//!
//! Loaded from YAML (`CHACK_CONFIG`, default `./config/chack.yaml`). String
//! values may reference environment variables as `${NAME}`; unset variables
//! expand to an empty string. A `$$TOOLS$$` marker in a system prompt is
//! replaced with the contents of `TOOLS.md` next to the config file.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;
use tracing::warn;

use crate::channel::{AccessConfig, AccessPolicy, ChannelType};
use crate::memory::{
    DEFAULT_LONG_TERM_DIR, DEFAULT_LONG_TERM_MAX_CHARS, DEFAULT_LONG_TERM_PROMPT,
    DEFAULT_MAX_MESSAGES, DEFAULT_SUMMARY_PROMPT, LongTermMemoryStore, WindowConfig,
};
use crate::runtime::channel::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_TOOLS, DEFAULT_TOOL_USAGE_HINT, ToolUsagePolicy,
};
use crate::session::{DEFAULT_RESET_MINUTES, LongTermSettings, SessionSettings};

pub const CONFIG_PATH_ENV: &str = "CHACK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./config/chack.yaml";

/// Marker replaced by `TOOLS.md` in system prompts.
pub const TOOLS_MARKER: &str = "$$TOOLS$$";
pub const TOOLS_FILE: &str = "TOOLS.md";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{0} is required in the config file")]
    Missing(&'static str),
    #[error("{} is required when using $$TOOLS$$ in system_prompt", .0.display())]
    ToolsFileMissing(PathBuf),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChackConfig {
    pub model: ModelConfig,
    pub system_prompt: String,
    pub telegram: ChannelConfig,
    pub discord: ChannelConfig,
    pub console: ChannelConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
    /// Pricing file; `CHACK_PRICING` takes precedence.
    pub pricing_path: Option<String>,
    /// Directory holding the config file; relative paths resolve against it.
    #[serde(skip)]
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub primary: String,
    /// Model for summaries and cost lookups; falls back to `primary`.
    pub chat: String,
    pub temperature: f32,
    pub base_url: Option<String>,
    pub api_key: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            primary: String::new(),
            chat: String::new(),
            temperature: 0.2,
            base_url: None,
            api_key: String::new(),
        }
    }
}

/// Settings for one chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Defaults to on for Telegram and the console, off for Discord.
    pub enabled: Option<bool>,
    pub token: String,
    /// Defaults to 75, or 50 for Discord.
    pub max_turns: Option<usize>,
    pub memory_max_messages: usize,
    pub memory_reset_to_messages: usize,
    pub memory_summary_prompt: String,
    pub memory_reset_minutes: u64,
    pub long_term_memory_enabled: bool,
    pub long_term_memory_max_chars: usize,
    pub long_term_memory_dir: String,
    pub long_term_memory_summary_prompt: String,
    /// Overrides the top-level prompt when set.
    pub system_prompt: String,
    pub message_limit: Option<usize>,
    #[serde(flatten)]
    pub access: AccessConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            token: String::new(),
            max_turns: None,
            memory_max_messages: DEFAULT_MAX_MESSAGES,
            memory_reset_to_messages: 0,
            memory_summary_prompt: String::new(),
            memory_reset_minutes: DEFAULT_RESET_MINUTES,
            long_term_memory_enabled: true,
            long_term_memory_max_chars: DEFAULT_LONG_TERM_MAX_CHARS,
            long_term_memory_dir: DEFAULT_LONG_TERM_DIR.to_string(),
            long_term_memory_summary_prompt: String::new(),
            system_prompt: String::new(),
            message_limit: None,
            access: AccessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub min_tools_used: usize,
    pub max_tool_attempts: usize,
    /// Retry hint; `{min_tools}` is substituted.
    pub tool_usage_hint: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            min_tools_used: DEFAULT_MIN_TOOLS,
            max_tool_attempts: DEFAULT_MAX_ATTEMPTS,
            tool_usage_hint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily log files are written here when set.
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

/// Config path from `CHACK_CONFIG`, or the default.
pub fn resolve_config_path() -> PathBuf {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

impl ChackConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_yaml(&raw, &config_dir)
    }

    pub fn from_yaml(raw: &str, config_dir: &Path) -> Result<Self, ConfigError> {
        let mut value: Value = serde_yaml::from_str(raw)?;
        if value.is_null() {
            value = Value::Mapping(Default::default());
        }
        interpolate_env(&mut value);

        let mut config: ChackConfig = serde_yaml::from_value(value)?;
        config.config_dir = config_dir.to_path_buf();

        config.system_prompt = config.system_prompt.trim().to_string();
        if config.system_prompt.is_empty() {
            return Err(ConfigError::Missing("system_prompt"));
        }
        if config.model.primary.trim().is_empty() {
            return Err(ConfigError::Missing("model.primary"));
        }

        let tools_path = config_dir.join(TOOLS_FILE);
        let mut tools_text: Option<String> = None;
        for prompt in [
            &mut config.system_prompt,
            &mut config.telegram.system_prompt,
            &mut config.discord.system_prompt,
            &mut config.console.system_prompt,
        ] {
            if !prompt.contains(TOOLS_MARKER) {
                continue;
            }
            if tools_text.is_none() {
                let text = std::fs::read_to_string(&tools_path)
                    .map_err(|_| ConfigError::ToolsFileMissing(tools_path.clone()))?;
                tools_text = Some(text.trim().to_string());
            }
            if let Some(text) = &tools_text {
                *prompt = prompt.replace(TOOLS_MARKER, text);
            }
        }

        Ok(config)
    }

    pub fn channel(&self, channel: ChannelType) -> &ChannelConfig {
        match channel {
            ChannelType::Telegram => &self.telegram,
            ChannelType::Discord => &self.discord,
            ChannelType::Console => &self.console,
        }
    }

    pub fn is_enabled(&self, channel: ChannelType) -> bool {
        self.channel(channel)
            .enabled
            .unwrap_or(channel != ChannelType::Discord)
    }

    pub fn max_turns(&self, channel: ChannelType) -> usize {
        self.channel(channel).max_turns.unwrap_or(match channel {
            ChannelType::Discord => 50,
            _ => 75,
        })
    }

    /// Model used for summaries and pricing.
    pub fn summary_model(&self) -> &str {
        if self.model.chat.trim().is_empty() {
            &self.model.primary
        } else {
            &self.model.chat
        }
    }

    /// Chat-tuned models only accept the default temperature.
    pub fn summary_temperature(&self) -> f32 {
        if self.summary_model().contains("chat") {
            1.0
        } else {
            0.0
        }
    }

    /// Platform prompt, then Telegram's, then the built-in default.
    fn prompt_with_fallback(
        &self,
        channel: ChannelType,
        pick: impl Fn(&ChannelConfig) -> &str,
        default: &str,
    ) -> String {
        [pick(self.channel(channel)), pick(&self.telegram)]
            .into_iter()
            .find(|p| !p.trim().is_empty())
            .unwrap_or(default)
            .to_string()
    }

    pub fn session_settings(&self, channel: ChannelType) -> SessionSettings {
        let section = self.channel(channel);
        let system_prompt = if section.system_prompt.trim().is_empty() {
            self.system_prompt.clone()
        } else {
            section.system_prompt.trim().to_string()
        };

        let window = WindowConfig {
            max_messages: section.memory_max_messages,
            reset_to: section.memory_reset_to_messages,
            summary_max_chars: section.long_term_memory_max_chars,
            summary_prompt: self.prompt_with_fallback(
                channel,
                |c| c.memory_summary_prompt.as_str(),
                DEFAULT_SUMMARY_PROMPT,
            ),
        };

        let long_term = section.long_term_memory_enabled.then(|| {
            let dir = LongTermMemoryStore::resolve_dir(&self.config_dir, &section.long_term_memory_dir);
            LongTermSettings {
                store: LongTermMemoryStore::new(dir).with_summary_prompt(self.prompt_with_fallback(
                    channel,
                    |c| c.long_term_memory_summary_prompt.as_str(),
                    DEFAULT_LONG_TERM_PROMPT,
                )),
                max_chars: section.long_term_memory_max_chars,
            }
        });

        SessionSettings {
            system_prompt,
            max_turns: self.max_turns(channel),
            window,
            reset_minutes: section.memory_reset_minutes,
            long_term,
        }
    }

    pub fn access_policy(&self, channel: ChannelType) -> AccessPolicy {
        AccessPolicy::from_config(&self.channel(channel).access)
    }

    pub fn tool_usage_policy(&self) -> ToolUsagePolicy {
        ToolUsagePolicy {
            min_tools: self.tools.min_tools_used,
            max_attempts: self.tools.max_tool_attempts,
            hint: Some(
                self.tools
                    .tool_usage_hint
                    .clone()
                    .filter(|h| !h.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TOOL_USAGE_HINT.to_string()),
            ),
        }
    }

    /// Log a warning for each enabled platform that is open to everyone.
    pub fn warn_open_access(&self) {
        for channel in [ChannelType::Telegram, ChannelType::Discord] {
            if !self.is_enabled(channel) {
                continue;
            }
            let access = &self.channel(channel).access;
            if access.allow_dms && access.dm_allowlist_is_empty() {
                warn!(
                    "{} accepts direct messages from everyone; set dm_allowlist_ids, \
                     dm_allowlist_usernames, or dm_allowlist_usernames_regex to restrict it",
                    channel
                );
            }
            if access.allow_groups && access.group_allowlist_is_empty() {
                warn!(
                    "{} answers in every group; set group_allowlist_ids or \
                     group_allowlist_title_regex to restrict it",
                    channel
                );
            }
        }
    }
}

fn env_pattern() -> Option<Regex> {
    Regex::new(r"\$\{([A-Z0-9_]+)\}").ok()
}

/// Expand `${NAME}` in every string of a YAML tree.
fn interpolate_env(value: &mut Value) {
    let Some(pattern) = env_pattern() else {
        return;
    };
    interpolate_with(value, &pattern);
}

fn interpolate_with(value: &mut Value, pattern: &Regex) {
    match value {
        Value::String(text) => {
            if pattern.is_match(text) {
                *text = pattern
                    .replace_all(text, |caps: &regex::Captures| {
                        std::env::var(&caps[1]).unwrap_or_default()
                    })
                    .into_owned();
            }
        }
        Value::Sequence(items) => items.iter_mut().for_each(|v| interpolate_with(v, pattern)),
        Value::Mapping(map) => map.iter_mut().for_each(|(_, v)| interpolate_with(v, pattern)),
        Value::Tagged(tagged) => interpolate_with(&mut tagged.value, pattern),
        _ => {}
    }
}
