//! Universal Channel Types
//!
//! Core types shared by every chat platform the gateway talks to.

use serde::{Deserialize, Serialize};

/// Channel type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Telegram,
    Discord,
    Console,
}

impl ChannelType {
    /// Display name for logs and the CLI
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Telegram => "Telegram",
            Self::Discord => "Discord",
            Self::Console => "Console",
        }
    }

    /// Stable lowercase key used in config sections and storage paths
    pub fn key(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Discord => "discord",
            Self::Console => "console",
        }
    }

    /// Largest reply fragment the platform accepts, in characters
    pub fn message_limit(&self) -> usize {
        match self {
            Self::Telegram => 3500,
            Self::Discord => 1900,
            Self::Console => 4000,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "discord" => Ok(Self::Discord),
            "console" => Ok(Self::Console),
            other => Err(format!("unknown channel type: {other}")),
        }
    }
}

/// Whether a conversation is one-to-one or shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    #[default]
    Direct,
    Group,
}

/// Key for all per-conversation state: platform plus chat id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId {
    pub channel: ChannelType,
    pub chat_id: String,
}

impl ConversationId {
    pub fn new(channel: ChannelType, chat_id: impl Into<String>) -> Self {
        Self {
            channel,
            chat_id: chat_id.into(),
        }
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel.key(), self.chat_id)
    }
}

/// Inbound message from a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message ID
    pub id: String,
    /// Channel this message came from
    pub channel_type: ChannelType,
    /// Direct message or group conversation
    pub kind: ConversationKind,
    /// Sender identifier (user ID in the channel)
    pub sender_id: String,
    /// Sender username (if available)
    pub sender_name: Option<String>,
    /// Conversation identifier (chat_id, channel_id, etc.)
    pub conversation_id: String,
    /// Group title (if available)
    pub chat_title: Option<String>,
    /// Message content
    pub content: String,
    /// Timestamp (milliseconds since epoch)
    pub timestamp: i64,
    /// Channel-specific metadata
    pub metadata: Option<serde_json::Value>,
}

impl InboundMessage {
    /// Create a new direct inbound message
    pub fn new(
        id: impl Into<String>,
        channel_type: ChannelType,
        sender_id: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_type,
            kind: ConversationKind::Direct,
            sender_id: sender_id.into(),
            sender_name: None,
            conversation_id: conversation_id.into(),
            chat_title: None,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            metadata: None,
        }
    }

    /// Mark the message as coming from a group chat
    pub fn in_group(mut self, title: Option<String>) -> Self {
        self.kind = ConversationKind::Group;
        self.chat_title = title;
        self
    }

    /// Set sender name
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn conversation(&self) -> ConversationId {
        ConversationId::new(self.channel_type, self.conversation_id.clone())
    }
}

/// Outbound message to a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Conversation identifier
    pub conversation_id: String,
    /// Message content (plain text or markdown)
    pub content: String,
    /// Reply to specific message
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Create a new outbound message
    pub fn new(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: content.into(),
            reply_to: None,
        }
    }

    /// Set reply_to
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_type_display_name() {
        assert_eq!(ChannelType::Telegram.display_name(), "Telegram");
        assert_eq!(ChannelType::Discord.to_string(), "Discord");
    }

    #[test]
    fn test_channel_type_limits() {
        assert_eq!(ChannelType::Telegram.message_limit(), 3500);
        assert_eq!(ChannelType::Discord.message_limit(), 1900);
    }

    #[test]
    fn test_channel_type_from_str() {
        assert_eq!("Telegram".parse::<ChannelType>(), Ok(ChannelType::Telegram));
        assert_eq!(" discord ".parse::<ChannelType>(), Ok(ChannelType::Discord));
        assert!("slack".parse::<ChannelType>().is_err());
    }

    #[test]
    fn test_inbound_message_builder() {
        let msg = InboundMessage::new(
            "msg-1",
            ChannelType::Telegram,
            "user-123",
            "chat-456",
            "Hello world",
        )
        .with_sender_name("john")
        .in_group(Some("Ops".to_string()));

        assert_eq!(msg.id, "msg-1");
        assert_eq!(msg.kind, ConversationKind::Group);
        assert_eq!(msg.sender_name.as_deref(), Some("john"));
        assert_eq!(msg.chat_title.as_deref(), Some("Ops"));
        assert_eq!(
            msg.conversation(),
            ConversationId::new(ChannelType::Telegram, "chat-456")
        );
    }

    #[test]
    fn test_conversation_id_display() {
        let id = ConversationId::new(ChannelType::Discord, "42");
        assert_eq!(id.to_string(), "discord:42");
    }
}
