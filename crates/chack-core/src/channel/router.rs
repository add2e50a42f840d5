//! Channel Router - Multi-channel message routing
//!
//! Holds the registered platform channels and sends replies to the one a
//! conversation belongs to.

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::chunk::chunk_markdown;
use super::traits::Channel;
use super::types::{ChannelType, OutboundMessage};

pub struct ChannelRouter {
    /// Registered channels
    channels: HashMap<ChannelType, Arc<dyn Channel>>,
    /// Per-channel fragment limit overrides
    message_limits: HashMap<ChannelType, usize>,
}

impl ChannelRouter {
    /// Create a new channel router
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
            message_limits: HashMap::new(),
        }
    }

    /// Register a channel
    ///
    /// If a channel of the same type already exists, it will be replaced.
    pub fn register<C: Channel + 'static>(&mut self, channel: C) {
        self.register_arc(Arc::new(channel));
    }

    pub fn register_arc(&mut self, channel: Arc<dyn Channel>) {
        let channel_type = channel.channel_type();
        info!("Registering channel: {:?}", channel_type);
        self.channels.insert(channel_type, channel);
    }

    /// Override the reply fragment limit for one channel
    pub fn set_message_limit(&mut self, channel_type: ChannelType, limit: usize) {
        self.message_limits.insert(channel_type, limit);
    }

    pub fn message_limit(&self, channel_type: ChannelType) -> usize {
        self.message_limits
            .get(&channel_type)
            .copied()
            .unwrap_or_else(|| channel_type.message_limit())
    }

    /// Get a channel by type
    pub fn get(&self, channel_type: ChannelType) -> Option<&Arc<dyn Channel>> {
        self.channels.get(&channel_type)
    }

    /// Check if a channel is registered and configured
    pub fn is_available(&self, channel_type: ChannelType) -> bool {
        self.channels
            .get(&channel_type)
            .map(|c| c.is_configured())
            .unwrap_or(false)
    }

    fn configured(&self, channel_type: ChannelType) -> Result<&Arc<dyn Channel>> {
        let channel = self
            .channels
            .get(&channel_type)
            .ok_or_else(|| anyhow!("Channel {:?} not registered", channel_type))?;

        if !channel.is_configured() {
            return Err(anyhow!("Channel {:?} not configured", channel_type));
        }
        Ok(channel)
    }

    /// Send message to a specific channel
    pub async fn send_to(&self, channel_type: ChannelType, message: OutboundMessage) -> Result<()> {
        let channel = self.configured(channel_type)?;
        debug!(
            "Sending message to {:?} (conversation={})",
            channel_type, message.conversation_id
        );
        channel.send(message).await
    }

    /// Split `text` to the channel's limit and send the fragments in order.
    ///
    /// Stops at the first failed fragment; earlier fragments stay delivered.
    pub async fn send_chunked(
        &self,
        channel_type: ChannelType,
        conversation_id: &str,
        text: &str,
    ) -> Result<usize> {
        let channel = self.configured(channel_type)?;
        let fragments = chunk_markdown(text, self.message_limit(channel_type));
        let count = fragments.len();
        for fragment in fragments {
            channel
                .send(OutboundMessage::new(conversation_id, fragment))
                .await?;
        }
        Ok(count)
    }

    /// Send typing indicator to a specific channel
    pub async fn send_typing_to(
        &self,
        channel_type: ChannelType,
        conversation_id: &str,
    ) -> Result<()> {
        self.configured(channel_type)?
            .send_typing(conversation_id)
            .await
    }

    /// List all configured and ready channels
    pub fn list_configured(&self) -> Vec<ChannelType> {
        let mut configured: Vec<_> = self
            .channels
            .iter()
            .filter(|(_, c)| c.is_configured())
            .map(|(t, _)| *t)
            .collect();
        configured.sort();
        configured
    }

    /// Get number of registered channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::traits::mock::MockChannel;

    fn router_with(channel: MockChannel) -> (ChannelRouter, Arc<MockChannel>) {
        let channel = Arc::new(channel);
        let mut router = ChannelRouter::new();
        router.register_arc(channel.clone());
        (router, channel)
    }

    #[tokio::test]
    async fn test_send_to_registered_channel() {
        let (router, channel) = router_with(MockChannel::new(ChannelType::Telegram));

        router
            .send_to(ChannelType::Telegram, OutboundMessage::new("chat-1", "hi"))
            .await
            .unwrap();

        assert_eq!(channel.sent_texts().await, vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn test_send_to_unregistered_channel_fails() {
        let router = ChannelRouter::new();
        let err = router
            .send_to(ChannelType::Discord, OutboundMessage::new("c", "x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }

    #[tokio::test]
    async fn test_send_to_unconfigured_channel_fails() {
        let (router, _) = router_with(MockChannel::unconfigured(ChannelType::Discord));
        assert!(!router.is_available(ChannelType::Discord));
        let err = router
            .send_typing_to(ChannelType::Discord, "c")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn test_send_chunked_respects_limit_override() {
        let (mut router, channel) = router_with(MockChannel::new(ChannelType::Console));
        router.set_message_limit(ChannelType::Console, 10);

        let sent = router
            .send_chunked(ChannelType::Console, "c", "aaaa\nbbbb\ncccc")
            .await
            .unwrap();

        assert_eq!(sent, 2);
        assert_eq!(
            channel.sent_texts().await,
            vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]
        );
    }

    #[tokio::test]
    async fn test_send_typing_to() {
        let (router, channel) = router_with(MockChannel::new(ChannelType::Telegram));
        router
            .send_typing_to(ChannelType::Telegram, "chat-9")
            .await
            .unwrap();
        assert_eq!(channel.typing_calls().await, vec!["chat-9".to_string()]);
    }

    #[test]
    fn test_list_configured() {
        let mut router = ChannelRouter::new();
        router.register(MockChannel::new(ChannelType::Telegram));
        router.register(MockChannel::unconfigured(ChannelType::Discord));

        assert_eq!(router.channel_count(), 2);
        assert_eq!(router.list_configured(), vec![ChannelType::Telegram]);
        assert_eq!(router.message_limit(ChannelType::Discord), 1900);
    }
}
