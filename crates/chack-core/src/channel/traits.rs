//! Channel Trait Definitions
//!
//! Defines the core trait implemented by every chat platform adapter.

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::types::{ChannelType, InboundMessage, OutboundMessage};

pub type InboundStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Universal communication channel trait
///
/// Platform transport (polling, gateways, webhooks) lives behind this trait;
/// the gateway only sends fragments, typing indicators, and consumes the
/// inbound stream.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get channel type
    fn channel_type(&self) -> ChannelType;

    /// Get channel display name
    fn name(&self) -> &str {
        self.channel_type().display_name()
    }

    /// Check if channel is properly configured
    fn is_configured(&self) -> bool;

    /// Send a message to the channel
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Send a simple text message
    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<()> {
        self.send(OutboundMessage::new(conversation_id, text)).await
    }

    /// Show a "typing" indicator in the conversation. Platforms without one
    /// keep the default no-op.
    async fn send_typing(&self, conversation_id: &str) -> Result<()> {
        let _ = conversation_id;
        Ok(())
    }

    /// Start receiving messages (returns None if channel doesn't support receiving)
    ///
    /// Messages are yielded as they arrive from the channel. A stream can only
    /// be taken once.
    fn start_receiving(&self) -> Option<InboundStream>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use mock::MockChannel;

    #[tokio::test]
    async fn test_mock_channel_send() {
        let channel = MockChannel::new(ChannelType::Telegram);

        let msg = OutboundMessage::new("chat-123", "Hello");
        channel.send(msg).await.unwrap();

        let sent = channel.get_sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "Hello");
    }

    #[tokio::test]
    async fn test_mock_channel_unconfigured() {
        let channel = MockChannel::unconfigured(ChannelType::Discord);
        assert!(!channel.is_configured());
    }

    #[tokio::test]
    async fn test_channel_defaults() {
        let channel = MockChannel::new(ChannelType::Telegram);
        assert_eq!(channel.name(), "Telegram");
    }

    #[tokio::test]
    async fn test_send_text_convenience() {
        let channel = MockChannel::new(ChannelType::Telegram);

        channel.send_text("chat-456", "Quick message").await.unwrap();

        let sent = channel.get_sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].conversation_id, "chat-456");
        assert_eq!(sent[0].content, "Quick message");
    }

    #[tokio::test]
    async fn test_receiving_stream_is_taken_once() {
        use futures::StreamExt;

        let channel = MockChannel::new(ChannelType::Console);
        assert!(channel.start_receiving().is_none());

        let tx = channel.enable_receiving();
        let mut stream = channel.start_receiving().expect("stream available");
        assert!(channel.start_receiving().is_none());

        tx.send(InboundMessage::new("1", ChannelType::Console, "u", "c", "hi"))
            .unwrap();
        let received = stream.next().await.unwrap();
        assert_eq!(received.content, "hi");
    }
}
