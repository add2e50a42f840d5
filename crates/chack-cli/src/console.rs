//! Local stdin/stdout channel for trying the gateway without a chat platform.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chack_core::channel::{Channel, ChannelType, InboundMessage, InboundStream, OutboundMessage};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Every console line belongs to this chat.
pub const CONSOLE_CHAT_ID: &str = "local";

pub struct ConsoleChannel {
    user: String,
    started: AtomicBool,
    /// Cancelled when stdin reaches end of file.
    closed: CancellationToken,
}

impl ConsoleChannel {
    pub fn new(closed: CancellationToken) -> Self {
        let user = std::env::var("USER").unwrap_or_else(|_| "console".to_string());
        Self {
            user,
            started: AtomicBool::new(false),
            closed,
        }
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Console
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        println!("{} {}\n", "chack>".cyan().bold(), message.content);
        Ok(())
    }

    async fn send_typing(&self, _conversation_id: &str) -> Result<()> {
        debug!("chack is typing");
        Ok(())
    }

    fn start_receiving(&self) -> Option<InboundStream> {
        // stdin can only be read by one loop.
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let user = self.user.clone();
        let closed = self.closed.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                let message = InboundMessage::new(
                    uuid::Uuid::new_v4().to_string(),
                    ChannelType::Console,
                    user.clone(),
                    CONSOLE_CHAT_ID,
                    line,
                )
                .with_sender_name(user.clone());
                if tx.send(message).is_err() {
                    break;
                }
            }
            debug!("Console input closed");
            closed.cancel();
        });

        Some(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}
