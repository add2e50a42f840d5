//! Typing indicator refreshed while a turn is processed.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::channel::{ChannelRouter, ChannelType};

/// Platforms drop the indicator after ~5s.
pub const TYPING_REFRESH_INTERVAL: Duration = Duration::from_secs(4);

/// Sends the typing action until dropped.
pub struct TypingIndicator {
    handle: JoinHandle<()>,
}

impl TypingIndicator {
    pub fn start(
        router: Arc<ChannelRouter>,
        channel_type: ChannelType,
        conversation_id: String,
    ) -> Self {
        Self::start_with_interval(router, channel_type, conversation_id, TYPING_REFRESH_INTERVAL)
    }

    pub fn start_with_interval(
        router: Arc<ChannelRouter>,
        channel_type: ChannelType,
        conversation_id: String,
        every: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = router.send_typing_to(channel_type, &conversation_id).await {
                    debug!("Failed to send typing indicator: {}", e);
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
