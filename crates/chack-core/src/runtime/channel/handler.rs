//! Channel Message Handler
//!
//! Listens on every configured channel and hands each inbound message to the
//! orchestrator in its own task, so a slow agent call never blocks delivery
//! for other conversations.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::ChannelRouter;

use super::orchestrator::ConversationOrchestrator;

#[cfg(test)]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_millis(20);
#[cfg(not(test))]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Start one receive loop per configured channel.
///
/// Loops restart the channel stream when it ends and stop when `shutdown` is
/// cancelled. A stopping loop waits for the turns it already started.
pub fn start_message_handler(
    router: Arc<ChannelRouter>,
    orchestrator: Arc<ConversationOrchestrator>,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let channels = router.list_configured();
    if channels.is_empty() {
        info!("No channels configured, message handler idle");
        return Vec::new();
    }

    let mut handles = Vec::with_capacity(channels.len());
    for channel_type in channels {
        let Some(channel) = router.get(channel_type).cloned() else {
            continue;
        };
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.clone();

        handles.push(tokio::spawn(async move {
            info!("Listening for messages on {:?}", channel_type);
            let mut in_flight = JoinSet::new();

            'receive: loop {
                let Some(mut stream) = channel.start_receiving() else {
                    warn!(
                        "Failed to start message stream for {:?}, retrying in {:?}",
                        channel_type, STREAM_RECONNECT_DELAY
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break 'receive,
                        _ = sleep(STREAM_RECONNECT_DELAY) => continue 'receive,
                    }
                };

                loop {
                    let message = tokio::select! {
                        _ = shutdown.cancelled() => break 'receive,
                        Some(_) = in_flight.join_next(), if !in_flight.is_empty() => continue,
                        next = stream.next() => match next {
                            Some(message) => message,
                            None => {
                                warn!(
                                    "Message stream ended for {:?}, restarting in {:?}",
                                    channel_type, STREAM_RECONNECT_DELAY
                                );
                                break;
                            }
                        },
                    };

                    debug!(
                        "Handler received message {} from {}",
                        message.id, message.conversation_id
                    );

                    let orchestrator = orchestrator.clone();
                    in_flight.spawn(async move {
                        match orchestrator.handle(&message).await {
                            Ok(outcome) => {
                                debug!("Message {} handled: {:?}", message.id, outcome);
                            }
                            Err(e) => {
                                error!(
                                    "Error handling message {} from {}: {}",
                                    message.id, message.conversation_id, e
                                );
                            }
                        }
                    });
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break 'receive,
                    _ = sleep(STREAM_RECONNECT_DELAY) => {}
                }
            }

            info!(
                "Stopping message handler for {:?}, waiting on {} turn(s)",
                channel_type,
                in_flight.len()
            );
            while in_flight.join_next().await.is_some() {}
        }));
    }
    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockChannel;
    use crate::channel::{ChannelType, InboundMessage};
    use crate::runtime::channel::retry::{RetryController, ToolUsagePolicy};
    use crate::session::SessionRegistry;
    use crate::test_support::{ScriptedFactory, ScriptedSummarizer};
    use tokio::time::timeout;

    fn create_message(id: &str, chat: &str, content: &str) -> InboundMessage {
        InboundMessage::new(id, ChannelType::Telegram, "user-1", chat, content)
    }

    fn setup() -> (Arc<ChannelRouter>, Arc<MockChannel>, Arc<ConversationOrchestrator>) {
        let channel = Arc::new(MockChannel::new(ChannelType::Telegram));
        let mut router = ChannelRouter::new();
        router.register_arc(channel.clone());
        let router = Arc::new(router);

        let registry = Arc::new(SessionRegistry::new(Arc::new(ScriptedFactory::default())));
        let orchestrator = Arc::new(
            ConversationOrchestrator::new(
                registry,
                router.clone(),
                Arc::new(ScriptedSummarizer::replying("summary")),
            )
            .with_retry(RetryController::new(ToolUsagePolicy::disabled())),
        );
        (router, channel, orchestrator)
    }

    async fn wait_for_sent(channel: &MockChannel, count: usize) -> Vec<String> {
        timeout(Duration::from_secs(2), async {
            loop {
                let sent = channel.sent_texts().await;
                if sent.len() >= count {
                    return sent;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for replies")
    }

    #[tokio::test]
    async fn test_messages_are_dispatched() {
        let (router, channel, orchestrator) = setup();
        let tx = channel.enable_receiving();
        let shutdown = CancellationToken::new();

        let handles = start_message_handler(router, orchestrator, shutdown.clone());
        assert_eq!(handles.len(), 1);

        tx.send(create_message("1", "chat-a", "hello")).unwrap();
        tx.send(create_message("2", "chat-b", "hi")).unwrap();

        let sent = wait_for_sent(&channel, 2).await;
        assert!(sent.iter().any(|s| s.starts_with("echo: hello")));
        assert!(sent.iter().any(|s| s.starts_with("echo: hi")));

        shutdown.cancel();
        for handle in handles {
            timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_stops_on_cancel_without_stream() {
        let (router, _channel, orchestrator) = setup();
        let shutdown = CancellationToken::new();

        let handles = start_message_handler(router, orchestrator, shutdown.clone());
        sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        for handle in handles {
            timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_no_channels_means_no_loops() {
        let router = Arc::new(ChannelRouter::new());
        let registry = Arc::new(SessionRegistry::new(Arc::new(ScriptedFactory::default())));
        let orchestrator = Arc::new(ConversationOrchestrator::new(
            registry,
            router.clone(),
            Arc::new(ScriptedSummarizer::replying("s")),
        ));

        assert!(start_message_handler(router, orchestrator, CancellationToken::new()).is_empty());
    }
}
