//! chack core - conversation gateway runtime
//!
//! Sessions, memory and chat-platform plumbing that sit between inbound chat
//! messages and the agent executors provided by `chack-ai`.

pub mod channel;
pub mod config;
pub mod error;
pub mod memory;
pub mod pricing;
pub mod runtime;
pub mod session;

#[cfg(test)]
mod test_support;

pub use channel::{
    AccessPolicy, Channel, ChannelRouter, ChannelType, ConversationId, InboundMessage,
    OutboundMessage,
};
pub use config::ChackConfig;
pub use error::ChatError;
pub use memory::{LongTermMemoryStore, ShortTermMemoryWindow};
pub use pricing::PricingTable;
pub use runtime::channel::{ConversationOrchestrator, RetryController, TurnOutcome};
pub use session::{SessionRegistry, SessionSettings};
