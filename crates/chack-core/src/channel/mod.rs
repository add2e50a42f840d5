//! Universal Communication Channel Layer
//!
//! Platform-agnostic plumbing between chat platforms and the conversation
//! runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            ChannelRouter                │
//! │  - Routes replies to the right channel  │
//! │  - Splits replies to platform limits    │
//! └─────────────────────────────────────────┘
//!              │
//!              ▼
//! ┌─────────────────────────────────────────┐
//! │         trait Channel                   │
//! │  - send(message) / send_typing()        │
//! │  - start_receiving() -> Stream          │
//! └─────────────────────────────────────────┘
//!              │
//!    ┌─────────┼─────────┐
//!    ▼         ▼         ▼
//! Telegram  Discord   Console
//! ```
//!
//! Inbound messages pass through an [`AccessPolicy`] before they reach the
//! runtime; outbound replies are cut by [`chunk_markdown`].

mod access;
mod chunk;
mod router;
mod traits;
mod types;

pub use access::{AccessConfig, AccessPolicy, compile_patterns};
pub use chunk::{DEFAULT_MAX_LEN, chunk_markdown};
pub use router::ChannelRouter;
pub use traits::{Channel, InboundStream};
pub use types::{ChannelType, ConversationId, ConversationKind, InboundMessage, OutboundMessage};

#[cfg(test)]
pub use traits::mock;
