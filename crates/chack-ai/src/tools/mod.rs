//! Tools the agent loop can call.

mod registry;
mod traits;

pub use registry::ToolRegistry;
pub use traits::{Tool, ToolOutput, ToolSchema};
