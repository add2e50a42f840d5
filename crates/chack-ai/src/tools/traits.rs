//! What a tool is, and what it hands back to the agent loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;

/// Function description advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

/// Outcome of one tool call.
///
/// `Failed` is a result the model should see and react to. Errors returned
/// from [`Tool::call`] are reported the same way by the agent loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
    Failed(String),
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Content of the tool message sent back to the model.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) | Self::Json(Value::String(text)) => text.clone(),
            Self::Json(value) => value.to_string(),
            Self::Failed(reason) => format!("Error: {reason}"),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Arguments schema; an object without declared properties by default.
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, arguments: Value) -> Result<ToolOutput>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    #[async_trait]
    impl Tool for Clock {
        fn name(&self) -> &str {
            "clock"
        }

        fn description(&self) -> &str {
            "Current time"
        }

        async fn call(&self, _arguments: Value) -> Result<ToolOutput> {
            Ok(ToolOutput::text("12:00"))
        }
    }

    #[test]
    fn test_render() {
        assert_eq!(ToolOutput::text("plain").render(), "plain");
        assert_eq!(ToolOutput::json(json!("quoted")).render(), "quoted");
        assert_eq!(ToolOutput::json(json!({"n": 1})).render(), r#"{"n":1}"#);
        assert_eq!(ToolOutput::failed("no network").render(), "Error: no network");
        assert!(ToolOutput::failed("x").is_failure());
        assert!(!ToolOutput::text("x").is_failure());
    }

    #[test]
    fn test_default_schema() {
        assert_eq!(
            Clock.schema(),
            ToolSchema {
                name: "clock".to_string(),
                description: "Current time".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }
        );
    }
}
