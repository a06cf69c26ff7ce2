//! Tool trait definition.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Definition of a tool as rendered into the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A capability the reasoning loop can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in `Action:` lines).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Argument that receives a bare, non-JSON `Action Input`.
    fn primary_arg(&self) -> &str;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<String, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidInput(format!("Missing '{}' argument", key)))
}

/// Fetch an optional unsigned argument, accepting numeric strings as well.
pub(crate) fn optional_usize(args: &Value, key: &str) -> Result<Option<usize>, ToolError> {
    match &args[key] {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(|v| Some(v as usize))
            .ok_or_else(|| ToolError::InvalidInput(format!("'{}' must be a non-negative integer", key))),
        Value::String(s) => s
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ToolError::InvalidInput(format!("'{}' must be a non-negative integer", key))),
        _ => Err(ToolError::InvalidInput(format!(
            "'{}' must be a non-negative integer",
            key
        ))),
    }
}

/// Fetch a required unsigned argument.
pub(crate) fn required_usize(args: &Value, key: &str) -> Result<usize, ToolError> {
    optional_usize(args, key)?
        .ok_or_else(|| ToolError::InvalidInput(format!("Missing '{}' argument", key)))
}
