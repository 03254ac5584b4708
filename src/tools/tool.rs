//! The tool trait the orchestration runtime invokes.

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::AgentToolParameters;
use crate::error::BridgeError;

/// A named, schema-described callable the runtime can register.
///
/// The bridge produces implementations of this trait; it never consumes any
/// other runtime type.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &AgentToolParameters;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value, BridgeError>;
}
