//! Capability descriptors as advertised by a tool server.

use serde::{Deserialize, Serialize};

/// One capability from a server's `tools/list` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema for the arguments, passed through untouched.
    pub input_schema: serde_json::Value,
}

impl From<rmcp::model::Tool> for CapabilityDescriptor {
    fn from(tool: rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()),
            input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
        }
    }
}
