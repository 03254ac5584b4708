//! Convenience re-exports for common use.

pub use crate::bridge::{BlockingBridge, Bridge};
pub use crate::config::{BridgeConfig, ServerConfig, SessionOptions};
pub use crate::error::{BridgeError, InvocationFailure, Result};
pub use crate::mcp::{AdaptedCapability, SessionState};
pub use crate::tools::{AgentToolParameters, ArgumentValidator, Tool, ToolArguments};
