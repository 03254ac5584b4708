//! Unified error classification and recovery.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Why a capability invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvocationFailure {
    /// The channel to the server broke (closed pipe, dropped connection).
    Transport,
    /// The server answered with a JSON-RPC error or an unexpected response.
    Protocol,
    /// The tool ran and reported an error result.
    ToolError,
    /// The call did not complete before its deadline.
    Timeout,
    /// Arguments were rejected before reaching the server.
    InvalidArguments,
    /// The owning session is closed, failed, or no longer cached.
    SessionUnavailable,
}

impl InvocationFailure {
    /// Failures after which the session channel can no longer be trusted.
    pub fn poisons_channel(self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Connection,
    Handshake,
    Protocol,
    Timeout,
    ToolExecution,
    InvalidInput,
    State,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    CheckConfiguration,
    Reconnect,
    IncreaseTimeout,
    FixArguments,
    CheckToolServer,
    RefreshCapabilities,
}
