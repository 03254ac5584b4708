//! Error types for the bridge.

pub mod unified;

pub use unified::{ErrorCategory, InvocationFailure, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error for server '{server}': {message}")]
    Configuration { server: String, message: String },

    #[error("Connection error for server '{server}': {message}")]
    Connection {
        server: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Initialization error for server '{server}': {message}")]
    Initialization { server: String, message: String },

    #[error("Unknown server: {0}")]
    UnknownServer(String),

    #[error("Could not create session for server '{server}': {source}")]
    SessionCreation {
        server: String,
        #[source]
        source: Box<BridgeError>,
    },

    #[error("Invocation of '{capability}' failed ({failure}): {message}")]
    Invocation {
        capability: String,
        failure: InvocationFailure,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Capability discovery on server '{server}' failed ({failure}): {message}")]
    Discovery {
        server: String,
        failure: InvocationFailure,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error for the named server.
    pub fn configuration(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a connection error without an underlying source.
    pub fn connection(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            server: server.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an invocation error of the given kind.
    pub fn invocation(
        capability: impl Into<String>,
        failure: InvocationFailure,
        message: impl Into<String>,
    ) -> Self {
        Self::Invocation {
            capability: capability.into(),
            failure,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a construction failure with the server it was raised for.
    pub fn session_creation(server: impl Into<String>, source: BridgeError) -> Self {
        Self::SessionCreation {
            server: server.into(),
            source: Box::new(source),
        }
    }

    /// Capability name for invocation errors.
    pub fn capability(&self) -> Option<&str> {
        match self {
            Self::Invocation { capability, .. } => Some(capability),
            _ => None,
        }
    }

    /// Invocation failure kind, if this is an invocation error.
    pub fn invocation_failure(&self) -> Option<InvocationFailure> {
        match self {
            Self::Invocation { failure, .. } => Some(*failure),
            _ => None,
        }
    }

    /// Whether the call failed because its deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        self.invocation_failure() == Some(InvocationFailure::Timeout)
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } | Self::UnknownServer(_) => ErrorCategory::Configuration,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Initialization { .. } => ErrorCategory::Handshake,
            Self::SessionCreation { source, .. } => source.category(),
            Self::Invocation { failure, .. } | Self::Discovery { failure, .. } => match failure {
                InvocationFailure::Transport | InvocationFailure::SessionUnavailable => {
                    ErrorCategory::Connection
                }
                InvocationFailure::Timeout => ErrorCategory::Timeout,
                InvocationFailure::Protocol => ErrorCategory::Protocol,
                InvocationFailure::ToolError => ErrorCategory::ToolExecution,
                InvocationFailure::InvalidArguments => ErrorCategory::InvalidInput,
            },
            Self::InvalidArgument(_) => ErrorCategory::InvalidInput,
            Self::InvalidState(_) | Self::Io(_) => ErrorCategory::State,
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    ///
    /// The bridge never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connection | ErrorCategory::Timeout
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Connection => RecoverySuggestion::Reconnect,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::InvalidInput => RecoverySuggestion::FixArguments,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolServer,
            ErrorCategory::Handshake | ErrorCategory::Protocol => {
                RecoverySuggestion::CheckToolServer
            }
            ErrorCategory::State => RecoverySuggestion::RefreshCapabilities,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BridgeError>;
