//! Bridge configuration: which tool servers exist and how to reach them.
//!
//! Everything here is supplied by the embedding application. Nothing in this
//! module reads environment variables or files.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Network transport settings (MCP streamable HTTP).
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkTransport {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl fmt::Debug for NetworkTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Subprocess transport settings (JSON-RPC over the child's stdio).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessTransport {
    pub command: String,
    pub args: Vec<String>,
    /// Overlay merged over the inherited environment.
    pub env: BTreeMap<String, String>,
}

/// How a server is reached. Exactly one variant per server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTransport {
    Network(NetworkTransport),
    Subprocess(SubprocessTransport),
}

/// Loose, field-per-option description of a server.
///
/// This is the shape callers and config files naturally produce; it is only
/// turned into a [`ServerConfig`] after validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// One reachable tool server. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ServerDefinition", into = "ServerDefinition")]
pub struct ServerConfig {
    name: String,
    transport: ServerTransport,
}

impl ServerConfig {
    /// Validate a definition: a non-empty name and exactly one of
    /// `base_url` / `command`.
    pub fn from_definition(definition: ServerDefinition) -> Result<Self> {
        let ServerDefinition {
            name,
            base_url,
            api_key,
            command,
            args,
            env,
        } = definition;

        let name = name.trim().to_owned();
        if name.is_empty() {
            return Err(BridgeError::configuration(
                name,
                "server name must not be empty",
            ));
        }

        let transport = match (base_url, command) {
            (Some(_), Some(_)) => {
                return Err(BridgeError::configuration(
                    name,
                    "cannot have both base_url and command specified",
                ));
            }
            (None, None) => {
                return Err(BridgeError::configuration(
                    name,
                    "must have either base_url or command specified",
                ));
            }
            (Some(base_url), None) => {
                if base_url.trim().is_empty() {
                    return Err(BridgeError::configuration(name, "base_url must not be empty"));
                }
                ServerTransport::Network(NetworkTransport { base_url, api_key })
            }
            (None, Some(command)) => {
                if command.trim().is_empty() {
                    return Err(BridgeError::configuration(name, "command must not be empty"));
                }
                ServerTransport::Subprocess(SubprocessTransport { command, args, env })
            }
        };

        Ok(Self { name, transport })
    }

    /// A server reached over MCP streamable HTTP.
    pub fn network(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        Self::from_definition(ServerDefinition {
            name: name.into(),
            base_url: Some(base_url.into()),
            api_key,
            ..Default::default()
        })
    }

    /// A server launched as a subprocess speaking MCP over stdio.
    pub fn subprocess<I, S>(name: impl Into<String>, command: impl Into<String>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_definition(ServerDefinition {
            name: name.into(),
            command: Some(command.into()),
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        })
    }

    /// Same as [`ServerConfig::subprocess`] with an environment overlay.
    pub fn subprocess_with_env<I, S, E, K, V>(
        name: impl Into<String>,
        command: impl Into<String>,
        args: I,
        env: E,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        E: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_definition(ServerDefinition {
            name: name.into(),
            command: Some(command.into()),
            args: args.into_iter().map(Into::into).collect(),
            env: env
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            ..Default::default()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &ServerTransport {
        &self.transport
    }
}

impl TryFrom<ServerDefinition> for ServerConfig {
    type Error = BridgeError;

    fn try_from(definition: ServerDefinition) -> Result<Self> {
        Self::from_definition(definition)
    }
}

impl From<ServerConfig> for ServerDefinition {
    fn from(config: ServerConfig) -> Self {
        match config.transport {
            ServerTransport::Network(network) => Self {
                name: config.name,
                base_url: Some(network.base_url),
                api_key: network.api_key,
                ..Default::default()
            },
            ServerTransport::Subprocess(subprocess) => Self {
                name: config.name,
                command: Some(subprocess.command),
                args: subprocess.args,
                env: subprocess.env,
                ..Default::default()
            },
        }
    }
}

/// Deadlines applied to session I/O. `None` waits indefinitely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Builder)]
pub struct SessionOptions {
    /// Upper bound on the protocol handshake.
    pub init_timeout: Option<Duration>,
    /// Default upper bound on a single capability invocation.
    pub call_timeout: Option<Duration>,
}

/// The full set of servers a bridge may talk to, in configuration order.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    servers: Vec<ServerConfig>,
    default_server: String,
    options: SessionOptions,
}

impl BridgeConfig {
    /// Build a configuration; the first server becomes the default.
    pub fn new(servers: Vec<ServerConfig>) -> Result<Self> {
        let Some(first) = servers.first() else {
            return Err(BridgeError::InvalidArgument(
                "at least one MCP server must be configured".into(),
            ));
        };
        let default_server = first.name().to_owned();

        let mut seen = HashSet::with_capacity(servers.len());
        for server in &servers {
            if !seen.insert(server.name()) {
                return Err(BridgeError::configuration(
                    server.name(),
                    "duplicate server name",
                ));
            }
        }

        Ok(Self {
            servers,
            default_server,
            options: SessionOptions::default(),
        })
    }

    /// Choose which server `list_capabilities(None)` resolves to.
    pub fn with_default_server(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if self.server(&name).is_none() {
            return Err(BridgeError::configuration(
                name,
                "default server is not among the configured servers",
            ));
        }
        self.default_server = name;
        Ok(self)
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn servers(&self) -> &[ServerConfig] {
        &self.servers
    }

    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|server| server.name() == name)
    }

    pub fn default_server(&self) -> &str {
        &self.default_server
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }
}
