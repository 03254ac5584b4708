//! MCP transport layer.
//!
//! A [`TransportConnector`] turns a [`ServerConfig`] into an open but
//! not yet handshaken [`DuplexChannel`]. The handshake itself is run by
//! [`Session`](super::Session).

use std::fmt;

use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceExt};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use strum::Display;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{ServerConfig, ServerTransport};
use crate::error::BridgeError;

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type MCPRunningService = RunningService<RoleClient, DynClientService>;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

mod http;
mod stdio;

pub(crate) use http::is_unreachable;
pub use http::open_network;
pub use stdio::open_subprocess;

/// Which kind of byte channel backs a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelKind {
    Pipes,
    ChildProcess,
    StreamableHttp,
}

/// Bidirectional message channel to a single MCP server.
///
/// Owned exclusively by one session; consumed by the handshake.
pub enum DuplexChannel {
    /// Any async reader/writer pair speaking newline-delimited JSON-RPC.
    Pipes {
        reader: BoxedReader,
        writer: BoxedWriter,
    },
    /// A spawned subprocess; killed when the channel is dropped.
    ChildProcess(TokioChildProcess),
    /// Streamable HTTP endpoint. The client is created at handshake time.
    StreamableHttp(StreamableHttpClientTransportConfig),
}

impl DuplexChannel {
    pub fn pipes(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self::Pipes {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Pipes { .. } => ChannelKind::Pipes,
            Self::ChildProcess(_) => ChannelKind::ChildProcess,
            Self::StreamableHttp(_) => ChannelKind::StreamableHttp,
        }
    }

    /// Run the MCP initialize exchange over this channel.
    pub(crate) async fn serve(
        self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        let service = client_info.into_dyn();
        match self {
            Self::Pipes { reader, writer } => service.serve((reader, writer)).await,
            Self::ChildProcess(process) => service.serve(process).await,
            Self::StreamableHttp(config) => {
                service
                    .serve(StreamableHttpClientTransport::from_config(config))
                    .await
            }
        }
    }
}

impl fmt::Debug for DuplexChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexChannel")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Opens the channel for a configured server.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn open(&self, config: &ServerConfig) -> Result<DuplexChannel, BridgeError>;
}

/// Spawns subprocess servers and prepares streamable HTTP endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

#[async_trait]
impl TransportConnector for DefaultConnector {
    async fn open(&self, config: &ServerConfig) -> Result<DuplexChannel, BridgeError> {
        match config.transport() {
            ServerTransport::Network(network) => open_network(config.name(), network),
            ServerTransport::Subprocess(subprocess) => open_subprocess(config.name(), subprocess),
        }
    }
}
