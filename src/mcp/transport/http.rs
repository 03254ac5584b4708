use reqwest::Url;
use rmcp::transport::streamable_http_client::{
    StreamableHttpClientTransportConfig, StreamableHttpError,
};
use rmcp::transport::DynamicTransportError;
use tracing::debug;

use super::DuplexChannel;
use crate::config::NetworkTransport;
use crate::error::BridgeError;

/// Prepare a streamable HTTP channel for `network.base_url`.
///
/// No request is sent here; an unreachable endpoint surfaces during the
/// handshake and is told apart by [`is_unreachable`]. The API key, when
/// present, is sent as a bearer token.
pub fn open_network(server: &str, network: &NetworkTransport) -> Result<DuplexChannel, BridgeError> {
    let url = Url::parse(&network.base_url).map_err(|error| BridgeError::Connection {
        server: server.to_string(),
        message: format!("invalid base_url '{}': {error}", network.base_url),
        source: Some(Box::new(error)),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BridgeError::connection(
            server,
            format!("unsupported URL scheme '{}'", url.scheme()),
        ));
    }

    let mut config = StreamableHttpClientTransportConfig::with_uri(network.base_url.clone());
    if let Some(api_key) = &network.api_key {
        config = config.auth_header(api_key.clone());
    }
    debug!(
        server,
        url = %url,
        authenticated = network.api_key.is_some(),
        "prepared streamable HTTP channel"
    );
    Ok(DuplexChannel::StreamableHttp(config))
}

/// True when a handshake transport failure never reached an HTTP server:
/// DNS, refused or reset connections, TLS setup, or connect timeouts.
pub(crate) fn is_unreachable(error: &DynamicTransportError) -> bool {
    match error
        .error
        .downcast_ref::<StreamableHttpError<reqwest::Error>>()
    {
        Some(StreamableHttpError::Client(error)) => error.is_connect() || error.is_timeout(),
        _ => false,
    }
}
