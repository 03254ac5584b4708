//! A live, initialized conversation with one tool server.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientInfo, Content, JsonObject, ProtocolVersion,
    ResourceContents,
};
use rmcp::service::{ClientInitializeError, Peer, RoleClient, ServiceError};
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use super::schema::CapabilityDescriptor;
use super::transport::{is_unreachable, ChannelKind, DuplexChannel, MCPRunningService};
use crate::config::SessionOptions;
use crate::error::{BridgeError, InvocationFailure, Result};
use crate::util::timeout::with_deadline;

/// Lifecycle of a [`Session`].
///
/// `Created -> Initializing -> Ready -> Closed`. `Failed` is reachable from
/// `Initializing` (handshake error) and from `Ready` (broken channel).
/// `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Created,
    Initializing,
    Ready,
    Closed,
    Failed,
}

/// Point-in-time view of a session for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub server: String,
    pub state: SessionState,
    pub channel: ChannelKind,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

/// Successful output of a capability call.
#[derive(Debug, Clone)]
pub struct ToolCallOutput {
    pub structured_content: Option<serde_json::Value>,
    pub text_content: Option<String>,
    pub content: Vec<serde_json::Value>,
}

impl ToolCallOutput {
    /// Structured content if present, else joined text, else raw content items.
    pub fn into_value_or_text(self) -> serde_json::Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }
        if let Some(text) = self.text_content {
            return serde_json::Value::String(text);
        }
        serde_json::Value::Array(self.content)
    }
}

struct SessionInner {
    state: SessionState,
    channel: Option<DuplexChannel>,
    service: Option<MCPRunningService>,
    connected_at: Option<DateTime<Utc>>,
}

/// One MCP session bound to one server and one channel.
///
/// Shared behind an `Arc`; every method takes `&self`. Concurrent
/// invocations are multiplexed over the channel by JSON-RPC id.
pub struct Session {
    server_name: String,
    channel_kind: ChannelKind,
    options: SessionOptions,
    created_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
}

impl Session {
    /// Wrap an open channel. No I/O happens until [`Session::initialize`].
    pub fn new(server_name: impl Into<String>, channel: DuplexChannel, options: SessionOptions) -> Self {
        Self {
            server_name: server_name.into(),
            channel_kind: channel.kind(),
            options,
            created_at: Utc::now(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Created,
                channel: Some(channel),
                service: None,
                connected_at: None,
            }),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Ready and the underlying channel has not been torn down.
    pub fn is_alive(&self) -> bool {
        let inner = self.lock();
        inner.state == SessionState::Ready
            && inner.service.as_ref().is_some_and(|service| !service.is_closed())
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.lock();
        SessionStatus {
            server: self.server_name.clone(),
            state: inner.state,
            channel: self.channel_kind,
            created_at: self.created_at,
            connected_at: inner.connected_at,
        }
    }

    /// Perform the MCP handshake. Valid only from `Created`.
    pub async fn initialize(&self) -> Result<()> {
        let channel = {
            let mut inner = self.lock();
            if inner.state != SessionState::Created {
                return Err(BridgeError::InvalidState(format!(
                    "session for '{}' cannot initialize from state {}",
                    self.server_name, inner.state
                )));
            }
            let Some(channel) = inner.channel.take() else {
                inner.state = SessionState::Failed;
                return Err(BridgeError::InvalidState(format!(
                    "session for '{}' has no channel",
                    self.server_name
                )));
            };
            inner.state = SessionState::Initializing;
            channel
        };

        debug!(server = %self.server_name, channel = %self.channel_kind, "starting MCP handshake");
        let client_info = ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };
        let outcome = match with_deadline(self.options.init_timeout, channel.serve(client_info)).await {
            Ok(Ok(service)) => Ok(service),
            Ok(Err(error)) => Err(map_client_initialize_error(&self.server_name, error)),
            Err(deadline) => Err(BridgeError::Initialization {
                server: self.server_name.clone(),
                message: format!("handshake did not complete within {}ms", deadline.as_millis()),
            }),
        };

        let closed_during_handshake = {
            let mut inner = self.lock();
            match outcome {
                Ok(service) if inner.state == SessionState::Closed => Some(service),
                Ok(service) => {
                    inner.service = Some(service);
                    inner.state = SessionState::Ready;
                    inner.connected_at = Some(Utc::now());
                    None
                }
                Err(error) => {
                    if inner.state != SessionState::Closed {
                        inner.state = SessionState::Failed;
                    }
                    warn!(server = %self.server_name, error = %error, "MCP handshake failed");
                    return Err(error);
                }
            }
        };

        if let Some(service) = closed_during_handshake {
            cancel_service(&self.server_name, service).await;
            return Err(BridgeError::InvalidState(format!(
                "session for '{}' was closed during initialization",
                self.server_name
            )));
        }

        info!(server = %self.server_name, channel = %self.channel_kind, "MCP session ready");
        Ok(())
    }

    /// Ask the server for its capabilities. Requires `Ready`.
    pub async fn list_capabilities(&self) -> Result<Vec<CapabilityDescriptor>> {
        let peer = self.ready_peer()?;
        let tools = match peer.list_all_tools().await {
            Ok(tools) => Ok(tools),
            Err(ServiceError::UnexpectedResponse) => {
                peer.list_tools(None).await.map(|page| page.tools)
            }
            Err(error) => Err(error),
        };

        match tools {
            Ok(tools) => {
                debug!(server = %self.server_name, count = tools.len(), "listed MCP capabilities");
                Ok(tools.into_iter().map(CapabilityDescriptor::from).collect())
            }
            Err(error) => {
                let (failure, message) = classify_service_error(&error);
                if failure.poisons_channel() {
                    self.mark_failed(&message);
                }
                Err(BridgeError::Discovery {
                    server: self.server_name.clone(),
                    failure,
                    message,
                    source: Some(Box::new(error)),
                })
            }
        }
    }

    /// Invoke a capability with the session's default call deadline.
    pub async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<ToolCallOutput> {
        self.invoke_with_timeout(name, arguments, self.options.call_timeout)
            .await
    }

    /// Invoke a capability with an explicit deadline (`None` waits indefinitely).
    ///
    /// A timeout leaves the session `Ready`; a broken channel moves it to
    /// `Failed`.
    pub async fn invoke_with_timeout(
        &self,
        name: &str,
        arguments: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<ToolCallOutput> {
        let peer = self.ready_peer()?;
        let arguments = coerce_tool_arguments(arguments)
            .map_err(|message| BridgeError::invocation(name, InvocationFailure::InvalidArguments, message))?;

        let request = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments,
            task: None,
        };

        match with_deadline(timeout, peer.call_tool(request)).await {
            Ok(Ok(result)) => map_call_result(&self.server_name, name, result),
            Ok(Err(error)) => {
                let (failure, message) = classify_service_error(&error);
                if failure.poisons_channel() {
                    self.mark_failed(&message);
                }
                Err(BridgeError::Invocation {
                    capability: name.to_string(),
                    failure,
                    message,
                    source: Some(Box::new(error)),
                })
            }
            Err(deadline) => {
                debug!(
                    server = %self.server_name,
                    capability = name,
                    timeout_ms = deadline.as_millis() as u64,
                    "MCP call timed out"
                );
                Err(BridgeError::invocation(
                    name,
                    InvocationFailure::Timeout,
                    format!("no response within {}ms", deadline.as_millis()),
                ))
            }
        }
    }

    /// Release the channel. Valid from any state; repeated calls are no-ops.
    pub async fn close(&self) {
        let service = {
            let mut inner = self.lock();
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Closed;
            inner.channel = None;
            inner.service.take()
        };

        if let Some(service) = service {
            cancel_service(&self.server_name, service).await;
        }
        info!(server = %self.server_name, "MCP session closed");
    }

    fn ready_peer(&self) -> Result<Peer<RoleClient>> {
        let inner = self.lock();
        match (&inner.service, inner.state) {
            (Some(service), SessionState::Ready) => Ok(service.peer().clone()),
            (_, state) => Err(BridgeError::InvalidState(format!(
                "session for '{}' is {state}, not ready",
                self.server_name
            ))),
        }
    }

    fn mark_failed(&self, reason: &str) {
        let mut inner = self.lock();
        if inner.state == SessionState::Ready {
            inner.state = SessionState::Failed;
            warn!(server = %self.server_name, reason, "MCP session channel failed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server_name", &self.server_name)
            .field("channel", &self.channel_kind)
            .field("state", &self.state())
            .finish()
    }
}

async fn cancel_service(server: &str, service: MCPRunningService) {
    if let Err(error) = service.cancel().await {
        warn!(server, error = %error, "MCP service task did not shut down cleanly");
    }
}

/// Accepts an object, `null`, or a JSON string encoding either.
pub(crate) fn coerce_tool_arguments(
    value: serde_json::Value,
) -> std::result::Result<Option<JsonObject>, String> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed)
                .map_err(|e| format!("tool arguments must be valid JSON: {e}"))?;
            coerce_tool_arguments(parsed)
        }
        other => Err(format!("tool arguments must be a JSON object; got {other}")),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn map_call_result(server: &str, name: &str, result: CallToolResult) -> Result<ToolCallOutput> {
    let text_content = extract_text_content(&result.content);
    let content = result
        .content
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect::<Vec<_>>();

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| text_content.clone())
            .unwrap_or_else(|| format!("server '{server}' returned an error result"));
        return Err(BridgeError::invocation(name, InvocationFailure::ToolError, message));
    }

    Ok(ToolCallOutput {
        structured_content: result.structured_content,
        text_content,
        content,
    })
}

fn map_client_initialize_error(server: &str, error: ClientInitializeError) -> BridgeError {
    let message = match error {
        ClientInitializeError::TransportError { error, context } if is_unreachable(&error) => {
            return BridgeError::Connection {
                server: server.to_string(),
                message: format!("server unreachable during initialize ({context}): {error}"),
                source: Some(Box::new(error)),
            };
        }
        ClientInitializeError::ConnectionClosed(context) => {
            format!("connection closed during initialize: {context}")
        }
        ClientInitializeError::TransportError { error, context } => {
            format!("transport error during initialize ({context}): {error}")
        }
        ClientInitializeError::JsonRpcError(error) => format!(
            "initialize rejected with JSON-RPC error {}: {}",
            error.code.0, error.message
        ),
        ClientInitializeError::Cancelled => "initialize cancelled".to_string(),
        other => format!("initialize failed: {other}"),
    };
    BridgeError::Initialization {
        server: server.to_string(),
        message,
    }
}

fn classify_service_error(error: &ServiceError) -> (InvocationFailure, String) {
    match error {
        ServiceError::McpError(error) => (
            InvocationFailure::Protocol,
            format!("MCP error {}: {}", error.code.0, error.message),
        ),
        ServiceError::TransportSend(error) => (
            InvocationFailure::Transport,
            format!("transport send failed: {error}"),
        ),
        ServiceError::TransportClosed => {
            (InvocationFailure::Transport, "transport closed".to_string())
        }
        ServiceError::UnexpectedResponse => {
            (InvocationFailure::Protocol, "unexpected MCP response".to_string())
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            (InvocationFailure::Transport, format!("request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => (
            InvocationFailure::Timeout,
            format!("no response within {}ms", timeout.as_millis()),
        ),
        other => (InvocationFailure::Protocol, format!("MCP service error: {other}")),
    }
}
