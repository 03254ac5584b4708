//! In-memory MCP servers for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use super::transport::{DuplexChannel, TransportConnector};
use crate::config::ServerConfig;
use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeBehavior {
    Normal,
    RejectInitialize,
    StallInitialize,
    DropOnCall,
    StallOnCall,
    RpcErrorOnCall,
    ToolErrorOnCall,
    FailListing,
}

/// Scripted server speaking newline-delimited JSON-RPC.
///
/// `echo` answers with the `text` argument. Any other tool answers with
/// structured content naming the server, tool and arguments.
#[derive(Debug, Clone)]
pub(crate) struct FakeServer {
    name: String,
    tools: Vec<Value>,
    behavior: FakeBehavior,
}

impl FakeServer {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
            behavior: FakeBehavior::Normal,
        }
    }

    pub(crate) fn with_tool(mut self, name: &str, schema: Value) -> Self {
        self.tools.push(json!({
            "name": name,
            "description": format!("{name} from {}", self.name),
            "inputSchema": schema,
        }));
        self
    }

    pub(crate) fn with_echo_tool(self) -> Self {
        self.with_tool(
            "echo",
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        )
    }

    pub(crate) fn with_behavior(mut self, behavior: FakeBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn respond(&self, method: &str, params: &Value) -> Option<Value> {
        let reply = match (method, self.behavior) {
            ("initialize", FakeBehavior::RejectInitialize) => {
                return Some(json!({"error": {"code": -32600, "message": "unsupported client"}}))
            }
            ("initialize", FakeBehavior::StallInitialize) => return None,
            ("initialize", _) => json!({
                "protocolVersion": params
                    .get("protocolVersion")
                    .cloned()
                    .unwrap_or_else(|| json!("2025-03-26")),
                "capabilities": { "tools": {} },
                "serverInfo": { "name": self.name, "version": "0.0.1" }
            }),
            ("tools/list", FakeBehavior::FailListing) => {
                return Some(json!({"error": {"code": -32603, "message": "listing unavailable"}}))
            }
            ("tools/list", _) => json!({ "tools": self.tools, "nextCursor": null }),
            ("tools/call", FakeBehavior::RpcErrorOnCall) => {
                return Some(json!({"error": {"code": -32602, "message": "invalid params"}}))
            }
            ("tools/call", FakeBehavior::ToolErrorOnCall) => json!({
                "content": [{ "type": "text", "text": "tool exploded" }],
                "isError": true
            }),
            ("tools/call", _) => self.call_result(params),
            _ => {
                return Some(json!({"error": {"code": -32601, "message": "method not found"}}))
            }
        };
        Some(json!({ "result": reply }))
    }

    fn call_result(&self, params: &Value) -> Value {
        let tool = params.get("name").and_then(Value::as_str).unwrap_or_default();
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        if tool == "echo" {
            let text = arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return json!({
                "content": [{ "type": "text", "text": text }],
                "isError": false
            });
        }
        json!({
            "content": [{ "type": "text", "text": format!("{}:{tool}", self.name) }],
            "structuredContent": { "server": self.name, "tool": tool, "arguments": arguments },
            "isError": false
        })
    }
}

/// Start `server` on an in-memory pipe and return the client end.
pub(crate) fn spawn_fake_server(server: FakeServer) -> DuplexChannel {
    let (client, remote) = tokio::io::duplex(64 * 1024);
    tokio::spawn(run_fake_server(server, remote));
    let (reader, writer) = tokio::io::split(client);
    DuplexChannel::pipes(reader, writer)
}

async fn run_fake_server(server: FakeServer, stream: DuplexStream) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        // Notifications carry no id and need no reply.
        let Some(id) = message.get("id").cloned() else {
            continue;
        };
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if method == "tools/call" {
            match server.behavior {
                FakeBehavior::DropOnCall => return,
                FakeBehavior::StallOnCall => {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    return;
                }
                _ => {}
            }
        }

        let Some(mut reply) = server.respond(method, &message["params"]) else {
            continue;
        };
        reply["jsonrpc"] = json!("2.0");
        reply["id"] = id;

        let mut bytes = reply.to_string().into_bytes();
        bytes.push(b'\n');
        if writer.write_all(&bytes).await.is_err() {
            return;
        }
    }
}

/// Connector backed by [`FakeServer`]s, recording every open.
#[derive(Default)]
pub(crate) struct FakeConnector {
    servers: HashMap<String, FakeServer>,
    open_delay: Option<Duration>,
    opens: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    pub(crate) fn new(servers: impl IntoIterator<Item = FakeServer>) -> Self {
        Self {
            servers: servers
                .into_iter()
                .map(|server| (server.name.clone(), server))
                .collect(),
            ..Default::default()
        }
    }

    pub(crate) fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub(crate) fn opens(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.opens)
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn open(&self, config: &ServerConfig) -> Result<DuplexChannel, BridgeError> {
        self.opens
            .lock()
            .expect("opens mutex should lock")
            .push(config.name().to_string());
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        match self.servers.get(config.name()) {
            Some(server) => Ok(spawn_fake_server(server.clone())),
            None => Err(BridgeError::connection(config.name(), "connection refused")),
        }
    }
}

pub(crate) fn opened(opens: &Arc<Mutex<Vec<String>>>, server: &str) -> usize {
    opens
        .lock()
        .expect("opens mutex should lock")
        .iter()
        .filter(|name| name.as_str() == server)
        .count()
}
