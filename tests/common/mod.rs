//! Shared test helpers: a wiremock-backed streamable HTTP MCP server.

#![allow(dead_code)]

use std::collections::HashSet;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub fn tool_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string" }
        },
        "required": ["query"]
    })
}

/// Answer MCP JSON-RPC requests the way a stateless HTTP server would.
pub fn mock_mcp_http_handler(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let body: serde_json::Value = request.body_json().unwrap_or_else(|_| json!({}));
        let method = body
            .get("method")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        let id = body.get("id").cloned().unwrap_or_else(|| json!(1));

        match method {
            "initialize" => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": server_name, "version": "0.1.0" }
                }
            })),
            "tools/list" => {
                let definitions: Vec<_> = tools
                    .iter()
                    .map(|(tool_name, description)| {
                        json!({
                            "name": tool_name,
                            "description": description,
                            "inputSchema": tool_schema()
                        })
                    })
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": { "tools": definitions, "nextCursor": null }
                }))
            }
            "tools/call" => {
                let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
                let called_tool = params
                    .get("name")
                    .and_then(|name| name.as_str())
                    .unwrap_or_default()
                    .to_string();
                let arguments = params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "content": [{ "type": "text", "text": format!("{server_name}:{called_tool}") }],
                        "structuredContent": {
                            "server": server_name,
                            "tool": called_tool,
                            "arguments": arguments
                        },
                        "isError": false
                    }
                }))
            }
            "notifications/initialized" => ResponseTemplate::new(202),
            _ => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": null
            })),
        }
    }
}

/// Start a mock server answering MCP on `/mcp`.
pub async fn start_mcp_server(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(mock_mcp_http_handler(server_name, tools))
        .mount(&server)
        .await;
    server
}

pub fn request_methods(requests: &[Request]) -> HashSet<String> {
    requests
        .iter()
        .filter_map(|request| {
            request
                .body_json::<serde_json::Value>()
                .ok()
                .and_then(|body| {
                    body.get("method")
                        .and_then(|method| method.as_str())
                        .map(str::to_string)
                })
        })
        .collect()
}

pub fn request_headers_match(requests: &[Request], header: &str, expected: &str) -> bool {
    requests.iter().all(|request| {
        request
            .headers
            .get(header)
            .and_then(|value| value.to_str().ok())
            == Some(expected)
    })
}
