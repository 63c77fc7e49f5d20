//! MCP tool server: JSON-RPC handling, session table, and HTTP+SSE routes.

pub mod http;
pub mod presets;
pub mod sessions;
pub mod tool;

pub use http::{router, serve, SseSettings};
pub use sessions::{SessionGuard, SessionTable};
pub use tool::{ServerTool, ToolArguments};

use rmcp::model::{CallToolResult, Content};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::mcp::protocol::{error_codes, methods, JsonRpcError, JsonRpcMessage, MessageKind, PROTOCOL_VERSION};

#[derive(Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<serde_json::Value>,
}

/// A named set of tools answering MCP requests.
#[derive(Debug, Clone)]
pub struct ToolServer {
    name: String,
    version: String,
    instructions: Option<String>,
    tools: Vec<ServerTool>,
}

impl ToolServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            instructions: None,
            tools: Vec::new(),
        }
    }

    /// Add a tool; a later tool with the same name replaces the earlier one.
    pub fn with_tool(mut self, tool: ServerTool) -> Self {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(tool);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &[ServerTool] {
        &self.tools
    }

    fn tool(&self, name: &str) -> Option<&ServerTool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Answer one inbound message. Notifications and stray responses get no reply.
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message.kind() {
            MessageKind::Request => {
                let id = message.id.unwrap_or(serde_json::Value::Null);
                let method = message.method.unwrap_or_default();
                let params = message.params.unwrap_or_else(|| json!({}));
                Some(match self.handle_request(&method, params).await {
                    Ok(result) => JsonRpcMessage::response(id, result),
                    Err(error) => JsonRpcMessage::error_response(id, error),
                })
            }
            MessageKind::Notification => {
                debug!(server = %self.name, method = ?message.method, "notification received");
                None
            }
            MessageKind::Response => {
                debug!(server = %self.name, "ignoring response sent to server");
                None
            }
            MessageKind::Invalid => Some(JsonRpcMessage::error_response(
                message.id.unwrap_or(serde_json::Value::Null),
                JsonRpcError::new(error_codes::INVALID_REQUEST, "Invalid request"),
            )),
        }
    }

    async fn handle_request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, JsonRpcError> {
        match method {
            methods::INITIALIZE => Ok(self.initialize_result()),
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => {
                let tools = self
                    .tools
                    .iter()
                    .map(ServerTool::definition)
                    .collect::<Vec<_>>();
                Ok(json!({ "tools": tools }))
            }
            methods::TOOLS_CALL => self.call_tool(params).await,
            other => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    fn initialize_result(&self) -> serde_json::Value {
        let mut result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": self.name, "version": self.version },
        });
        if let Some(instructions) = &self.instructions {
            result["instructions"] = json!(instructions);
        }
        result
    }

    async fn call_tool(&self, params: serde_json::Value) -> Result<serde_json::Value, JsonRpcError> {
        let params: CallParams = serde_json::from_value(params).map_err(|e| {
            JsonRpcError::new(error_codes::INVALID_PARAMS, format!("Invalid params: {e}"))
        })?;
        let tool = self.tool(&params.name).ok_or_else(|| {
            JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Tool {} not found", params.name),
            )
        })?;

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        debug!(server = %self.name, tool = %params.name, "tool called");
        let result = match tool.call(ToolArguments::new(arguments)).await {
            Ok(serde_json::Value::String(text)) => CallToolResult::success(vec![Content::text(text)]),
            Ok(value) => CallToolResult::success(vec![Content::text(value.to_string())]),
            Err(err) => CallToolResult::error(vec![Content::text(err.to_string())]),
        };
        serde_json::to_value(result)
            .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;

    fn server() -> ToolServer {
        ToolServer::new("alpha", "1.0.0")
            .with_instructions("Alpha looks things up.")
            .with_tool(ServerTool::new(
                "lookup",
                "Look up a key",
                json!({"type": "object", "properties": {"key": {"type": "string"}}}),
                |args| async move {
                    let key = args.get_str("key")?;
                    Ok::<_, HostError>(json!(format!("value of {key}")))
                },
            ))
    }

    async fn request(server: &ToolServer, method: &str, params: serde_json::Value) -> JsonRpcMessage {
        server
            .handle_message(JsonRpcMessage::request(1, method, params))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_identity_and_instructions() {
        let reply = request(&server(), methods::INITIALIZE, json!({})).await;
        let result = reply.into_result().unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "alpha");
        assert_eq!(result["instructions"], "Alpha looks things up.");
    }

    #[tokio::test]
    async fn tools_list_and_call() {
        let server = server();
        let listed = request(&server, methods::TOOLS_LIST, json!({})).await.into_result().unwrap();
        assert_eq!(listed["tools"][0]["name"], "lookup");

        let called = request(
            &server,
            methods::TOOLS_CALL,
            json!({"name": "lookup", "arguments": {"key": "k1"}}),
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(called["content"][0]["text"], "value of k1");
        assert_eq!(called["isError"], false);
    }

    #[tokio::test]
    async fn handler_failure_is_an_error_result() {
        let called = request(&server(), methods::TOOLS_CALL, json!({"name": "lookup", "arguments": {}}))
            .await
            .into_result()
            .unwrap();
        assert_eq!(called["isError"], true);
        assert!(called["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Missing string argument: key"));
    }

    #[tokio::test]
    async fn unknown_method_and_tool_are_protocol_errors() {
        let server = server();
        let err = request(&server, "resources/list", json!({})).await.into_result().unwrap_err();
        assert!(matches!(err, HostError::Protocol { code: -32601, .. }));

        let err = request(&server, methods::TOOLS_CALL, json!({"name": "nope"}))
            .await
            .into_result()
            .unwrap_err();
        assert!(matches!(err, HostError::Protocol { code: -32602, message } if message.contains("nope")));
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let reply = server()
            .handle_message(JsonRpcMessage::notification(methods::INITIALIZED, json!({})))
            .await;
        assert!(reply.is_none());
    }
}
