//! MCP client session over an [`RpcChannel`].

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Content, JsonObject, ResourceContents};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::protocol::{error_codes, methods, PROTOCOL_VERSION};
use super::schema::ToolSchema;
use super::session::ToolSession;
use super::transport::RpcChannel;
use crate::error::HostError;

/// Successful result of a remote tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub structured_content: Option<serde_json::Value>,
    pub text_content: Option<String>,
    pub content: Vec<serde_json::Value>,
}

impl ToolCallResult {
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

/// Identity the server reported during initialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    protocol_version: String,
    #[serde(default)]
    server_info: ServerInfo,
    #[serde(default)]
    instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsPage {
    tools: Vec<rmcp::model::Tool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// An initialized MCP session with one server.
pub struct McpClient {
    server: String,
    channel: Box<dyn RpcChannel>,
    server_info: ServerInfo,
    protocol_version: String,
    instructions: Option<String>,
}

impl McpClient {
    /// Run the `initialize` handshake and send `notifications/initialized`.
    pub async fn initialize(
        server: &str,
        channel: Box<dyn RpcChannel>,
    ) -> Result<Self, HostError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": format!("mcp-client-{server}"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result: InitializeResult =
            serde_json::from_value(channel.request(methods::INITIALIZE, params).await?)?;
        channel.notify(methods::INITIALIZED, json!({})).await?;

        info!(
            server,
            session_id = channel.session_id(),
            remote = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP session initialized"
        );

        Ok(Self {
            server: server.to_string(),
            channel,
            server_info: result.server_info,
            protocol_version: result.protocol_version,
            instructions: result.instructions.filter(|text| !text.trim().is_empty()),
        })
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }
}

#[async_trait]
impl ToolSession for McpClient {
    fn session_id(&self) -> &str {
        self.channel.session_id()
    }

    fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, HostError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let page: ListToolsPage =
                serde_json::from_value(self.channel.request(methods::TOOLS_LIST, params).await?)?;
            tools.extend(page.tools.into_iter().map(ToolSchema::from));
            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }
        debug!(server = %self.server, count = tools.len(), "listed tools");
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, HostError> {
        let arguments = coerce_tool_arguments(arguments)?.unwrap_or_default();
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.channel.request(methods::TOOLS_CALL, params).await?;
        let result: CallToolResult =
            serde_json::from_value(result).map_err(|e| HostError::Protocol {
                code: error_codes::INTERNAL_ERROR,
                message: format!("malformed tools/call result: {e}"),
            })?;
        map_call_result(name, result)
    }

    async fn close(&self) -> Result<(), HostError> {
        self.channel.close().await
    }
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>, HostError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                HostError::InvalidArgument(format!("tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(HostError::InvalidArgument(format!(
            "tool arguments must be a JSON object; got {other}"
        ))),
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

fn map_call_result(name: &str, result: CallToolResult) -> Result<ToolCallResult, HostError> {
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
            .unwrap_or_else(|| "tool returned an error result".into());

        return Err(HostError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    Ok(ToolCallResult {
        structured_content: result.structured_content,
        text_content,
        content,
    })
}
