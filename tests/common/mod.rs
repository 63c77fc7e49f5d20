//! Shared test helpers: scripted model, spawned tool servers, flaky sessions.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mcp_host::agent_loop::{ModelEndpoint, ModelRequest, ModelResponse, ResponseBlock};
use mcp_host::error::HostError;
use mcp_host::mcp::{SessionConnector, ToolCallResult, ToolSchema, ToolSession};
use mcp_host::server::{self, ServerTool, SessionTable, SseSettings, ToolServer};

/// A model that replays canned responses and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ModelResponse, HostError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_text(&self, text: &str) {
        self.queue(Ok(ModelResponse::new(vec![ResponseBlock::text(text)])));
    }

    pub fn queue_tool_call(&self, id: Option<&str>, name: &str, args: serde_json::Value) {
        self.queue(Ok(ModelResponse::new(vec![ResponseBlock::tool_use(
            id, name, args,
        )])));
    }

    pub fn queue(&self, response: Result<ModelResponse, HostError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelEndpoint for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, HostError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(HostError::model("no scripted response left")))
    }
}

/// A tool server running on an ephemeral local port.
pub struct SpawnedServer {
    pub base_url: String,
    pub sessions: SessionTable,
    task: JoinHandle<Result<(), HostError>>,
}

impl SpawnedServer {
    pub fn sse_url(&self) -> String {
        format!("{}/sse", self.base_url)
    }

    pub fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url)
    }
}

impl Drop for SpawnedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_tool_server(tool_server: ToolServer) -> SpawnedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sessions = SessionTable::new();
    let task = tokio::spawn(server::serve(
        listener,
        Arc::new(tool_server),
        sessions.clone(),
        SseSettings {
            keep_alive: Duration::from_millis(100),
        },
    ));
    SpawnedServer {
        base_url: format!("http://{addr}"),
        sessions,
        task,
    }
}

/// A server exposing a single `lookup` tool that answers with `"<name>:<q>"`.
pub fn lookup_server(name: &'static str) -> ToolServer {
    ToolServer::new(name, "1.0.0").with_tool(ServerTool::new(
        "lookup",
        "Look something up",
        json!({
            "type": "object",
            "properties": {"q": {"type": "string"}},
            "required": ["q"]
        }),
        move |args| async move {
            let q = args.get_str("q")?.to_string();
            Ok::<_, HostError>(json!(format!("{name}:{q}")))
        },
    ))
}

/// An address nothing listens on.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/sse")
}

/// A session that lists one tool and fails every call with a transport error.
pub struct FlakySession {
    tool: String,
}

#[async_trait]
impl ToolSession for FlakySession {
    fn session_id(&self) -> &str {
        "flaky-session"
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, HostError> {
        Ok(vec![ToolSchema {
            name: self.tool.clone(),
            description: Some("Always loses the connection".into()),
            input_schema: json!({"type": "object", "properties": {}}),
        }])
    }

    async fn call_tool(
        &self,
        _name: &str,
        _arguments: serde_json::Value,
    ) -> Result<ToolCallResult, HostError> {
        Err(HostError::Transport("connection reset by peer".into()))
    }

    async fn close(&self) -> Result<(), HostError> {
        Ok(())
    }
}

/// Connects every endpoint to a [`FlakySession`] exposing `tool`.
pub struct FlakyConnector {
    pub tool: String,
}

#[async_trait]
impl SessionConnector for FlakyConnector {
    async fn connect(
        &self,
        _server_name: &str,
        _endpoint: &str,
    ) -> Result<Arc<dyn ToolSession>, HostError> {
        Ok(Arc::new(FlakySession {
            tool: self.tool.clone(),
        }))
    }
}

/// Wait until `check` holds, polling every 20ms for at most `limit`.
pub async fn eventually(limit: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
