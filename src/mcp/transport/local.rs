//! In-process channel to a [`ToolServer`], bypassing HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::RpcChannel;
use crate::error::HostError;
use crate::mcp::client::McpClient;
use crate::mcp::protocol::JsonRpcMessage;
use crate::mcp::session::{SessionConnector, ToolSession};
use crate::server::ToolServer;

/// Delivers JSON-RPC messages straight to an in-process server.
pub struct LocalChannel {
    session_id: String,
    server: Arc<ToolServer>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl LocalChannel {
    pub fn new(server: Arc<ToolServer>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            server,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), HostError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HostError::SessionClosed(self.session_id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl RpcChannel for LocalChannel {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, HostError> {
        self.ensure_open()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .server
            .handle_message(JsonRpcMessage::request(id, method, params))
            .await
            .ok_or_else(|| HostError::Transport(format!("no response to '{method}'")))?;
        reply.into_result()
    }

    async fn notify(&self, method: &str, params: serde_json::Value) -> Result<(), HostError> {
        self.ensure_open()?;
        self.server
            .handle_message(JsonRpcMessage::notification(method, params))
            .await;
        Ok(())
    }

    async fn close(&self) -> Result<(), HostError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connects to in-process servers registered under endpoint strings.
///
/// Endpoints without a registered server fail to connect.
#[derive(Clone, Default)]
pub struct LocalConnector {
    servers: HashMap<String, Arc<ToolServer>>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, endpoint: impl Into<String>, server: Arc<ToolServer>) -> Self {
        self.servers.insert(endpoint.into(), server);
        self
    }
}

#[async_trait]
impl SessionConnector for LocalConnector {
    async fn connect(
        &self,
        server_name: &str,
        endpoint: &str,
    ) -> Result<Arc<dyn ToolSession>, HostError> {
        let server = self.servers.get(endpoint).ok_or_else(|| {
            HostError::Transport(format!("no in-process server at '{endpoint}'"))
        })?;
        let channel = LocalChannel::new(Arc::clone(server));
        let client = McpClient::initialize(server_name, Box::new(channel)).await?;
        Ok(Arc::new(client))
    }
}
