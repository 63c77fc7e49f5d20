//! Session-level contracts between the registry and tool servers.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::ToolCallResult;
use super::schema::ToolSchema;
use crate::error::HostError;

/// An initialized session with one tool server.
///
/// Calls on one session may be issued concurrently.
#[async_trait]
pub trait ToolSession: Send + Sync {
    fn session_id(&self) -> &str;

    /// Usage instructions the server sent during initialization, if any.
    fn instructions(&self) -> Option<&str> {
        None
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, HostError>;

    /// Invoke a tool by its unqualified, server-local name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, HostError>;

    async fn close(&self) -> Result<(), HostError>;
}

/// Opens sessions to configured servers.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        server_name: &str,
        endpoint: &str,
    ) -> Result<Arc<dyn ToolSession>, HostError>;
}
